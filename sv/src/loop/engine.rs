//! AttemptOrchestrator - the per-task attempt/refinement loop

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{Attempt, CallBudget, ExampleSet, TaskId, Verdict};
use crate::extract::OutputExtractor;
use crate::feedback::{FeedbackContextBuilder, RefinementContext};
use crate::oracle::CandidateOracle;
use crate::prompts::PromptBuilder;
use crate::validation::CodeValidator;

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// An attempt passed every train example
    Accepted,
    /// Every allowed attempt failed
    Exhausted,
    /// The call budget ran out before the task finished
    BudgetExhausted,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "success",
            Self::Exhausted => "exhausted",
            Self::BudgetExhausted => "budget_exhausted",
        }
    }
}

/// Everything one task produced
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Source of the accepted candidate, if any
    pub accepted: Option<String>,
    /// Attempts in order; the last one is terminal
    pub attempts: Vec<Attempt>,
    /// Oracle calls this task consumed
    pub calls_used: u32,
}

impl TaskOutcome {
    pub fn terminal(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn failed_attempts(&self) -> impl Iterator<Item = &Attempt> {
        self.attempts.iter().filter(|a| !a.is_success())
    }
}

/// Runs the attempt loop for one task at a time
pub struct AttemptOrchestrator {
    oracle: Arc<dyn CandidateOracle>,
    extractor: OutputExtractor,
    validator: CodeValidator,
    prompts: PromptBuilder,
    feedback: FeedbackContextBuilder,
}

impl AttemptOrchestrator {
    pub fn new(
        oracle: Arc<dyn CandidateOracle>,
        validator: CodeValidator,
        prompts: PromptBuilder,
        feedback: FeedbackContextBuilder,
    ) -> Self {
        debug!("AttemptOrchestrator::new: called");
        Self {
            oracle,
            extractor: OutputExtractor::new(),
            validator,
            prompts,
            feedback,
        }
    }

    pub fn validator(&self) -> &CodeValidator {
        &self.validator
    }

    /// Attempt a task up to `max_attempts` times
    ///
    /// The budget is checked before every oracle call and charged one call per
    /// invocation, whatever the outcome. Refinement context comes only from the
    /// attempt immediately before. Errors are configuration problems (prompt
    /// templates); candidate and oracle failures are recorded as attempts.
    pub async fn run_task(
        &self,
        examples: &ExampleSet,
        max_attempts: u32,
        budget: &mut CallBudget,
    ) -> eyre::Result<TaskOutcome> {
        let task_id = examples.task_id();
        debug!(%task_id, max_attempts, used = budget.used(), "AttemptOrchestrator::run_task: called");
        let used_at_start = budget.used();
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut refinement: Option<RefinementContext> = None;

        let finish = |status: TaskStatus, accepted: Option<String>, attempts: Vec<Attempt>, budget: &CallBudget| {
            TaskOutcome {
                task_id,
                status,
                accepted,
                attempts,
                calls_used: budget.used() - used_at_start,
            }
        };

        for index in 1..=max_attempts {
            if budget.is_exhausted() {
                info!(%task_id, attempt = index, used = budget.used(), "Call budget exhausted");
                return Ok(finish(TaskStatus::BudgetExhausted, None, attempts, &*budget));
            }

            let prompt = self.prompts.build(examples, refinement.as_ref())?;
            budget.record_call();

            let attempt = match self.oracle.generate(&prompt).await {
                Ok(raw) => {
                    let source = self.extractor.extract(&raw);
                    let verdict = if source.is_empty() {
                        debug!(%task_id, attempt = index, "AttemptOrchestrator::run_task: empty extraction");
                        Verdict::syntax_invalid("empty output")
                    } else {
                        self.validator.validate(&source, examples.train()).await
                    };
                    Attempt::new(index, source, verdict)
                }
                Err(e) => {
                    warn!(%task_id, attempt = index, error = %e, "Oracle call failed");
                    Attempt::new(index, "", Verdict::oracle_failure(e.to_string()))
                }
            };

            info!(
                %task_id,
                attempt = index,
                verdict = attempt.verdict().tag(),
                code_length = attempt.source().len(),
                "Attempt finished"
            );

            if attempt.is_success() {
                let accepted = attempt.source().to_string();
                attempts.push(attempt);
                return Ok(finish(TaskStatus::Accepted, Some(accepted), attempts, &*budget));
            }

            refinement = Some(self.feedback.build(&attempt));
            attempts.push(attempt);
        }

        debug!(%task_id, "AttemptOrchestrator::run_task: attempts exhausted");
        Ok(finish(TaskStatus::Exhausted, None, attempts, &*budget))
    }
}
