//! RunDriver - feeds a range of tasks through the orchestrator

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::{AttemptOrchestrator, TaskOutcome, TaskStatus};
use crate::config::RunConfig;
use crate::domain::{CallBudget, TaskId};
use crate::recorder::{OutcomeStatus, ProgressRecord, ResultRecorder};
use crate::tasks::TaskCatalog;

impl From<TaskStatus> for OutcomeStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Accepted => Self::Success,
            TaskStatus::Exhausted => Self::Exhausted,
            TaskStatus::BudgetExhausted => Self::BudgetExhausted,
        }
    }
}

/// Run-level knobs
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub start: u32,
    pub end: u32,
    pub max_attempts: u32,
    pub task_delay: Duration,
    pub skip_solved: bool,
}

impl From<&RunConfig> for RunSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            start: config.start,
            end: config.end,
            max_attempts: config.max_attempts,
            task_delay: Duration::from_millis(config.task_delay_ms),
            skip_solved: config.skip_solved,
        }
    }
}

/// What happened to one task, for display
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub status: OutcomeStatus,
    pub attempts: usize,
    pub calls_used: u32,
    pub code_length: Option<usize>,
    pub detail: Option<String>,
}

impl TaskReport {
    fn bare(task_id: TaskId, status: OutcomeStatus, detail: Option<String>) -> Self {
        Self {
            task_id,
            status,
            attempts: 0,
            calls_used: 0,
            code_length: None,
            detail,
        }
    }
}

/// Totals for a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub reports: Vec<TaskReport>,
    pub calls_used: u32,
    pub call_ceiling: u32,
}

impl RunSummary {
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.reports.iter().filter(|r| r.status == status).count()
    }
}

/// Drives tasks sequentially against a shared call budget
pub struct RunDriver {
    catalog: TaskCatalog,
    orchestrator: AttemptOrchestrator,
    recorder: Arc<dyn ResultRecorder>,
    settings: RunSettings,
    run_id: Uuid,
}

impl RunDriver {
    pub fn new(
        catalog: TaskCatalog,
        orchestrator: AttemptOrchestrator,
        recorder: Arc<dyn ResultRecorder>,
        settings: RunSettings,
    ) -> Self {
        let run_id = Uuid::now_v7();
        debug!(%run_id, ?settings, "RunDriver::new: called");
        Self {
            catalog,
            orchestrator,
            recorder,
            settings,
            run_id,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run every task in the configured range
    ///
    /// `on_task` sees each report as soon as its task is settled. Recorder
    /// failures are logged and do not stop the run.
    pub async fn run(&self, budget: &mut CallBudget, mut on_task: impl FnMut(&TaskReport)) -> eyre::Result<RunSummary> {
        info!(
            run_id = %self.run_id,
            start = self.settings.start,
            end = self.settings.end,
            ceiling = budget.ceiling(),
            "Starting run"
        );
        let entries = self.catalog.discover(self.settings.start, self.settings.end);
        let mut reports = Vec::with_capacity(entries.len());

        for (pos, entry) in entries.iter().enumerate() {
            let task_id = entry.id;

            let report = if budget.is_exhausted() {
                debug!(%task_id, "RunDriver::run: budget exhausted, not attempting");
                self.record_bare(task_id, OutcomeStatus::NotAttempted, None, budget.used())
            } else if self.settings.skip_solved && self.recorder.has_solution(task_id) {
                info!(%task_id, "Skipping solved task");
                self.record_bare(task_id, OutcomeStatus::Skipped, None, budget.used())
            } else {
                match self.catalog.load(task_id) {
                    Ok(examples) => {
                        let outcome = self
                            .orchestrator
                            .run_task(&examples, self.settings.max_attempts, budget)
                            .await?;
                        let report = self.persist(&outcome, budget.used());

                        let more_to_do = pos + 1 < entries.len() && !budget.is_exhausted();
                        if outcome.calls_used > 0 && more_to_do && !self.settings.task_delay.is_zero() {
                            debug!(delay_ms = self.settings.task_delay.as_millis() as u64, "RunDriver::run: pausing");
                            tokio::time::sleep(self.settings.task_delay).await;
                        }
                        report
                    }
                    Err(e) => {
                        warn!(%task_id, error = %e, "Failed to load task");
                        self.record_bare(task_id, OutcomeStatus::LoadError, Some(e.to_string()), budget.used())
                    }
                }
            };

            on_task(&report);
            reports.push(report);
        }

        let summary = RunSummary {
            run_id: self.run_id,
            reports,
            calls_used: budget.used(),
            call_ceiling: budget.ceiling(),
        };
        info!(
            run_id = %self.run_id,
            accepted = summary.count(OutcomeStatus::Success),
            calls_used = summary.calls_used,
            "Run finished"
        );
        Ok(summary)
    }

    fn record_bare(&self, task_id: TaskId, status: OutcomeStatus, detail: Option<String>, calls_used: u32) -> TaskReport {
        let record = ProgressRecord::for_task(self.run_id, task_id, status, 0, calls_used, detail.clone());
        if let Err(e) = self.recorder.record_outcome(&record) {
            warn!(%task_id, error = %e, "Failed to record outcome");
        }
        TaskReport::bare(task_id, status, detail)
    }

    fn persist(&self, outcome: &TaskOutcome, calls_used: u32) -> TaskReport {
        let task_id = outcome.task_id;
        debug!(%task_id, status = outcome.status.as_str(), "RunDriver::persist: called");

        // Every attempt spends exactly one call
        let calls_before = calls_used.saturating_sub(outcome.calls_used);
        for attempt in &outcome.attempts {
            if !attempt.is_success()
                && let Err(e) = self.recorder.save_failed_attempt(task_id, attempt)
            {
                warn!(%task_id, attempt = attempt.index(), error = %e, "Failed to save failed attempt");
            }
            let record = ProgressRecord::for_attempt(self.run_id, task_id, attempt, calls_before + attempt.index());
            if let Err(e) = self.recorder.record_outcome(&record) {
                warn!(%task_id, attempt = attempt.index(), error = %e, "Failed to record attempt");
            }
        }

        if let Some(source) = &outcome.accepted {
            match self.recorder.save_accepted(task_id, source) {
                Ok(path) => info!(%task_id, path = %path.display(), "Saved solution"),
                Err(e) => warn!(%task_id, error = %e, "Failed to save solution"),
            }
        }

        let status = OutcomeStatus::from(outcome.status);
        let code_length = outcome.accepted.as_ref().map(|s| s.len());
        let detail = match outcome.status {
            TaskStatus::Accepted => None,
            _ => outcome.terminal().map(|a| a.verdict().summary()),
        };
        let record =
            ProgressRecord::for_task(self.run_id, task_id, status, code_length.unwrap_or(0), calls_used, detail.clone());
        if let Err(e) = self.recorder.record_outcome(&record) {
            warn!(%task_id, error = %e, "Failed to record outcome");
        }

        TaskReport {
            task_id,
            status,
            attempts: outcome.attempts.len(),
            calls_used: outcome.calls_used,
            code_length,
            detail,
        }
    }
}
