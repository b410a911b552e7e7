//! Integration tests for selfverify
//!
//! These tests drive the attempt loop and the run driver through the public API
//! with a scripted oracle and a toy candidate runtime.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use selfverify::domain::{CallBudget, Example, ExampleSet, TaskId, Verdict};
use selfverify::feedback::FeedbackContextBuilder;
use selfverify::oracle::{CandidateOracle, OracleError};
use selfverify::prompts::{PromptBuilder, PromptLoader};
use selfverify::r#loop::{AttemptOrchestrator, RunDriver, RunSettings, TaskStatus};
use selfverify::recorder::{FileRecorder, OutcomeStatus, ProgressStats, ResultRecorder, read_records};
use selfverify::tasks::TaskCatalog;
use selfverify::validation::{
    CandidateRuntime, CodeValidator, InvokeOutcome, LoadOutcome, ParseOutcome, SandboxError,
};

// =============================================================================
// Test doubles
// =============================================================================

/// Oracle that replays canned replies and remembers every prompt
struct CannedOracle {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl CannedOracle {
    fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateOracle for CannedOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(OracleError::Unavailable(e)),
            None => Err(OracleError::Unavailable("no more replies".to_string())),
        }
    }
}

/// Tiny stand-in language keyed on markers in the source:
///
/// - `SYNTAX` fails to parse
/// - no `def p` means the entry point is missing
/// - `raise@N` raises on input `[[N]]`
/// - `shape@N` returns `[N]` for input `[[N]]`
/// - `return 0` always returns 0
/// - anything else returns its input
#[derive(Default)]
struct ToyRuntime {
    invoked: Mutex<Vec<Value>>,
}

impl ToyRuntime {
    fn marker(source: &str, name: &str) -> Option<i64> {
        let start = source.find(&format!("{}@", name))? + name.len() + 1;
        source[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .ok()
    }

    fn invoked(&self) -> Vec<Value> {
        self.invoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateRuntime for ToyRuntime {
    async fn parse(&self, source: &str) -> Result<ParseOutcome, SandboxError> {
        if source.contains("SYNTAX") {
            return Ok(ParseOutcome::Invalid("SyntaxError: invalid syntax (line 1)".to_string()));
        }
        Ok(ParseOutcome::Valid)
    }

    async fn load(&self, source: &str) -> Result<LoadOutcome, SandboxError> {
        if !source.contains("def p") {
            return Ok(LoadOutcome::MissingEntryPoint("name 'p' is not defined".to_string()));
        }
        Ok(LoadOutcome::Ready)
    }

    async fn invoke(&self, source: &str, input: Value) -> Result<InvokeOutcome, SandboxError> {
        self.invoked.lock().unwrap().push(input.clone());
        let cell = input.pointer("/0/0").and_then(Value::as_i64);
        if let Some(n) = Self::marker(source, "raise")
            && cell == Some(n)
        {
            return Ok(InvokeOutcome::Raised("ValueError: bad cell".to_string()));
        }
        if let Some(n) = Self::marker(source, "shape")
            && cell == Some(n)
        {
            return Ok(InvokeOutcome::Returned(json!([n])));
        }
        if source.contains("return 0") {
            return Ok(InvokeOutcome::Returned(json!(0)));
        }
        Ok(InvokeOutcome::Returned(input))
    }
}

fn identity_task(id: u32, n: i64) -> ExampleSet {
    let train = (1..=n).map(|i| Example::new(json!([[i]]), json!([[i]]))).collect();
    ExampleSet::new(TaskId(id), train, vec![Example::new(json!([[9]]), json!([[9]]))]).unwrap()
}

fn orchestrator(oracle: Arc<CannedOracle>, runtime: Arc<ToyRuntime>) -> AttemptOrchestrator {
    AttemptOrchestrator::new(
        oracle,
        CodeValidator::new(runtime),
        PromptBuilder::new(PromptLoader::embedded_only(), "p"),
        FeedbackContextBuilder::new("p", 600),
    )
}

fn fenced(body: &str) -> String {
    format!("Here you go:\n```python\n{}\n```\n", body)
}

fn write_task(dir: &Path, id: u32, n: i64) {
    let train: Vec<Value> = (1..=n).map(|i| json!({"input": [[i]], "output": [[i]]})).collect();
    let body = json!({"train": train, "test": [{"input": [[9]], "output": [[9]]}]});
    std::fs::write(dir.join(format!("task{:03}.json", id)), body.to_string()).unwrap();
}

// =============================================================================
// Attempt loop scenarios
// =============================================================================

#[tokio::test]
async fn test_ceiling_of_one_stops_after_first_failure() {
    let oracle = CannedOracle::new(vec![Ok("def p(g): return 0"), Ok("def p(g): return g")]);
    let runtime = Arc::new(ToyRuntime::default());
    let engine = orchestrator(oracle.clone(), runtime);
    let mut budget = CallBudget::new(1);

    let outcome = engine.run_task(&identity_task(1, 2), 3, &mut budget).await.unwrap();

    assert_eq!(outcome.status, TaskStatus::BudgetExhausted);
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(oracle.prompts().len(), 1, "no second call once the ceiling is hit");
    assert_eq!(budget.used(), 1);
    assert!(outcome.accepted.is_none());
}

#[tokio::test]
async fn test_missing_entry_point_is_named_in_next_prompt() {
    let oracle = CannedOracle::new(vec![Ok("def solve(g): return g"), Ok("def p(g): return g")]);
    let runtime = Arc::new(ToyRuntime::default());
    let engine = orchestrator(oracle.clone(), runtime.clone());
    let mut budget = CallBudget::new(10);

    let outcome = engine.run_task(&identity_task(2, 2), 3, &mut budget).await.unwrap();

    assert_eq!(outcome.attempts[0].verdict(), &Verdict::EntryPointMissing);
    assert_eq!(outcome.status, TaskStatus::Accepted);
    let prompts = oracle.prompts();
    assert!(prompts[1].contains("`p(g)`"));
    assert!(prompts[1].contains("def solve(g): return g"));
}

#[tokio::test]
async fn test_raise_on_third_of_five_never_runs_fourth() {
    let oracle = CannedOracle::new(vec![Ok("def p(g): raise@3")]);
    let runtime = Arc::new(ToyRuntime::default());
    let engine = orchestrator(oracle, runtime.clone());
    let mut budget = CallBudget::new(1);

    let outcome = engine.run_task(&identity_task(3, 5), 1, &mut budget).await.unwrap();

    assert_eq!(outcome.status, TaskStatus::Exhausted);
    assert_eq!(outcome.attempts[0].verdict(), &Verdict::runtime_failure(3, "ValueError: bad cell"));
    assert_eq!(runtime.invoked(), vec![json!([[1]]), json!([[2]]), json!([[3]])]);
}

#[tokio::test]
async fn test_wrong_shape_on_fifth_is_mismatch() {
    let oracle = CannedOracle::new(vec![Ok("def p(g): shape@5")]);
    let runtime = Arc::new(ToyRuntime::default());
    let engine = orchestrator(oracle, runtime);
    let mut budget = CallBudget::new(5);

    let outcome = engine.run_task(&identity_task(4, 5), 1, &mut budget).await.unwrap();

    assert_eq!(
        outcome.attempts[0].verdict(),
        &Verdict::Mismatch {
            example_index: 5,
            expected: json!([[5]]),
            actual: json!([5]),
        }
    );
}

#[tokio::test]
async fn test_refinement_uses_only_the_preceding_attempt() {
    let oracle = CannedOracle::new(vec![
        Ok("def p(g): return 0"),
        Ok("def p(g): shape@2"),
        Ok("def p(g): return g"),
    ]);
    let runtime = Arc::new(ToyRuntime::default());
    let engine = orchestrator(oracle.clone(), runtime);
    let mut budget = CallBudget::new(10);

    let outcome = engine.run_task(&identity_task(5, 3), 3, &mut budget).await.unwrap();
    assert_eq!(outcome.status, TaskStatus::Accepted);
    assert_eq!(outcome.attempts.len(), 3);

    let prompts = oracle.prompts();
    assert!(prompts[1].contains("Train example 1 produced the wrong output"));
    assert!(prompts[1].contains("return 0"));

    assert!(prompts[2].contains("Train example 2 produced the wrong output"));
    assert!(prompts[2].contains("shape@2"));
    assert!(!prompts[2].contains("Train example 1 produced"));
    assert!(!prompts[2].contains("return 0"));
}

// =============================================================================
// Budget and acceptance properties
// =============================================================================

#[tokio::test]
async fn test_every_call_is_charged_including_failures() {
    let oracle = CannedOracle::new(vec![
        Err("connection reset"),
        Ok("no code here SYNTAX"),
        Ok("```\n```"),
    ]);
    let runtime = Arc::new(ToyRuntime::default());
    let engine = orchestrator(oracle.clone(), runtime.clone());
    let mut budget = CallBudget::new(10);

    let outcome = engine.run_task(&identity_task(6, 1), 3, &mut budget).await.unwrap();

    assert_eq!(budget.used(), 3);
    assert_eq!(outcome.calls_used, 3);
    assert_eq!(outcome.status, TaskStatus::Exhausted);
    let tags: Vec<&str> = outcome.attempts.iter().map(|a| a.verdict().tag()).collect();
    assert_eq!(tags, vec!["oracle_failure", "syntax_invalid", "syntax_invalid"]);
    assert_eq!(outcome.attempts[2].verdict(), &Verdict::syntax_invalid("empty output"));
    assert!(runtime.invoked().is_empty(), "nothing executes before a successful parse");
}

#[tokio::test]
async fn test_attempt_count_matches_first_success() {
    let oracle = CannedOracle::new(vec![Ok("def p(g): return 0"), Ok(fenced("def p(g): return g").as_str())]);
    let runtime = Arc::new(ToyRuntime::default());
    let engine = orchestrator(oracle, runtime);
    let mut budget = CallBudget::new(10);

    let outcome = engine.run_task(&identity_task(7, 2), 3, &mut budget).await.unwrap();

    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.terminal().map(|a| a.index()), Some(2));
    assert_eq!(outcome.accepted.as_deref(), Some("def p(g): return g"));
}

#[tokio::test]
async fn test_accepted_code_revalidates() {
    let oracle = CannedOracle::new(vec![Ok(fenced("def p(g): return g").as_str())]);
    let runtime = Arc::new(ToyRuntime::default());
    let engine = orchestrator(oracle, runtime);
    let mut budget = CallBudget::new(1);
    let examples = identity_task(8, 4);

    let outcome = engine.run_task(&examples, 3, &mut budget).await.unwrap();
    let accepted = outcome.accepted.expect("task should be accepted");

    let again = engine.validator().validate(&accepted, examples.train()).await;
    assert_eq!(again, Verdict::Success);
}

// =============================================================================
// Run driver end to end
// =============================================================================

#[tokio::test]
async fn test_run_persists_solutions_and_stops_at_ceiling() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let data = temp.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    for id in 1..=3 {
        write_task(&data, id, 2);
    }

    // Task 1: two calls; task 2: one call hits the ceiling; task 3 never runs
    let oracle = CannedOracle::new(vec![
        Ok("def p(g): return 0"),
        Ok(fenced("def p(g): return g").as_str()),
        Ok("def p(g): return 0"),
    ]);
    let runtime = Arc::new(ToyRuntime::default());
    let recorder = Arc::new(FileRecorder::new(temp.path().join("out"), temp.path().join("logs")).unwrap());
    let driver = RunDriver::new(
        TaskCatalog::new(&data),
        orchestrator(oracle.clone(), runtime),
        recorder.clone(),
        RunSettings {
            start: 1,
            end: 3,
            max_attempts: 3,
            task_delay: std::time::Duration::ZERO,
            skip_solved: true,
        },
    );

    let mut budget = CallBudget::new(3);
    let mut seen = Vec::new();
    let summary = driver.run(&mut budget, |r| seen.push(r.status)).await.unwrap();

    assert_eq!(
        seen,
        vec![OutcomeStatus::Success, OutcomeStatus::BudgetExhausted, OutcomeStatus::NotAttempted]
    );
    assert_eq!(summary.calls_used, 3);
    assert_eq!(oracle.prompts().len(), 3);

    assert!(recorder.has_solution(TaskId(1)));
    assert!(!recorder.has_solution(TaskId(2)));
    assert_eq!(
        std::fs::read_to_string(recorder.solution_path(TaskId(1))).unwrap(),
        "def p(g): return g"
    );
    assert!(recorder.failed_attempt_path(TaskId(1), 1).exists());
    assert!(recorder.failed_attempt_path(TaskId(2), 1).exists());

    let records = read_records(recorder.progress_path()).unwrap();
    let stats = ProgressStats::from_records(&records);
    assert_eq!(stats.solved, 1);
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.task_count(OutcomeStatus::NotAttempted), 1);
    assert_eq!(stats.attempt_counts.get("mismatch"), Some(&2));
}

#[tokio::test]
async fn test_second_run_skips_solved_task() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let data = temp.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    write_task(&data, 1, 1);

    let recorder = Arc::new(FileRecorder::new(temp.path().join("out"), temp.path().join("logs")).unwrap());
    recorder.save_accepted(TaskId(1), "def p(g): return g").unwrap();

    let oracle = CannedOracle::new(vec![]);
    let driver = RunDriver::new(
        TaskCatalog::new(&data),
        orchestrator(oracle.clone(), Arc::new(ToyRuntime::default())),
        recorder,
        RunSettings {
            start: 1,
            end: 1,
            max_attempts: 3,
            task_delay: std::time::Duration::ZERO,
            skip_solved: true,
        },
    );

    let mut budget = CallBudget::new(5);
    let summary = driver.run(&mut budget, |_| {}).await.unwrap();

    assert_eq!(summary.count(OutcomeStatus::Skipped), 1);
    assert!(oracle.prompts().is_empty());
    assert_eq!(budget.used(), 0);
}
