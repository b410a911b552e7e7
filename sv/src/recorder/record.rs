//! Progress records and the stats read back from them

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Attempt, TaskId};

/// Task-level outcome as written to the progress log
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Exhausted,
    BudgetExhausted,
    NotAttempted,
    Skipped,
    LoadError,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Exhausted => "exhausted",
            Self::BudgetExhausted => "budget_exhausted",
            Self::NotAttempted => "not_attempted",
            Self::Skipped => "skipped",
            Self::LoadError => "load_error",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of `progress.jsonl`
///
/// `attempt` is set for attempt records and None for task records. `status`
/// is the verdict tag for attempts and an [`OutcomeStatus`] for tasks.
/// `calls_used` is the run's running call total at the point the record
/// describes: after that attempt's call, or after the whole task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    pub status: String,
    pub code_length: usize,
    pub passed: bool,
    pub calls_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProgressRecord {
    pub fn for_attempt(run_id: Uuid, task_id: TaskId, attempt: &Attempt, calls_used: u32) -> Self {
        debug!(%task_id, attempt = attempt.index(), "ProgressRecord::for_attempt: called");
        Self {
            timestamp: Utc::now(),
            run_id,
            task_id,
            attempt: Some(attempt.index()),
            status: attempt.verdict().tag().to_string(),
            code_length: attempt.source().len(),
            passed: attempt.is_success(),
            calls_used,
            detail: (!attempt.is_success()).then(|| attempt.verdict().summary()),
        }
    }

    pub fn for_task(
        run_id: Uuid,
        task_id: TaskId,
        status: OutcomeStatus,
        code_length: usize,
        calls_used: u32,
        detail: Option<String>,
    ) -> Self {
        debug!(%task_id, %status, "ProgressRecord::for_task: called");
        Self {
            timestamp: Utc::now(),
            run_id,
            task_id,
            attempt: None,
            status: status.as_str().to_string(),
            code_length,
            passed: status == OutcomeStatus::Success,
            calls_used,
            detail,
        }
    }

    pub fn is_task_record(&self) -> bool {
        self.attempt.is_none()
    }
}

/// Read a progress log, skipping lines that do not parse
///
/// A missing file is an empty log.
pub fn read_records(path: impl AsRef<Path>) -> eyre::Result<Vec<ProgressRecord>> {
    let path = path.as_ref();
    debug!(?path, "read_records: called");
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ProgressRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(line = n + 1, error = %e, "Skipping malformed progress record"),
        }
    }
    Ok(records)
}

/// Aggregate view of a progress log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressStats {
    /// Task records per status
    pub task_counts: BTreeMap<String, usize>,
    /// Attempt records per verdict tag
    pub attempt_counts: BTreeMap<String, usize>,
    /// Distinct tasks with at least one success
    pub solved: usize,
    /// Distinct run ids seen
    pub runs: usize,
    /// Mean length of accepted programs
    pub mean_solution_length: Option<f64>,
}

impl ProgressStats {
    pub fn from_records(records: &[ProgressRecord]) -> Self {
        debug!(records = records.len(), "ProgressStats::from_records: called");
        let mut stats = Self::default();
        let mut solved: BTreeMap<TaskId, usize> = BTreeMap::new();
        let mut runs: Vec<Uuid> = Vec::new();

        for record in records {
            if !runs.contains(&record.run_id) {
                runs.push(record.run_id);
            }
            let counts = if record.is_task_record() {
                &mut stats.task_counts
            } else {
                &mut stats.attempt_counts
            };
            *counts.entry(record.status.clone()).or_default() += 1;

            if record.is_task_record() && record.passed {
                // Latest accepted length wins for a task solved more than once
                solved.insert(record.task_id, record.code_length);
            }
        }

        stats.solved = solved.len();
        stats.runs = runs.len();
        if !solved.is_empty() {
            stats.mean_solution_length = Some(solved.values().sum::<usize>() as f64 / solved.len() as f64);
        }
        stats
    }

    pub fn task_count(&self, status: OutcomeStatus) -> usize {
        self.task_counts.get(status.as_str()).copied().unwrap_or(0)
    }
}
