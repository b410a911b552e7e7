//! Result recording
//!
//! A [`ResultRecorder`] receives accepted programs, failed attempts and one
//! [`ProgressRecord`] per attempt and per task. [`FileRecorder`] writes them
//! to disk; [`read_records`] and [`ProgressStats`] read the log back.

mod file;
mod record;

use std::path::PathBuf;

use crate::domain::{Attempt, TaskId};

pub use file::{FileRecorder, progress_log_path, solution_path};
pub use record::{OutcomeStatus, ProgressRecord, ProgressStats, read_records};

/// Sink for everything a run produces
pub trait ResultRecorder: Send + Sync {
    /// Whether an accepted program already exists for this task
    fn has_solution(&self, task_id: TaskId) -> bool;

    /// Persist an accepted program; returns where it went
    fn save_accepted(&self, task_id: TaskId, source: &str) -> eyre::Result<PathBuf>;

    /// Persist a failed attempt's source; None when there was no source to keep
    fn save_failed_attempt(&self, task_id: TaskId, attempt: &Attempt) -> eyre::Result<Option<PathBuf>>;

    /// Append one outcome record
    fn record_outcome(&self, record: &ProgressRecord) -> eyre::Result<()>;
}
