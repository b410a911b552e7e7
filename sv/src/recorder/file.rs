//! FileRecorder - solutions as `.py` files, progress as JSONL

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::Context;
use tracing::debug;

use super::{ProgressRecord, ResultRecorder};
use crate::domain::{Attempt, TaskId};

/// Writes results under two directories
///
/// - `<output>/taskNNN.py` for accepted programs
/// - `<output>/failed/taskNNN_attemptK.py` for failed attempts
/// - `<log>/progress.jsonl`, one record per line
#[derive(Debug, Clone)]
pub struct FileRecorder {
    output_dir: PathBuf,
    failed_dir: PathBuf,
    progress_path: PathBuf,
}

impl FileRecorder {
    /// Create the recorder and its directories
    pub fn new(output_dir: impl AsRef<Path>, log_dir: impl AsRef<Path>) -> eyre::Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        let log_dir = log_dir.as_ref();
        debug!(?output_dir, ?log_dir, "FileRecorder::new: called");

        let failed_dir = output_dir.join("failed");
        fs::create_dir_all(&failed_dir).context(format!("Failed to create {}", failed_dir.display()))?;
        fs::create_dir_all(log_dir).context(format!("Failed to create {}", log_dir.display()))?;

        Ok(Self {
            output_dir,
            failed_dir,
            progress_path: progress_log_path(log_dir),
        })
    }

    pub fn solution_path(&self, task_id: TaskId) -> PathBuf {
        solution_path(&self.output_dir, task_id)
    }

    pub fn failed_attempt_path(&self, task_id: TaskId, attempt: u32) -> PathBuf {
        self.failed_dir.join(format!("{}_attempt{}.py", task_id.stem(), attempt))
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }
}

/// Where an accepted program for `task_id` lives under `output_dir`
pub fn solution_path(output_dir: &Path, task_id: TaskId) -> PathBuf {
    output_dir.join(format!("{}.py", task_id.stem()))
}

/// The progress log inside `log_dir`
pub fn progress_log_path(log_dir: &Path) -> PathBuf {
    log_dir.join("progress.jsonl")
}

impl ResultRecorder for FileRecorder {
    fn has_solution(&self, task_id: TaskId) -> bool {
        let exists = self.solution_path(task_id).exists();
        debug!(%task_id, exists, "FileRecorder::has_solution: called");
        exists
    }

    fn save_accepted(&self, task_id: TaskId, source: &str) -> eyre::Result<PathBuf> {
        let path = self.solution_path(task_id);
        debug!(%task_id, ?path, "FileRecorder::save_accepted: called");
        fs::write(&path, source).context(format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    fn save_failed_attempt(&self, task_id: TaskId, attempt: &Attempt) -> eyre::Result<Option<PathBuf>> {
        debug!(%task_id, attempt = attempt.index(), "FileRecorder::save_failed_attempt: called");
        if attempt.source().is_empty() {
            return Ok(None);
        }
        let path = self.failed_attempt_path(task_id, attempt.index());
        fs::write(&path, attempt.source()).context(format!("Failed to write {}", path.display()))?;
        Ok(Some(path))
    }

    fn record_outcome(&self, record: &ProgressRecord) -> eyre::Result<()> {
        debug!(task_id = %record.task_id, status = %record.status, "FileRecorder::record_outcome: called");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.progress_path)
            .context(format!("Failed to open {}", self.progress_path.display()))?;
        let json = serde_json::to_string(record)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Verdict;
    use crate::recorder::{OutcomeStatus, read_records};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn recorder(temp: &TempDir) -> FileRecorder {
        FileRecorder::new(temp.path().join("output"), temp.path().join("logs")).unwrap()
    }

    #[test]
    fn test_save_accepted_and_has_solution() {
        let temp = TempDir::new().unwrap();
        let rec = recorder(&temp);
        assert!(!rec.has_solution(TaskId(7)));

        let path = rec.save_accepted(TaskId(7), "def p(g):return g").unwrap();
        assert!(path.ends_with("output/task007.py"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "def p(g):return g");
        assert!(rec.has_solution(TaskId(7)));
    }

    #[test]
    fn test_save_failed_attempt() {
        let temp = TempDir::new().unwrap();
        let rec = recorder(&temp);

        let attempt = Attempt::new(2, "def p(g):return 0", Verdict::runtime_failure(1, "x"));
        let path = rec.save_failed_attempt(TaskId(12), &attempt).unwrap().unwrap();
        assert!(path.ends_with("output/failed/task012_attempt2.py"));

        let empty = Attempt::new(3, "", Verdict::oracle_failure("down"));
        assert!(rec.save_failed_attempt(TaskId(12), &empty).unwrap().is_none());
    }

    #[test]
    fn test_record_outcome_appends_lines() {
        let temp = TempDir::new().unwrap();
        let rec = recorder(&temp);
        let run_id = Uuid::now_v7();

        rec.record_outcome(&ProgressRecord::for_task(run_id, TaskId(1), OutcomeStatus::Success, 12, 1, None))
            .unwrap();
        rec.record_outcome(&ProgressRecord::for_task(run_id, TaskId(2), OutcomeStatus::Exhausted, 0, 4, None))
            .unwrap();

        let records = read_records(rec.progress_path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, "success");
        assert_eq!(records[1].task_id, TaskId(2));
    }
}
