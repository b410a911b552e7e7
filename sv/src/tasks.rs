//! Task discovery and loading
//!
//! Task files live in one directory as `taskNNN.json`, each holding
//! `{"train": [{"input": .., "output": ..}, ..], "test": [..]}`. Extra keys
//! (e.g. `arc-gen`) are ignored.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Example, ExampleSet, TaskId};

static TASK_FILE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"task(\d+)\.json$").expect("valid task file regex"));

/// Errors loading a task file
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Failed to read task file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse task file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Task file {0} has no train examples")]
    NoTrainExamples(PathBuf),

    #[error("Could not extract task number from path: {0}")]
    UnrecognizedPath(PathBuf),
}

/// A task file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub id: TaskId,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TaskFile {
    #[serde(default)]
    train: Vec<Example>,
    #[serde(default)]
    test: Vec<Example>,
}

/// Locates task files in a data directory
#[derive(Debug, Clone)]
pub struct TaskCatalog {
    data_dir: PathBuf,
}

impl TaskCatalog {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        debug!(?data_dir, "TaskCatalog::new: called");
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path a task file would have, whether or not it exists
    pub fn path_for(&self, id: TaskId) -> PathBuf {
        self.data_dir.join(format!("{}.json", id.stem()))
    }

    /// Task files for ids `start..=end`, in id order
    ///
    /// Missing files are logged and skipped.
    pub fn discover(&self, start: u32, end: u32) -> Vec<TaskEntry> {
        debug!(start, end, data_dir = ?self.data_dir, "TaskCatalog::discover: called");
        let mut entries = Vec::new();
        for n in start..=end {
            let id = TaskId(n);
            let path = self.path_for(id);
            if path.exists() {
                entries.push(TaskEntry { id, path });
            } else {
                warn!(path = %path.display(), "Task file not found");
            }
        }
        debug!(found = entries.len(), "TaskCatalog::discover: done");
        entries
    }

    /// Load the example set for one task id
    pub fn load(&self, id: TaskId) -> Result<ExampleSet, TaskError> {
        load_task(&self.path_for(id))
    }
}

/// Extract the task number from a `.../taskNNN.json` path
pub fn task_id_from_path(path: &Path) -> Result<TaskId, TaskError> {
    let name = path.to_string_lossy();
    TASK_FILE_RE
        .captures(&name)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(TaskId)
        .ok_or_else(|| TaskError::UnrecognizedPath(path.to_path_buf()))
}

/// Load and validate one task file
pub fn load_task(path: &Path) -> Result<ExampleSet, TaskError> {
    debug!(?path, "load_task: called");
    let id = task_id_from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: TaskFile = serde_json::from_str(&content).map_err(|source| TaskError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(%id, train = file.train.len(), test = file.test.len(), "load_task: parsed");
    ExampleSet::new(id, file.train, file.test).ok_or_else(|| TaskError::NoTrainExamples(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_task(dir: &Path, id: u32, body: serde_json::Value) -> PathBuf {
        let path = dir.join(format!("task{:03}.json", id));
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    #[test]
    fn test_task_id_from_path() {
        assert_eq!(task_id_from_path(Path::new("/data/task001.json")).unwrap(), TaskId(1));
        assert_eq!(task_id_from_path(Path::new("task400.json")).unwrap(), TaskId(400));
        assert!(task_id_from_path(Path::new("/data/readme.json")).is_err());
    }

    #[test]
    fn test_discover_skips_missing_files() {
        let temp = TempDir::new().unwrap();
        let task = json!({"train": [{"input": [[1]], "output": [[2]]}], "test": []});
        write_task(temp.path(), 1, task.clone());
        write_task(temp.path(), 3, task);

        let catalog = TaskCatalog::new(temp.path());
        let entries = catalog.discover(1, 4);
        let ids: Vec<TaskId> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![TaskId(1), TaskId(3)]);
    }

    #[test]
    fn test_load_task_ignores_extra_keys() {
        let temp = TempDir::new().unwrap();
        let path = write_task(
            temp.path(),
            5,
            json!({
                "train": [{"input": [[0, 1]], "output": [[1, 0]]}],
                "test": [{"input": [[1, 1]], "output": [[1, 1]]}],
                "arc-gen": [{"input": [[2]], "output": [[2]]}]
            }),
        );

        let set = load_task(&path).unwrap();
        assert_eq!(set.task_id(), TaskId(5));
        assert_eq!(set.train()[0].output, json!([[1, 0]]));
        assert_eq!(set.test().len(), 1);
    }

    #[test]
    fn test_load_task_without_train_fails() {
        let temp = TempDir::new().unwrap();
        let path = write_task(temp.path(), 2, json!({"test": [{"input": [[1]], "output": [[1]]}]}));
        assert!(matches!(load_task(&path), Err(TaskError::NoTrainExamples(_))));
    }

    #[test]
    fn test_load_task_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("task009.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_task(&path), Err(TaskError::Parse { .. })));
    }
}
