//! Example and ExampleSet domain types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Numeric task identifier (`task007.json` -> 7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl TaskId {
    /// File stem used for task and solution files, e.g. `task007`
    pub fn stem(&self) -> String {
        format!("task{:03}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl From<u32> for TaskId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A single input -> output pair
///
/// Values are kept as raw JSON so any grid-like structure round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub input: Value,
    pub output: Value,
}

impl Example {
    pub fn new(input: Value, output: Value) -> Self {
        Self { input, output }
    }
}

/// Train and test examples for one task
///
/// Constructed through [`ExampleSet::new`], which enforces at least one train example.
#[derive(Debug, Clone, PartialEq)]
pub struct ExampleSet {
    task_id: TaskId,
    train: Vec<Example>,
    test: Vec<Example>,
}

impl ExampleSet {
    /// Build an example set; returns None when there are no train examples
    pub fn new(task_id: TaskId, train: Vec<Example>, test: Vec<Example>) -> Option<Self> {
        debug!(%task_id, train = train.len(), test = test.len(), "ExampleSet::new: called");
        if train.is_empty() {
            debug!(%task_id, "ExampleSet::new: no train examples");
            return None;
        }
        Some(Self { task_id, train, test })
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn train(&self) -> &[Example] {
        &self.train
    }

    pub fn test(&self) -> &[Example] {
        &self.test
    }

    /// Same task with the test examples appended to the train list
    ///
    /// Used when re-checking a saved solution against every known example.
    pub fn with_test_as_train(&self) -> Self {
        debug!(task_id = %self.task_id, "ExampleSet::with_test_as_train: called");
        let mut train = self.train.clone();
        train.extend(self.test.iter().cloned());
        Self {
            task_id: self.task_id,
            train,
            test: Vec::new(),
        }
    }
}
