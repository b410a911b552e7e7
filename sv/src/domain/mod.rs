//! Domain types for selfverify
//!
//! - ExampleSet: the train/test examples for one task
//! - Attempt/Verdict: one oracle round trip and how its candidate fared
//! - CallBudget: the run-wide ceiling on oracle invocations

mod attempt;
mod budget;
mod example;

pub use attempt::{Attempt, Verdict};
pub use budget::CallBudget;
pub use example::{Example, ExampleSet, TaskId};
