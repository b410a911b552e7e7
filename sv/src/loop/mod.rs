//! Attempt loop for selfverify
//!
//! The engine runs one task: prompt → oracle → extract → validate, refining
//! on the previous failure until a candidate passes, attempts run out, or the
//! run-wide call budget is spent. The runner drives the engine across a range
//! of tasks and records what happened.

mod engine;
mod runner;

pub use engine::{AttemptOrchestrator, TaskOutcome, TaskStatus};
pub use runner::{RunDriver, RunSettings, RunSummary, TaskReport};
