//! selfverify - Self-Verifying Program Synthesis Loop
//!
//! selfverify asks a language model for a small Python program that maps each
//! input grid of a task to its output grid, runs the candidate against every
//! training example, and only accepts code that reproduces all of them. Failed
//! candidates are fed back into the next prompt as refinement context.
//!
//! # Core Concepts
//!
//! - **Verify Before Accept**: Nothing is saved as a solution until it passes every train example
//! - **Isolated Execution**: Candidates run in a fresh interpreter with a timeout and memory ceiling
//! - **Shared Budget**: One call ceiling bounds the whole run, not each task
//! - **Append-Only Record**: Every attempt and task outcome lands in a JSONL progress log
//!
//! # Modules
//!
//! - [`domain`] - Task, example, verdict and budget types
//! - [`tasks`] - Task file discovery and loading
//! - [`llm`] - LLM client trait and OpenAI-compatible implementation
//! - [`oracle`] - Candidate generation on top of an LLM client
//! - [`extract`] - Pulling program text out of a model reply
//! - [`validation`] - Sandboxed execution and verdicts
//! - [`feedback`] - Refinement context from a failed attempt
//! - [`prompts`] - Handlebars prompt templates
//! - [`recorder`] - Solutions, failed attempts and the progress log
//! - [`r#loop`] - Per-task attempt loop and the run driver
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod extract;
pub mod feedback;
pub mod llm;
pub mod oracle;
pub mod prompts;
pub mod recorder;
pub mod tasks;
pub mod validation;

// Note: 'loop' is a reserved keyword, so we use r#loop
#[path = "loop/mod.rs"]
pub mod r#loop;

// Re-export commonly used types
pub use config::{Config, FeedbackConfig, LlmConfig, RunConfig, SandboxConfig};
pub use domain::{Attempt, CallBudget, Example, ExampleSet, TaskId, Verdict};
pub use extract::OutputExtractor;
pub use feedback::{FeedbackContextBuilder, RefinementContext};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use oracle::{CandidateOracle, LlmOracle, OracleError};
pub use prompts::{PromptBuilder, PromptContext, PromptLoader};
pub use r#loop::{AttemptOrchestrator, RunDriver, RunSettings, RunSummary, TaskOutcome, TaskReport, TaskStatus};
pub use recorder::{
    FileRecorder, OutcomeStatus, ProgressRecord, ProgressStats, ResultRecorder, progress_log_path, read_records,
    solution_path,
};
pub use tasks::{TaskCatalog, TaskEntry, TaskError};
pub use validation::{
    CandidateRuntime, CodeValidator, InvokeOutcome, LoadOutcome, ParseOutcome, PythonRuntime, SandboxError,
};
