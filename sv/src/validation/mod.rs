//! Candidate validation
//!
//! [`CodeValidator`] runs a candidate through three short-circuiting phases
//! (parse, load, functional) on top of a [`CandidateRuntime`]. The production
//! runtime is [`PythonRuntime`], which executes every phase in a fresh,
//! time-limited interpreter process.

mod python;
pub mod runtime;
mod validator;

pub use python::PythonRuntime;
pub use runtime::{CandidateRuntime, InvokeOutcome, LoadOutcome, ParseOutcome, SandboxError};
pub use validator::CodeValidator;
