//! CandidateRuntime trait - where candidate code actually runs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Infrastructure failure of the sandbox itself (not of the candidate)
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to start interpreter {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Candidate process timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Candidate process exited without a result (exit code {code:?}): {stderr}")]
    NoResponse { code: Option<i32>, stderr: String },

    #[error("Unreadable result from candidate process: {0}")]
    MalformedResponse(String),

    #[error("Failed to encode sandbox request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Valid,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Module loaded and the entry point takes one argument
    Ready,
    /// Entry point absent, not callable, or wrong arity
    MissingEntryPoint(String),
    /// Module top-level code raised
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    Returned(Value),
    Raised(String),
    TimedOut(Duration),
}

/// Executes untrusted candidate source
///
/// Each call must be independent: nothing a candidate does in one call may be
/// visible to the next.
#[async_trait]
pub trait CandidateRuntime: Send + Sync {
    /// Check the source parses, without executing any of it
    async fn parse(&self, source: &str) -> Result<ParseOutcome, SandboxError>;

    /// Load the source and resolve its entry point
    async fn load(&self, source: &str) -> Result<LoadOutcome, SandboxError>;

    /// Load the source and call the entry point once with `input`
    async fn invoke(&self, source: &str, input: Value) -> Result<InvokeOutcome, SandboxError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type InvokeFn = Box<dyn Fn(&str, &Value) -> InvokeOutcome + Send + Sync>;

    /// Runtime with fixed parse/load answers and a closure over (source, input) for invocations
    pub struct ScriptedRuntime {
        parse: ParseOutcome,
        load: LoadOutcome,
        invoke: InvokeFn,
        parse_calls: AtomicUsize,
        load_calls: AtomicUsize,
        inputs: Mutex<Vec<Value>>,
    }

    impl ScriptedRuntime {
        pub fn new(invoke: impl Fn(&str, &Value) -> InvokeOutcome + Send + Sync + 'static) -> Self {
            Self {
                parse: ParseOutcome::Valid,
                load: LoadOutcome::Ready,
                invoke: Box::new(invoke),
                parse_calls: AtomicUsize::new(0),
                load_calls: AtomicUsize::new(0),
                inputs: Mutex::new(Vec::new()),
            }
        }

        pub fn identity() -> Self {
            Self::new(|_, input| InvokeOutcome::Returned(input.clone()))
        }

        pub fn with_parse(mut self, parse: ParseOutcome) -> Self {
            self.parse = parse;
            self
        }

        pub fn with_load(mut self, load: LoadOutcome) -> Self {
            self.load = load;
            self
        }

        pub fn parse_calls(&self) -> usize {
            self.parse_calls.load(Ordering::SeqCst)
        }

        pub fn load_calls(&self) -> usize {
            self.load_calls.load(Ordering::SeqCst)
        }

        /// Inputs passed to `invoke`, in call order
        pub fn inputs(&self) -> Vec<Value> {
            self.inputs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CandidateRuntime for ScriptedRuntime {
        async fn parse(&self, _source: &str) -> Result<ParseOutcome, SandboxError> {
            self.parse_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.parse.clone())
        }

        async fn load(&self, _source: &str) -> Result<LoadOutcome, SandboxError> {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.load.clone())
        }

        async fn invoke(&self, source: &str, input: Value) -> Result<InvokeOutcome, SandboxError> {
            let outcome = (self.invoke)(source, &input);
            self.inputs.lock().unwrap().push(input);
            Ok(outcome)
        }
    }
}
