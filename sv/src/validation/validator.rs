//! CodeValidator - parse, load, then check every train example

use std::sync::Arc;

use tracing::{debug, warn};

use super::runtime::{CandidateRuntime, InvokeOutcome, LoadOutcome, ParseOutcome};
use crate::domain::{Example, Verdict};

/// Turns candidate source plus examples into a [`Verdict`]
///
/// Phases short-circuit: nothing executes before the parse succeeds, and no
/// example runs after the first failing one. Sandbox errors become
/// `RuntimeFailure` at the index of the phase they hit; they never escape.
#[derive(Clone)]
pub struct CodeValidator {
    runtime: Arc<dyn CandidateRuntime>,
}

impl CodeValidator {
    pub fn new(runtime: Arc<dyn CandidateRuntime>) -> Self {
        Self { runtime }
    }

    pub async fn validate(&self, source: &str, examples: &[Example]) -> Verdict {
        debug!(source_len = source.len(), examples = examples.len(), "CodeValidator::validate: called");

        match self.runtime.parse(source).await {
            Ok(ParseOutcome::Valid) => debug!("CodeValidator::validate: parse ok"),
            Ok(ParseOutcome::Invalid(detail)) => {
                debug!(%detail, "CodeValidator::validate: syntax invalid");
                return Verdict::syntax_invalid(detail);
            }
            Err(e) => {
                warn!(error = %e, "CodeValidator::validate: sandbox error during parse");
                return Verdict::runtime_failure(0, e.to_string());
            }
        }

        match self.runtime.load(source).await {
            Ok(LoadOutcome::Ready) => debug!("CodeValidator::validate: load ok"),
            Ok(LoadOutcome::MissingEntryPoint(detail)) => {
                debug!(%detail, "CodeValidator::validate: entry point missing");
                return Verdict::EntryPointMissing;
            }
            Ok(LoadOutcome::Failed(detail)) => {
                debug!(%detail, "CodeValidator::validate: load raised");
                return Verdict::runtime_failure(0, detail);
            }
            Err(e) => {
                warn!(error = %e, "CodeValidator::validate: sandbox error during load");
                return Verdict::runtime_failure(0, e.to_string());
            }
        }

        for (i, example) in examples.iter().enumerate() {
            let index = i + 1;
            match self.runtime.invoke(source, example.input.clone()).await {
                Ok(InvokeOutcome::Returned(actual)) if actual == example.output => {
                    debug!(index, "CodeValidator::validate: example matched");
                }
                Ok(InvokeOutcome::Returned(actual)) => {
                    debug!(index, "CodeValidator::validate: mismatch");
                    return Verdict::Mismatch {
                        example_index: index,
                        expected: example.output.clone(),
                        actual,
                    };
                }
                Ok(InvokeOutcome::Raised(detail)) => {
                    debug!(index, %detail, "CodeValidator::validate: example raised");
                    return Verdict::runtime_failure(index, detail);
                }
                Ok(InvokeOutcome::TimedOut(limit)) => {
                    debug!(index, "CodeValidator::validate: example timed out");
                    return Verdict::runtime_failure(index, format!("timed out after {}ms", limit.as_millis()));
                }
                Err(e) => {
                    warn!(index, error = %e, "CodeValidator::validate: sandbox error during invoke");
                    return Verdict::runtime_failure(index, e.to_string());
                }
            }
        }

        debug!("CodeValidator::validate: all examples matched");
        Verdict::Success
    }
}
