//! Refinement context built from the previous attempt

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::{Attempt, Verdict};

/// What the next prompt is told about the attempt before it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementContext {
    /// Index of the attempt this context describes
    pub attempt: u32,
    pub previous_source: String,
    pub failure: String,
}

/// Turns a failed attempt into a refinement context
///
/// Only looks at the one attempt it is given.
#[derive(Debug, Clone)]
pub struct FeedbackContextBuilder {
    entry_point: String,
    max_value_chars: usize,
}

impl FeedbackContextBuilder {
    pub fn new(entry_point: impl Into<String>, max_value_chars: usize) -> Self {
        Self {
            entry_point: entry_point.into(),
            max_value_chars,
        }
    }

    pub fn build(&self, previous: &Attempt) -> RefinementContext {
        debug!(attempt = previous.index(), verdict = previous.verdict().tag(), "FeedbackContextBuilder::build: called");
        let failure = match previous.verdict() {
            Verdict::SyntaxInvalid { detail } => detail.clone(),
            Verdict::EntryPointMissing => format!(
                "The code does not define a callable `{ep}(g)` that takes exactly one argument. \
                 Define `def {ep}(g):` returning the transformed grid.",
                ep = self.entry_point
            ),
            Verdict::RuntimeFailure {
                example_index: 0,
                detail,
            } => format!("Loading the module raised an error before any example ran: {}", detail),
            Verdict::RuntimeFailure { example_index, detail } => {
                format!("Train example {} raised an error: {}", example_index, detail)
            }
            Verdict::Mismatch {
                example_index,
                expected,
                actual,
            } => format!(
                "Train example {} produced the wrong output.\nExpected: {}\nActual: {}",
                example_index,
                self.render(expected),
                self.render(actual)
            ),
            Verdict::OracleFailure { detail } => {
                format!("The previous generation request failed: {}", detail)
            }
            Verdict::Success => {
                debug!("FeedbackContextBuilder::build: built from a successful attempt");
                "The previous code passed every train example.".to_string()
            }
        };

        RefinementContext {
            attempt: previous.index(),
            previous_source: previous.source().to_string(),
            failure,
        }
    }

    /// Compact single-line JSON, cut to the configured length
    fn render(&self, value: &Value) -> String {
        let text = value.to_string();
        if text.chars().count() <= self.max_value_chars {
            return text;
        }
        let cut: String = text.chars().take(self.max_value_chars).collect();
        format!("{}... ({} chars total)", cut, text.chars().count())
    }
}
