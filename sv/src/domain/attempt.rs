//! Attempt and Verdict domain types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Outcome of one attempt
///
/// The validator produces every variant except `OracleFailure`, which the
/// orchestrator records when the oracle call itself failed and there was no
/// candidate to validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Candidate did not parse
    SyntaxInvalid { detail: String },

    /// Candidate parsed but has no usable entry point
    EntryPointMissing,

    /// Candidate raised (or timed out). `example_index` is 1-based; 0 means
    /// the module failed while loading, before any example ran.
    RuntimeFailure { example_index: usize, detail: String },

    /// Candidate returned the wrong value for a train example (1-based index)
    Mismatch {
        example_index: usize,
        expected: Value,
        actual: Value,
    },

    /// Candidate reproduced every train output
    Success,

    /// The oracle call failed; no candidate was produced
    OracleFailure { detail: String },
}

impl Verdict {
    pub fn syntax_invalid(detail: impl Into<String>) -> Self {
        Self::SyntaxInvalid { detail: detail.into() }
    }

    pub fn runtime_failure(example_index: usize, detail: impl Into<String>) -> Self {
        Self::RuntimeFailure {
            example_index,
            detail: detail.into(),
        }
    }

    pub fn oracle_failure(detail: impl Into<String>) -> Self {
        Self::OracleFailure { detail: detail.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Stable snake_case tag used in progress records
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SyntaxInvalid { .. } => "syntax_invalid",
            Self::EntryPointMissing => "entry_point_missing",
            Self::RuntimeFailure { .. } => "runtime_failure",
            Self::Mismatch { .. } => "mismatch",
            Self::Success => "success",
            Self::OracleFailure { .. } => "oracle_failure",
        }
    }

    /// One-line description for logs and progress records
    pub fn summary(&self) -> String {
        debug!(tag = self.tag(), "Verdict::summary: called");
        match self {
            Self::SyntaxInvalid { detail } => format!("syntax invalid: {}", detail),
            Self::EntryPointMissing => "entry point missing".to_string(),
            Self::RuntimeFailure {
                example_index: 0,
                detail,
            } => format!("failed while loading: {}", detail),
            Self::RuntimeFailure { example_index, detail } => {
                format!("example {} raised: {}", example_index, detail)
            }
            Self::Mismatch { example_index, .. } => format!("example {} output mismatch", example_index),
            Self::Success => "passed all train examples".to_string(),
            Self::OracleFailure { detail } => format!("oracle failure: {}", detail),
        }
    }
}

/// One oracle round trip: the candidate it produced and how it fared
///
/// Fields are private so an attempt cannot change after its verdict is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    index: u32,
    source: String,
    verdict: Verdict,
}

impl Attempt {
    pub fn new(index: u32, source: impl Into<String>, verdict: Verdict) -> Self {
        let source = source.into();
        debug!(index, source_len = source.len(), verdict = verdict.tag(), "Attempt::new: called");
        Self { index, source, verdict }
    }

    /// 1-based attempt number within its task
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Candidate source text (empty if the oracle produced nothing usable)
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn is_success(&self) -> bool {
        self.verdict.is_success()
    }
}
