//! Candidate source extraction from raw oracle text

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

const FENCE: &str = "```";

/// Info-string after an opening fence (`python`, `py3`, `c++`, ...)
static LANG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_+.\-]*$").expect("valid language tag regex"));

/// Pulls candidate source out of whatever the oracle said
///
/// Rules, in order:
/// - fenced blocks (with or without a language tag): the first non-empty one wins
/// - an opening fence with no closing fence: everything after it
/// - no fences at all: the whole input
///
/// The result is trimmed. Empty means nothing usable was found.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputExtractor;

impl OutputExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, raw: &str) -> String {
        debug!(raw_len = raw.len(), "OutputExtractor::extract: called");

        if !raw.contains(FENCE) {
            debug!("OutputExtractor::extract: no fences, using whole input");
            return raw.trim().to_string();
        }

        // Odd segments are fence bodies; a trailing odd segment with no closing
        // fence is the unterminated case and is handled the same way.
        for (n, body) in raw.split(FENCE).enumerate().skip(1).step_by(2) {
            let code = strip_language_tag(body).trim();
            if !code.is_empty() {
                debug!(block = n / 2 + 1, code_len = code.len(), "OutputExtractor::extract: using fenced block");
                return code.to_string();
            }
        }

        debug!("OutputExtractor::extract: only empty fences");
        String::new()
    }
}

fn strip_language_tag(body: &str) -> &str {
    match body.split_once('\n') {
        Some((first, rest)) if LANG_TAG_RE.is_match(first.trim()) => rest,
        Some(_) => body,
        // Single-line block: a lone tag means an empty block
        None if LANG_TAG_RE.is_match(body.trim()) => "",
        None => body,
    }
}
