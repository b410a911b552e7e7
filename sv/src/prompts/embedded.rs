//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// System prompt sent with every oracle call
pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");

/// First attempt of a task
pub const INITIAL: &str = include_str!("../../prompts/initial.pmt");

/// Attempts 2..N, carrying the previous failure
pub const REFINE: &str = include_str!("../../prompts/refine.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system" => Some(SYSTEM),
        "initial" => Some(INITIAL),
        "refine" => Some(REFINE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
