//! CallBudget - run-wide ceiling on oracle invocations

use tracing::debug;

/// Counts oracle calls against a fixed ceiling for one run
///
/// Created once per run and passed by `&mut` to everything that may call the
/// oracle. The counter only ever goes up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallBudget {
    used: u32,
    ceiling: u32,
}

impl CallBudget {
    pub fn new(ceiling: u32) -> Self {
        debug!(ceiling, "CallBudget::new: called");
        Self { used: 0, ceiling }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.used)
    }

    /// True once no further oracle call may be made
    pub fn is_exhausted(&self) -> bool {
        let exhausted = self.used >= self.ceiling;
        debug!(used = self.used, ceiling = self.ceiling, exhausted, "CallBudget::is_exhausted: called");
        exhausted
    }

    /// Count one oracle call; done before the call so failed calls still count
    pub fn record_call(&mut self) {
        self.used = self.used.saturating_add(1);
        debug!(used = self.used, ceiling = self.ceiling, "CallBudget::record_call: called");
    }
}
