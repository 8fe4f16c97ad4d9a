//! Monotonic de-duplication of update events.

use crate::events::UpdateReason;

/// Admits an update only when its modification time is strictly newer than
/// the last one admitted.
///
/// The initial update is always admitted and sets the baseline. Equal or
/// older times (re-reads, clock skew) are rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmitGate {
    last_mtime: Option<u64>,
}

impl EmitGate {
    /// Gate with no baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether to emit, recording `mtime_ms` if so.
    pub fn admit(&mut self, reason: UpdateReason, mtime_ms: u64) -> bool {
        let stale = self.last_mtime.is_some_and(|last| mtime_ms <= last);
        if reason == UpdateReason::Poll && stale {
            return false;
        }
        self.last_mtime = Some(mtime_ms);
        true
    }

    /// Last admitted modification time.
    pub fn last_mtime(&self) -> Option<u64> {
        self.last_mtime
    }
}
