//! Clock implementations for wall-clock and pinned-time hosts.

use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use desktop_contract::Clock;

/// Returns the current unix timestamp in milliseconds.
pub fn unix_time_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, Default)]
/// Wall-clock [`Clock`].
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_ms(&self) -> u64 {
        unix_time_ms_now()
    }
}

#[derive(Debug, Clone)]
/// Manually driven [`Clock`] for deterministic tests; clones share one instant.
pub struct FixedClock {
    now_ms: Rc<Cell<u64>>,
}

impl FixedClock {
    /// Clock pinned at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Rc::new(Cell::new(now_ms)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, delta: Duration) {
        self.now_ms
            .set(self.now_ms.get().saturating_add(delta.as_millis() as u64));
    }

    /// Pins the clock to an absolute instant.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.set(now_ms);
    }
}

impl Clock for FixedClock {
    fn now_unix_ms(&self) -> u64 {
        self.now_ms.get()
    }
}
