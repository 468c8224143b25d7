//! Detection dispatch interval gate

use std::time::{Duration, Instant};

/// Rate limiter that bounds how often frames are dispatched to the
/// detection capability.
///
/// Split into [`ready`](Self::ready) / [`record_dispatch`](Self::record_dispatch)
/// so a dispatch that loses the in-flight slot does not consume the interval.
pub struct DetectionGate {
    interval: Duration,
    last_dispatch: Option<Instant>,
}

impl DetectionGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: None,
        }
    }

    /// Check whether enough time has elapsed since the last recorded dispatch.
    pub fn ready(&self) -> bool {
        match self.last_dispatch {
            None => true,
            Some(at) => at.elapsed() >= self.interval,
        }
    }

    /// Record that a detection cycle was dispatched.
    pub fn record_dispatch(&mut self) {
        self.last_dispatch = Some(Instant::now());
    }
}
