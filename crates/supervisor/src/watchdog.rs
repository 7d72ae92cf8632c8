//! Stall detection over the movers' liveness counters

use std::sync::Arc;
use std::time::Duration;

use contracts::WatchdogSettings;
use mover::{Liveness, LivenessSnapshot};
use tracing::trace;

/// Counts consecutive checks without progress
///
/// A pipeline without movers has nothing to observe and never stalls.
#[derive(Debug)]
pub struct Watchdog {
    enabled: bool,
    check_interval: Duration,
    stall_checks: u32,
    counters: Vec<Arc<Liveness>>,
    last: Vec<LivenessSnapshot>,
    idle_checks: u32,
}

impl Watchdog {
    pub fn new(settings: &WatchdogSettings, counters: Vec<Arc<Liveness>>) -> Self {
        let last = counters.iter().map(|c| c.snapshot()).collect();
        Self {
            enabled: settings.enabled,
            check_interval: settings.check_interval(),
            stall_checks: settings.stall_checks.max(1),
            counters,
            last,
            idle_checks: 0,
        }
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn is_armed(&self) -> bool {
        self.enabled && !self.counters.is_empty()
    }

    /// Run one check after a quiet interval
    ///
    /// Returns the idle time once `stall_checks` consecutive checks saw no
    /// counter move.
    pub fn check(&mut self) -> Option<Duration> {
        if !self.is_armed() {
            return None;
        }

        let current: Vec<LivenessSnapshot> = self.counters.iter().map(|c| c.snapshot()).collect();
        if current != self.last {
            self.last = current;
            self.idle_checks = 0;
            return None;
        }

        self.idle_checks += 1;
        trace!(idle_checks = self.idle_checks, "No mover progress");
        (self.idle_checks >= self.stall_checks)
            .then(|| self.check_interval.saturating_mul(self.idle_checks))
    }
}
