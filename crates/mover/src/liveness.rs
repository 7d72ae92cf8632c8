//! Liveness counters shared between a mover and the supervisor

use std::sync::atomic::{AtomicU64, Ordering};

/// Progress of a single mover
///
/// Written by the mover task only, read by the watchdog.
#[derive(Debug, Default)]
pub struct Liveness {
    /// Non-empty forwards completed
    forwards: AtomicU64,
    /// Bytes forwarded
    bytes: AtomicU64,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwards(&self) -> u64 {
        self.forwards.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Record one forward of `len` bytes
    pub fn record(&self, len: usize) {
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
        self.forwards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LivenessSnapshot {
        LivenessSnapshot {
            forwards: self.forwards(),
            bytes: self.bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessSnapshot {
    pub forwards: u64,
    pub bytes: u64,
}
