//! Process-wide readiness signal read by the health endpoint.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Whether the bot can currently do useful work, plus a few counters for the health endpoint.
///
/// Liveness is implied by the process answering at all; readiness tracks whether the YouTube
/// credential is usable. Shared behind an `Arc` by the credential guardian, the coordinator
/// and the health server.
#[derive(Debug)]
pub struct ReadinessState {
    ready: AtomicBool,
    started: Instant,
    failures: AtomicU64,
}

impl ReadinessState {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            started: Instant::now(),
            failures: AtomicU64::new(0),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        let was = self.ready.swap(ready, Ordering::SeqCst);
        if was != ready {
            tracing::info!(ready, "readiness changed");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Counts one failed ingestion.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}
