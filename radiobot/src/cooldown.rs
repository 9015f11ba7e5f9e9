//! Per-user cooldown for the `/addradio` command.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Remembers when each user last submitted a video.
#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    last_seen: Mutex<HashMap<u64, Instant>>,
}

impl CooldownTracker {
    /// A zero window disables the cooldown entirely.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        !self.window.is_zero()
    }

    /// How much longer `user` has to wait before submitting again.
    pub fn remaining(&self, user: u64, now: Instant) -> Duration {
        if !self.enabled() {
            return Duration::ZERO;
        }
        let last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        match last_seen.get(&user) {
            Some(&at) => self.window.saturating_sub(now.saturating_duration_since(at)),
            None => Duration::ZERO,
        }
    }

    /// Starts a new window for `user` unless one is still running.
    ///
    /// Checking and starting happen under one lock, so of two concurrent submissions only one
    /// gets through. `Err` carries the time left in the running window.
    pub fn try_start(&self, user: u64, now: Instant) -> Result<(), Duration> {
        if !self.enabled() {
            return Ok(());
        }
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&at) = last_seen.get(&user) {
            let wait = self.window.saturating_sub(now.saturating_duration_since(at));
            if !wait.is_zero() {
                return Err(wait);
            }
        }
        // forget users whose window has long passed
        last_seen.retain(|_, at| now.saturating_duration_since(*at) < self.window);
        last_seen.insert(user, now);
        Ok(())
    }
}
