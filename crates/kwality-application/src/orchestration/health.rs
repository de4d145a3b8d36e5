//! Container runtime health breaker.
//!
//! Consecutive `RuntimeUnavailable` failures inside a time window trip the
//! orchestrator into degraded mode: new admissions are rejected until a
//! sandbox run succeeds again or the window expires.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use kwality_domain::constants::{DEGRADED_MODE_THRESHOLD, DEGRADED_MODE_WINDOW_SECS};

/// Tracks consecutive runtime failures.
pub struct RuntimeHealth {
    consecutive: AtomicU32,
    last_failure: Mutex<Option<Instant>>,
    threshold: u32,
    window: Duration,
}

impl RuntimeHealth {
    /// Breaker with the default threshold and window.
    pub fn new() -> Self {
        Self::with_policy(
            DEGRADED_MODE_THRESHOLD,
            Duration::from_secs(DEGRADED_MODE_WINDOW_SECS),
        )
    }

    /// Breaker with an explicit threshold and window.
    pub fn with_policy(threshold: u32, window: Duration) -> Self {
        Self {
            consecutive: AtomicU32::new(0),
            last_failure: Mutex::new(None),
            threshold,
            window,
        }
    }

    /// Record a `RuntimeUnavailable` occurrence.
    pub fn record_failure(&self) {
        let mut last = self.last_failure.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let within_window = last.is_some_and(|t| now.duration_since(t) <= self.window);
        if within_window {
            self.consecutive.fetch_add(1, Ordering::SeqCst);
        } else {
            self.consecutive.store(1, Ordering::SeqCst);
        }
        *last = Some(now);
    }

    /// Record a successful sandbox interaction, closing the breaker.
    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Whether admissions should be rejected right now.
    pub fn is_degraded(&self) -> bool {
        if self.consecutive.load(Ordering::SeqCst) < self.threshold {
            return false;
        }
        let last = *self.last_failure.lock().unwrap_or_else(|e| e.into_inner());
        // The breaker re-arms itself once the window has passed without
        // further failures.
        last.is_some_and(|t| t.elapsed() <= self.window)
    }
}

impl Default for RuntimeHealth {
    fn default() -> Self {
        Self::new()
    }
}
