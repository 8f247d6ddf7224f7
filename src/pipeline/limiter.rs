use crate::state::QuotaWindow;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Daily call quota per named key
///
/// Windows are created lazily on first use and replaced once they expire; no
/// background eviction runs. All keys share one lock, which is plenty for the
/// handful of calls a run makes.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, QuotaWindow>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one unit of `key` if fewer than `daily_limit` were used in the
    /// current window
    ///
    /// # Returns
    ///
    /// * `true` - The call may proceed
    /// * `false` - The quota is exhausted until the window resets
    pub fn try_acquire(&self, key: &str, daily_limit: u32) -> bool {
        self.try_acquire_at(key, daily_limit, Utc::now())
    }

    /// Same as `try_acquire` with an explicit clock
    pub fn try_acquire_at(&self, key: &str, daily_limit: u32, now: DateTime<Utc>) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let window = windows
            .entry(key.to_string())
            .or_insert_with(|| QuotaWindow::open(now));
        if window.is_expired(now) {
            *window = QuotaWindow::open(now);
        }

        if !window.has_capacity(daily_limit) {
            tracing::warn!(key, limit = daily_limit, reset_at = %window.reset_at, "Quota exhausted");
            return false;
        }

        window.record();
        true
    }

    /// When the current window for `key` resets, if one is open
    pub fn reset_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.get(key).map(|w| w.reset_at)
    }

    /// Calls still available for `key` under `daily_limit`
    pub fn remaining(&self, key: &str, daily_limit: u32) -> u32 {
        self.remaining_at(key, daily_limit, Utc::now())
    }

    pub fn remaining_at(&self, key: &str, daily_limit: u32, now: DateTime<Utc>) -> u32 {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        match windows.get(key) {
            Some(window) if !window.is_expired(now) => window.remaining(daily_limit),
            _ => daily_limit,
        }
    }
}
