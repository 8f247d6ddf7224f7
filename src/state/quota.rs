use chrono::{DateTime, Duration, Utc};

/// Length of one quota window
pub const QUOTA_WINDOW_HOURS: i64 = 24;

/// Tracks consumption of one quota key inside its current 24-hour window
///
/// A window opens on first use and is replaced once `now >= reset_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaWindow {
    /// Calls consumed in the current window
    pub count: u32,

    /// When the window expires
    pub reset_at: DateTime<Utc>,
}

impl QuotaWindow {
    /// Opens a fresh window starting at `now`
    pub fn open(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            reset_at: now + Duration::hours(QUOTA_WINDOW_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.reset_at
    }

    /// Checks if one more call fits under `limit`
    pub fn has_capacity(&self, limit: u32) -> bool {
        self.count < limit
    }

    /// Records that a call was made
    pub fn record(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Returns the number of calls remaining under `limit`
    pub fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_window() {
        let now = Utc::now();
        let window = QuotaWindow::open(now);
        assert_eq!(window.count, 0);
        assert_eq!(window.reset_at - now, Duration::hours(24));
        assert!(!window.is_expired(now));
    }

    #[test]
    fn test_expires_exactly_at_reset() {
        let now = Utc::now();
        let window = QuotaWindow::open(now);
        assert!(!window.is_expired(now + Duration::hours(24) - Duration::seconds(1)));
        assert!(window.is_expired(now + Duration::hours(24)));
    }

    #[test]
    fn test_capacity_and_remaining() {
        let mut window = QuotaWindow::open(Utc::now());
        window.record();
        window.record();

        assert!(window.has_capacity(3));
        assert_eq!(window.remaining(3), 1);

        window.record();
        assert!(!window.has_capacity(3));
        assert_eq!(window.remaining(3), 0);
        assert_eq!(window.remaining(1), 0);
    }
}
