//! Staleness policy for cached balances

use std::time::Duration;

/// Cached balances younger than this are not refetched
pub const BALANCE_VALIDITY_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    window: Duration,
}

impl StalenessPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether data stamped at `last` (unix millis) is still fresh at `now`.
    ///
    /// A missing timestamp is always stale.
    pub fn is_fresh_at(&self, last: Option<i64>, now: i64) -> bool {
        match last {
            Some(last) => {
                let age = now.saturating_sub(last);
                age < self.window.as_millis() as i64
            }
            None => false,
        }
    }

    pub fn is_fresh(&self, last: Option<i64>) -> bool {
        self.is_fresh_at(last, now_millis())
    }

    pub fn should_skip_refresh(&self, last: Option<i64>) -> bool {
        self.is_fresh(last)
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(BALANCE_VALIDITY_PERIOD)
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
