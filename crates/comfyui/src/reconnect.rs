//! Fixed-delay reconnection policy for the ComfyUI trigger.
//!
//! After a connection closes (or fails to open) the trigger waits a
//! fixed interval and tries again, up to an optional retry limit. The
//! retry counter is reset whenever a connection opens successfully.

use std::time::Duration;

/// Default delay between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Tunable parameters for reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before each reconnection attempt.
    pub interval: Duration,
    /// Maximum consecutive retries; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONNECT_INTERVAL,
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from a host-style limit where `-1` (or any negative
    /// number) means unbounded.
    pub fn from_limit(interval: Duration, max_retries: i64) -> Self {
        Self {
            interval,
            max_retries: u32::try_from(max_retries).ok(),
        }
    }

    /// The retry count after scheduling another attempt, or `None` when
    /// `retry_count` retries have already been spent.
    pub fn next_retry(&self, retry_count: u32) -> Option<u32> {
        match self.max_retries {
            Some(max) if retry_count >= max => None,
            _ => Some(retry_count.saturating_add(1)),
        }
    }
}
