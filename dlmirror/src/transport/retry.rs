//! Retry loop shared by file downloads and API calls.

use std::thread;
use std::time::Duration;

use crate::error::MirrorResult;

/// Default number of attempts before giving up on a transient failure.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;

/// Bounded retry for transient transport failures.
///
/// Only errors for which [`MirrorError::is_retriable`] is true are retried;
/// everything else is returned after the first attempt.
///
/// [`MirrorError::is_retriable`]: crate::error::MirrorError::is_retriable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (minimum 1).
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The error of the last attempt is returned.
    pub fn run<T, F>(&self, url: &str, mut op: F) -> MirrorResult<T>
    where
        F: FnMut() -> MirrorResult<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retriable() && attempt < max_attempts => {
                    tracing::warn!(url, attempt, max_attempts, error = %e, "Transient failure, retrying");
                    attempt += 1;
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
