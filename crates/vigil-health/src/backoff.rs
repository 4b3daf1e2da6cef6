//! Exponential backoff schedule between probe attempts.

use std::time::Duration;

use vigil_core::ProbeSettings;

/// Doubling backoff: `base`, `2 * base`, `4 * base`, ...
///
/// Uncapped unless [`Backoff::with_max`] is used; the poller's deadline
/// is what bounds the total number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Option<Duration>,
}

impl Backoff {
    /// Uncapped schedule starting at `base`.
    pub fn new(base: Duration) -> Self {
        Self { base, max: None }
    }

    /// Cap every interval at `max`.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    /// Schedule from `base_interval` and `max_interval`.
    pub fn from_settings(settings: &ProbeSettings) -> Self {
        let backoff = Self::new(settings.base_interval);
        match settings.max_interval {
            Some(max) => backoff.with_max(max),
            None => backoff,
        }
    }

    /// Wait after the first failure.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Cap on any single wait, if set.
    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Wait after the failure numbered `attempt` (0-based): `base << attempt`.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn interval(&self, attempt: u32) -> Duration {
        let doubled = 1u32
            .checked_shl(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        match self.max {
            Some(max) => doubled.min(max),
            None => doubled,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
