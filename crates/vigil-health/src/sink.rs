//! Diagnostic sink for failed probe attempts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use vigil_core::HumanDuration;

use crate::checker::ProbeError;

/// One failed probe, as reported to an [`AttemptSink`].
#[derive(Debug, Clone, Copy)]
pub struct FailedAttempt<'a> {
    pub target: &'a str,
    /// 1-based attempt number.
    pub attempt: u32,
    pub error: &'a ProbeError,
    /// Suspension before the next deadline check.
    pub wait: Duration,
}

impl fmt::Display for FailedAttempt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server not responding ({}); retrying...", self.error)
    }
}

/// Receives one record per failed probe attempt.
pub trait AttemptSink: Send + Sync {
    fn record_attempt(&self, attempt: &FailedAttempt<'_>);
}

impl<S: AttemptSink + ?Sized> AttemptSink for &S {
    fn record_attempt(&self, attempt: &FailedAttempt<'_>) {
        (**self).record_attempt(attempt);
    }
}

impl<S: AttemptSink + ?Sized> AttemptSink for Arc<S> {
    fn record_attempt(&self, attempt: &FailedAttempt<'_>) {
        (**self).record_attempt(attempt);
    }
}

/// Default sink: one `WARN` event per failed attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AttemptSink for TracingSink {
    fn record_attempt(&self, record: &FailedAttempt<'_>) {
        warn!(
            server = %record.target,
            attempt = record.attempt,
            wait = %HumanDuration(record.wait),
            "{record}"
        );
    }
}

/// Sink that drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AttemptSink for NullSink {
    fn record_attempt(&self, _attempt: &FailedAttempt<'_>) {}
}
