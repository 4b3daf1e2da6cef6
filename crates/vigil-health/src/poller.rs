//! Liveness poller: probe a target until it responds or the deadline passes.
//!
//! ```text
//!            probe fails (record, back off)
//!               ┌──────────┐
//!               ▼          │
//!   start ──▶ Polling ─────┘
//!               │  │
//!   probe ok ◀──┘  └──▶ deadline reached at top of loop
//!   Done/Ok            Done/Err(PollError)
//! ```
//!
//! The deadline is fixed once, at the start of the session. After the
//! n-th consecutive failure (0-based) the poller suspends for
//! `base << n`, but never past the deadline.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use vigil_core::{HumanDuration, ProbeSettings};

use crate::backoff::Backoff;
use crate::checker::{Probe, ProbeError};
use crate::sink::{AttemptSink, FailedAttempt, TracingSink};

/// Stand-in deadline horizon when `now + timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Polling window and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Total polling window, measured from the start of `poll`.
    pub timeout: Duration,
    /// Wait schedule between failed attempts.
    pub backoff: Backoff,
}

impl PollConfig {
    /// Create a config with the given window and backoff schedule.
    pub fn new(timeout: Duration, backoff: Backoff) -> Self {
        Self { timeout, backoff }
    }

    /// Take the window and backoff from resolved probe settings.
    pub fn from_settings(settings: &ProbeSettings) -> Self {
        Self::new(settings.timeout, Backoff::from_settings(settings))
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Backoff::default())
    }
}

/// Every probe inside the polling window failed.
///
/// The message names the configured timeout rather than the measured
/// elapsed time, which can overshoot by the length of a probe.
#[derive(Debug, Error)]
#[error("server {target} failed to respond after {timeout}")]
pub struct PollError {
    target: String,
    timeout: HumanDuration,
    attempts: u32,
    #[source]
    last_error: Option<ProbeError>,
}

impl PollError {
    /// The target that never responded.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The configured polling window.
    pub fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    /// Number of probes issued; zero when the window was empty.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Error from the final probe, if any probe ran.
    pub fn last_error(&self) -> Option<&ProbeError> {
        self.last_error.as_ref()
    }
}

/// Drives a [`Probe`] under a [`PollConfig`], reporting failures to an
/// [`AttemptSink`].
///
/// Holds no per-session state, so one poller can serve concurrent
/// `poll` calls for different targets.
#[derive(Debug, Clone)]
pub struct Poller<P, S = TracingSink> {
    probe: P,
    sink: S,
    config: PollConfig,
}

impl<P: Probe> Poller<P> {
    /// Poller that logs failed attempts through `tracing`.
    pub fn new(probe: P, config: PollConfig) -> Self {
        Self {
            probe,
            sink: TracingSink,
            config,
        }
    }
}

impl<P: Probe, S: AttemptSink> Poller<P, S> {
    /// Replace the attempt sink.
    pub fn with_sink<T: AttemptSink>(self, sink: T) -> Poller<P, T> {
        Poller {
            probe: self.probe,
            sink,
            config: self.config,
        }
    }

    /// The probe driven by this poller.
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// The sink receiving failed attempts.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Window and backoff in effect.
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Probe `target` until it responds or the configured timeout elapses.
    ///
    /// Individual probe errors are reported to the sink and never returned;
    /// the only error is [`PollError`] once the deadline has passed.
    pub async fn poll(&self, target: &str) -> Result<(), PollError> {
        let timeout = self.config.timeout;
        let start = Instant::now();
        let deadline = start
            .checked_add(timeout)
            .unwrap_or_else(|| start + FAR_FUTURE);

        let mut attempts: u32 = 0;
        let mut last_error = None;

        while Instant::now() < deadline {
            let error = match self.probe.probe(target).await {
                Ok(()) => {
                    debug!(
                        server = %target,
                        attempts = attempts + 1,
                        elapsed = ?start.elapsed(),
                        "server responded"
                    );
                    return Ok(());
                }
                Err(e) => e,
            };

            let backoff = self.config.backoff.interval(attempts);
            let wait = backoff.min(deadline.saturating_duration_since(Instant::now()));
            attempts = attempts.saturating_add(1);

            self.sink.record_attempt(&FailedAttempt {
                target,
                attempt: attempts,
                error: &error,
                wait,
            });
            last_error = Some(error);

            tokio::time::sleep(wait).await;
        }

        Err(PollError {
            target: target.to_string(),
            timeout: HumanDuration(timeout),
            attempts,
            last_error,
        })
    }
}
