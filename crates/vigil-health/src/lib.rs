//! vigil-health — liveness polling for HTTP servers.
//!
//! Probes a target until it responds or a deadline elapses, backing off
//! exponentially between attempts.
//!
//! # Architecture
//!
//! ```text
//! Poller
//!   ├── PollConfig (timeout, Backoff)
//!   ├── Probe ── HttpProbe: HEAD over a fresh TCP/TLS connection
//!   └── AttemptSink ── TracingSink: one WARN per failed attempt
//! ```
//!
//! Probe errors are transient by definition: they go to the sink and the
//! poller keeps trying. The only error a caller sees is [`PollError`],
//! once the whole window has been spent.
//!
//! # Example
//!
//! ```no_run
//! use vigil_core::ProbeSettings;
//! use vigil_health::{HttpProbe, PollConfig, Poller};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ProbeSettings::default();
//! let poller = Poller::new(HttpProbe::new(&settings)?, PollConfig::from_settings(&settings));
//! poller.poll("http://localhost:8080/").await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod checker;
pub mod poller;
pub mod sink;

pub use backoff::Backoff;
pub use checker::{HttpProbe, Probe, ProbeError};
pub use poller::{PollConfig, PollError, Poller};
pub use sink::{AttemptSink, FailedAttempt, NullSink, TracingSink};
