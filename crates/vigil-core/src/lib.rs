//! vigil-core — configuration and duration handling shared by the
//! liveness poller and the `wait` CLI.

pub mod config;
pub mod duration;

pub use config::{ConfigError, ProbeConfig, ProbeSettings, VigilConfig};
pub use duration::{DurationError, HumanDuration, parse_duration};
