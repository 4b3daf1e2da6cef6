//! vigil.toml configuration parser.
//!
//! ```toml
//! [probe]
//! timeout = "1m"
//! base_interval = "1s"
//! max_interval = "30s"
//! attempt_timeout = "10s"
//! fail_on_error_status = false
//! user_agent = "vigil/0.1"
//! ```
//!
//! Every key is optional. [`ProbeConfig::resolve`] fills the gaps from
//! [`ProbeSettings::default`] and validates the result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::{DurationError, parse_duration};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for `{field}`: {source}")]
    Duration {
        field: &'static str,
        #[source]
        source: DurationError,
    },

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level vigil.toml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VigilConfig {
    /// Probe and polling settings.
    pub probe: Option<ProbeConfig>,
}

/// The raw `[probe]` table; durations are still strings here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    pub timeout: Option<String>,
    pub base_interval: Option<String>,
    pub max_interval: Option<String>,
    pub attempt_timeout: Option<String>,
    pub fail_on_error_status: Option<bool>,
    pub user_agent: Option<String>,
}

/// Fully resolved probe settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Total polling window.
    pub timeout: Duration,
    /// Wait after the first failed attempt; doubles after each further one.
    pub base_interval: Duration,
    /// Optional cap on the backoff interval. `None` keeps it uncapped.
    pub max_interval: Option<Duration>,
    /// Upper bound on a single probe.
    pub attempt_timeout: Duration,
    /// Treat HTTP status >= 400 as a failed probe.
    pub fail_on_error_status: bool,
    /// `User-Agent` header sent with every probe.
    pub user_agent: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            base_interval: Duration::from_secs(1),
            max_interval: None,
            attempt_timeout: Duration::from_secs(10),
            fail_on_error_status: false,
            user_agent: concat!("vigil/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl VigilConfig {
    /// Load config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the `[probe]` table (or defaults when it is absent).
    pub fn probe_settings(&self) -> Result<ProbeSettings, ConfigError> {
        self.probe.clone().unwrap_or_default().resolve()
    }
}

impl ProbeConfig {
    /// Layer `other` on top of `self`: keys set in `other` win.
    pub fn merge(self, other: ProbeConfig) -> ProbeConfig {
        ProbeConfig {
            timeout: other.timeout.or(self.timeout),
            base_interval: other.base_interval.or(self.base_interval),
            max_interval: other.max_interval.or(self.max_interval),
            attempt_timeout: other.attempt_timeout.or(self.attempt_timeout),
            fail_on_error_status: other.fail_on_error_status.or(self.fail_on_error_status),
            user_agent: other.user_agent.or(self.user_agent),
        }
    }

    /// Parse and validate into [`ProbeSettings`], defaulting unset keys.
    pub fn resolve(&self) -> Result<ProbeSettings, ConfigError> {
        let defaults = ProbeSettings::default();

        let timeout = duration_field("timeout", self.timeout.as_deref())?.unwrap_or(defaults.timeout);
        let base_interval = duration_field("base_interval", self.base_interval.as_deref())?
            .unwrap_or(defaults.base_interval);
        let max_interval = duration_field("max_interval", self.max_interval.as_deref())?;
        let attempt_timeout = duration_field("attempt_timeout", self.attempt_timeout.as_deref())?
            .unwrap_or(defaults.attempt_timeout);

        non_zero("base_interval", base_interval)?;
        non_zero("attempt_timeout", attempt_timeout)?;
        if let Some(max) = max_interval {
            non_zero("max_interval", max)?;
        }

        let user_agent = match &self.user_agent {
            Some(ua) if ua.trim().is_empty() => {
                return Err(ConfigError::Invalid {
                    field: "user_agent",
                    reason: "must not be empty".to_string(),
                });
            }
            Some(ua) => ua.clone(),
            None => defaults.user_agent,
        };

        Ok(ProbeSettings {
            timeout,
            base_interval,
            max_interval,
            attempt_timeout,
            fail_on_error_status: self
                .fail_on_error_status
                .unwrap_or(defaults.fail_on_error_status),
            user_agent,
        })
    }
}

fn duration_field(field: &'static str, value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|v| parse_duration(v).map_err(|source| ConfigError::Duration { field, source }))
        .transpose()
}

fn non_zero(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = VigilConfig::from_toml_str("").unwrap();
        assert_eq!(config.probe_settings().unwrap(), ProbeSettings::default());
    }

    #[test]
    fn defaults_are_uncapped_one_minute_window() {
        let settings = ProbeSettings::default();
        assert_eq!(settings.timeout, Duration::from_secs(60));
        assert_eq!(settings.base_interval, Duration::from_secs(1));
        assert_eq!(settings.max_interval, None);
        assert!(!settings.fail_on_error_status);
        assert!(settings.user_agent.starts_with("vigil/"));
    }

    #[test]
    fn parse_full_probe_table() {
        let toml_str = r#"
[probe]
timeout = "5m"
base_interval = "500ms"
max_interval = "30s"
attempt_timeout = "2s"
fail_on_error_status = true
user_agent = "probe-test/1.0"
"#;
        let settings = VigilConfig::from_toml_str(toml_str)
            .unwrap()
            .probe_settings()
            .unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(300));
        assert_eq!(settings.base_interval, Duration::from_millis(500));
        assert_eq!(settings.max_interval, Some(Duration::from_secs(30)));
        assert_eq!(settings.attempt_timeout, Duration::from_secs(2));
        assert!(settings.fail_on_error_status);
        assert_eq!(settings.user_agent, "probe-test/1.0");
    }

    #[test]
    fn zero_timeout_is_accepted() {
        let config = ProbeConfig {
            timeout: Some("0s".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve().unwrap().timeout, Duration::ZERO);
    }

    #[test]
    fn zero_base_interval_is_rejected() {
        let config = ProbeConfig {
            base_interval: Some("0".to_string()),
            ..Default::default()
        };
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "base_interval", .. }));
    }

    #[test]
    fn zero_max_interval_is_rejected() {
        let config = ProbeConfig {
            max_interval: Some("0ms".to_string()),
            ..Default::default()
        };
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_interval", .. }));
    }

    #[test]
    fn bad_duration_names_the_field() {
        let config = ProbeConfig {
            attempt_timeout: Some("soon".to_string()),
            ..Default::default()
        };
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Duration { field: "attempt_timeout", .. }));
        assert!(err.to_string().contains("attempt_timeout"));
    }

    #[test]
    fn blank_user_agent_is_rejected() {
        let config = ProbeConfig {
            user_agent: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::Invalid { field: "user_agent", .. })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = VigilConfig::from_toml_str("[probe]\nretries = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn merge_prefers_overlay() {
        let base = ProbeConfig {
            timeout: Some("1m".to_string()),
            base_interval: Some("2s".to_string()),
            ..Default::default()
        };
        let overlay = ProbeConfig {
            timeout: Some("10s".to_string()),
            fail_on_error_status: Some(true),
            ..Default::default()
        };

        let merged = base.merge(overlay);
        assert_eq!(merged.timeout.as_deref(), Some("10s"));
        assert_eq!(merged.base_interval.as_deref(), Some("2s"));
        assert_eq!(merged.fail_on_error_status, Some(true));
        assert_eq!(merged.max_interval, None);
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[probe]\ntimeout = \"7s\"").unwrap();

        let config = VigilConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.probe_settings().unwrap().timeout,
            Duration::from_secs(7)
        );
    }

    #[test]
    fn from_file_missing_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = VigilConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }
}
