//! Settings resolution: built-in defaults ← config file ← command-line flags.

use std::path::Path;

use anyhow::Context;
use vigil_core::{ProbeConfig, ProbeSettings, VigilConfig};

/// Probe overrides taken from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub timeout: Option<String>,
    pub interval: Option<String>,
    pub max_interval: Option<String>,
    pub attempt_timeout: Option<String>,
    pub fail_on_error_status: bool,
}

impl Overrides {
    fn into_probe_config(self) -> ProbeConfig {
        ProbeConfig {
            timeout: self.timeout,
            base_interval: self.interval,
            max_interval: self.max_interval,
            attempt_timeout: self.attempt_timeout,
            // A bare flag can only switch the check on.
            fail_on_error_status: self.fail_on_error_status.then_some(true),
            user_agent: None,
        }
    }
}

pub fn resolve(config_path: Option<&Path>, overrides: Overrides) -> anyhow::Result<ProbeSettings> {
    let file = match config_path {
        Some(path) => VigilConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => VigilConfig::default(),
    };

    let merged = file
        .probe
        .unwrap_or_default()
        .merge(overrides.into_probe_config());

    merged.resolve().context("invalid probe settings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn no_file_no_flags_gives_defaults() {
        let settings = resolve(None, Overrides::default()).unwrap();
        assert_eq!(settings, ProbeSettings::default());
    }

    #[test]
    fn file_values_apply() {
        let file = config_file("[probe]\ntimeout = \"2m\"\nbase_interval = \"250ms\"\n");
        let settings = resolve(Some(file.path()), Overrides::default()).unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(120));
        assert_eq!(settings.base_interval, Duration::from_millis(250));
    }

    #[test]
    fn flags_override_file() {
        let file = config_file(
            "[probe]\ntimeout = \"2m\"\nmax_interval = \"8s\"\nfail_on_error_status = false\n",
        );
        let overrides = Overrides {
            timeout: Some("5s".to_string()),
            fail_on_error_status: true,
            ..Default::default()
        };

        let settings = resolve(Some(file.path()), overrides).unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.max_interval, Some(Duration::from_secs(8)));
        assert!(settings.fail_on_error_status);
    }

    #[test]
    fn absent_flag_keeps_file_setting() {
        let file = config_file("[probe]\nfail_on_error_status = true\n");
        let settings = resolve(Some(file.path()), Overrides::default()).unwrap();
        assert!(settings.fail_on_error_status);
    }

    #[test]
    fn bad_flag_value_is_reported() {
        let overrides = Overrides {
            interval: Some("0s".to_string()),
            ..Default::default()
        };
        let err = resolve(None, overrides).unwrap_err();
        assert!(format!("{err:#}").contains("base_interval"));
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");

        let err = resolve(Some(&path), Overrides::default()).unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }
}
