//! wait — block until an HTTP server starts responding.
//!
//! # Usage
//!
//! ```text
//! wait http://localhost:8080/healthz
//! wait --timeout 30s --interval 500ms https://example.com
//! ```
//!
//! Exits 0 as soon as the server answers. Otherwise prints
//! `Site is down: <reason>` and exits 1 once the timeout is spent.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use vigil_health::{HttpProbe, PollConfig, Poller};

mod settings;

#[derive(Parser, Debug)]
#[command(
    name = "wait",
    about = "Wait for an HTTP server to start responding",
    version
)]
struct Cli {
    /// URL to probe with HEAD requests.
    url: String,

    /// TOML file with a [probe] table.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Give up after this long (e.g. 30s, 2m). Default: 1m.
    #[arg(short, long)]
    timeout: Option<String>,

    /// Wait after the first failure; doubles after each further one. Default: 1s.
    #[arg(short, long)]
    interval: Option<String>,

    /// Cap on the wait between attempts. Default: uncapped.
    #[arg(long)]
    max_interval: Option<String>,

    /// Limit on a single probe. Default: 10s.
    #[arg(long)]
    attempt_timeout: Option<String>,

    /// Count 4xx/5xx responses as "not responding".
    #[arg(long)]
    fail_on_error_status: bool,
}

impl Cli {
    fn overrides(&self) -> settings::Overrides {
        settings::Overrides {
            timeout: self.timeout.clone(),
            interval: self.interval.clone(),
            max_interval: self.max_interval.clone(),
            attempt_timeout: self.attempt_timeout.clone(),
            fail_on_error_status: self.fail_on_error_status,
        }
    }
}

fn build_poller(cli: &Cli) -> anyhow::Result<Poller<HttpProbe>> {
    let settings = settings::resolve(cli.config.as_deref(), cli.overrides())?;
    debug!(?settings, "probe settings resolved");

    let probe = HttpProbe::new(&settings).context("building HTTP probe")?;
    Ok(Poller::new(probe, PollConfig::from_settings(&settings)))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let poller = match build_poller(&cli) {
        Ok(poller) => poller,
        Err(e) => {
            eprintln!("wait: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match poller.poll(&cli.url).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Site is down: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;
    use std::time::Duration;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn requires_exactly_one_url() {
        let err = Cli::try_parse_from(["wait"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from(["wait", "http://a", "http://b"]).unwrap_err();
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn parses_url_and_flags() {
        let cli = Cli::try_parse_from([
            "wait",
            "--timeout",
            "30s",
            "-i",
            "500ms",
            "--fail-on-error-status",
            "http://localhost:8080/",
        ])
        .unwrap();

        assert_eq!(cli.url, "http://localhost:8080/");
        assert_eq!(cli.timeout.as_deref(), Some("30s"));
        assert_eq!(cli.interval.as_deref(), Some("500ms"));
        assert!(cli.fail_on_error_status);
        assert!(cli.config.is_none());
    }

    #[test]
    fn build_poller_applies_flags() {
        let cli = Cli::try_parse_from([
            "wait",
            "--timeout",
            "5s",
            "--max-interval",
            "2s",
            "http://example.invalid",
        ])
        .unwrap();

        let poller = build_poller(&cli).unwrap();
        assert_eq!(poller.config().timeout, Duration::from_secs(5));
        assert_eq!(poller.config().backoff.base(), Duration::from_secs(1));
        assert_eq!(poller.config().backoff.max(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn build_poller_rejects_bad_duration() {
        let cli = Cli::try_parse_from(["wait", "--timeout", "forever", "http://example.invalid"])
            .unwrap();

        let err = build_poller(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("timeout"));
    }
}
