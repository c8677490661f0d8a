//! Tracing setup for the CLI.
//!
//! The filter comes from `CANDLEVAULT_LOG` when set, otherwise `--log-level`.
//! Output is text or JSON on stderr.

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter; wins over `--log-level`.
pub const LOG_ENV: &str = "CANDLEVAULT_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

fn env_filter(raw: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(raw).map_err(|err| anyhow!("invalid log filter '{raw}': {err}"))
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean for
/// tables and `--json` output.
pub fn init_tracing(log_level: &str, log_format: LogFormat) -> Result<()> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let env_filter = env_filter(&filter)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let installed = match log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_levels_and_directives() {
        assert!(env_filter("info").is_ok());
        assert!(env_filter("candlevault_core=debug,warn").is_ok());
    }

    #[test]
    fn rejects_garbage_filter() {
        assert!(env_filter("candlevault_core=loud").is_err());
    }
}
