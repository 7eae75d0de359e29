//! `tracing` subscriber setup.

use crate::error::{Result, ServerError};
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Install the global subscriber. `RUST_LOG` overrides `default_level`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(default_level: &str, format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_ansi(false).try_init(),
    };
    installed.map_err(|e| ServerError::Startup(format!("failed to initialise logging: {e}")))
}

/// JSON logs without colours, the shape CloudWatch ingests.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_lambda_tracing() -> Result<()> {
    init_tracing("info", LogFormat::Json)
}
