//! Command-line configuration for the standalone server.

use crate::logging::LogFormat;
use clap::Parser;
use opendota_openapi_tools::config::{UPSTREAM_BASE_URL, UpstreamConfig};

#[derive(Debug, Parser)]
#[command(
    name = "opendota-mcp-server",
    version,
    about = "Serve the OpenDota API as MCP tools over streamable HTTP"
)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "localhost:8000")]
    pub bind: String,

    /// Default log level (`RUST_LOG` takes precedence).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Base URL tool calls are sent to.
    #[arg(long, default_value = UPSTREAM_BASE_URL)]
    pub upstream_base_url: String,

    /// `OpenAPI` description URL. Defaults to the upstream base URL, where OpenDota serves it.
    #[arg(long)]
    pub spec_url: Option<String>,
}

impl Cli {
    #[must_use]
    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig {
            spec_url: self
                .spec_url
                .clone()
                .unwrap_or_else(|| self.upstream_base_url.clone()),
            base_url: self.upstream_base_url.clone(),
            ..UpstreamConfig::default()
        }
    }
}
