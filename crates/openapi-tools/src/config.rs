//! Upstream selection.
//!
//! The deployed shim always talks to the public OpenDota API. [`UpstreamConfig`] exists so the
//! standalone binary and the tests can point the same code at another origin.

use crate::error::{OpenApiToolsError, Result};
use std::time::Duration;
use url::Url;

/// Base address every tool call is resolved against.
pub const UPSTREAM_BASE_URL: &str = "https://api.opendota.com/api";

/// Location of the upstream `OpenAPI` description.
pub const UPSTREAM_SPEC_URL: &str = "https://api.opendota.com/api";

/// Server name advertised to MCP clients.
pub const SERVER_NAME: &str = "OpenDota MCP";

/// Per-call timeout for proxied tool calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Name advertised to MCP clients and used in logs.
    pub name: String,
    /// `OpenAPI` description URL.
    pub spec_url: String,
    /// Base URL for tool calls (paths from the description are appended to it).
    pub base_url: String,
    /// Timeout applied to every proxied tool call.
    pub call_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            spec_url: UPSTREAM_SPEC_URL.to_string(),
            base_url: UPSTREAM_BASE_URL.to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl UpstreamConfig {
    /// Upstream whose description and API both live at `base_url`, like OpenDota's.
    #[must_use]
    pub fn at(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            spec_url: base_url.clone(),
            base_url,
            ..Self::default()
        }
    }

    /// Parsed [`Self::base_url`].
    ///
    /// # Errors
    ///
    /// Returns an error unless the base URL is an absolute `http(s)` URL with a host.
    pub fn base(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            OpenApiToolsError::Config(format!("Invalid base URL '{}': {e}", self.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(OpenApiToolsError::Config(format!(
                "Invalid base URL '{}': must be an absolute http(s) URL",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// Host whose responses get their encoding repaired.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Self::base`] fails.
    pub fn upstream_host(&self) -> Result<String> {
        let url = self.base()?;
        Ok(url.host_str().unwrap_or_default().to_ascii_lowercase())
    }
}
