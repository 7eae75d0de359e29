//! Construction of the upstream HTTP client.

use crate::sanitize::SanitizingMiddleware;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a client whose every request goes through [`SanitizingMiddleware`].
///
/// `upstream_host` selects which responses get their encoding repaired; credential stripping
/// applies to every request regardless of host.
#[must_use]
pub fn sanitizing_client(upstream_host: &str) -> ClientWithMiddleware {
    let inner = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("opendota-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    ClientBuilder::new(inner)
        .with(SanitizingMiddleware::new(upstream_host))
        .build()
}
