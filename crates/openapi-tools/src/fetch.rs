//! Synchronous retrieval of the upstream `OpenAPI` description.

use crate::error::{OpenApiToolsError, Result};
use opendota_http_tools::redact::sanitize_reqwest_error;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fetch and parse the `OpenAPI` document at `url`.
///
/// Blocks the calling thread; call [`fetch_spec_async`] from async code. The document is
/// fingerprinted in the logs so deployments can tell which upstream revision they assembled.
///
/// # Errors
///
/// Returns an error when the request fails, the upstream answers with a non-success status,
/// or the body is not JSON.
pub fn fetch_spec(url: &str) -> Result<Value> {
    tracing::info!(url = %url, "Fetching OpenAPI spec");

    let fetch_err = |message: String| OpenApiToolsError::OpenApiSpecFetch {
        url: url.to_string(),
        message,
    };

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("opendota-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| fetch_err(sanitize_reqwest_error(&e)))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| fetch_err(sanitize_reqwest_error(&e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_err(format!("upstream returned {status}")));
    }

    let bytes = response
        .bytes()
        .map_err(|e| OpenApiToolsError::OpenApiSpecReadBody {
            url: url.to_string(),
            message: sanitize_reqwest_error(&e),
        })?;

    let spec: Value =
        serde_json::from_slice(&bytes).map_err(|source| OpenApiToolsError::OpenApiSpecParse {
            location: url.to_string(),
            source,
        })?;

    tracing::info!(
        url = %url,
        bytes = bytes.len(),
        fingerprint = %spec_fingerprint(&bytes),
        "Fetched OpenAPI spec"
    );
    Ok(spec)
}

/// Run [`fetch_spec`] on the blocking pool.
///
/// # Errors
///
/// Same as [`fetch_spec`], plus a startup error if the blocking task panics or is cancelled.
pub async fn fetch_spec_async(url: &str) -> Result<Value> {
    let owned = url.to_string();
    tokio::task::spawn_blocking(move || fetch_spec(&owned))
        .await
        .map_err(|e| OpenApiToolsError::Startup(format!("spec fetch task failed: {e}")))?
}

/// `sha256:<hex>` digest of the raw document bytes.
#[must_use]
pub fn spec_fingerprint(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}
