//! HTTP application: the MCP endpoint plus a health probe.

use crate::error::Result;
use crate::handler::OpenApiServer;
use axum::{Json, Router, routing::get};
use opendota_http_tools::client::sanitizing_client;
use opendota_openapi_tools::config::UpstreamConfig;
use opendota_openapi_tools::fetch::fetch_spec_async;
use opendota_openapi_tools::runtime::OpenApiToolSource;
use opendota_openapi_tools::sanitize::without_security;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use serde_json::json;
use std::sync::Arc;

/// Fetch the upstream description and build the full router.
///
/// # Errors
///
/// Propagates fetch, parse and configuration failures.
pub async fn build_app(config: &UpstreamConfig) -> Result<Router> {
    let raw = fetch_spec_async(&config.spec_url).await?;
    let spec = without_security(&raw);
    let client = sanitizing_client(&config.upstream_host()?);
    let source = OpenApiToolSource::build(config, &spec, client)?;
    Ok(router_for(source))
}

/// Router serving `source` at `/mcp` (stateless streamable HTTP) and `GET /health`.
pub fn router_for(source: OpenApiToolSource) -> Router {
    let health = json!({
        "status": "ok",
        "name": source.name(),
        "tools": source.tool_count(),
    });

    let server = OpenApiServer::new(source);
    let mcp = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: false,
            ..Default::default()
        },
    );

    Router::new()
        .route(
            "/health",
            get(move || {
                let body = health.clone();
                async move { Json(body) }
            }),
        )
        .nest_service("/mcp", mcp)
}
