//! Serverless entrypoint.
//!
//! Every invocation fetches the description and assembles a fresh app, so a Lambda container
//! never serves tools built from a stale upstream description.

use crate::app::build_app;
use axum::body::Body as AxumBody;
use lambda_http::http::Response;
use lambda_http::{Body, Request};
use opendota_openapi_tools::config::UpstreamConfig;
use tower::ServiceExt as _;

/// Handle one API Gateway event.
///
/// # Errors
///
/// Returns an error when the app cannot be built (upstream unreachable, invalid description) or
/// the response body cannot be read; `lambda_http` reports it as a failed invocation.
pub async fn handle_invocation(
    config: &UpstreamConfig,
    request: Request,
) -> Result<Response<Body>, lambda_http::Error> {
    let app = build_app(config).await?;

    let (parts, body) = request.into_parts();
    let request = lambda_http::http::Request::from_parts(parts, AxumBody::from(body.to_vec()));

    tracing::debug!(method = %request.method(), path = %request.uri().path(), "Dispatching invocation");
    let response = app.oneshot(request).await?;

    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await?;
    let body = match String::from_utf8(bytes.to_vec()) {
        Ok(text) => Body::Text(text),
        Err(e) => Body::Binary(e.into_bytes()),
    };
    Ok(Response::from_parts(parts, body))
}
