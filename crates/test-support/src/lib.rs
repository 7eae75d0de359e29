//! Helpers shared by the integration tests: process and port plumbing plus a mock OpenDota
//! upstream that serves both the API description and a few endpoints.

use anyhow::Context as _;
use axum::{
    Json, Router,
    extract::{Path, RawQuery},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};
use std::net::{SocketAddr, TcpListener};
use std::process::Child;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Pick an unused TCP port on localhost.
///
/// The port is not reserved; another process may bind it first.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll an HTTP URL until it returns a success status.
///
/// # Errors
///
/// Returns an error if the timeout elapses first.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
}

/// An axum router served on `127.0.0.1:<ephemeral>`, shut down when dropped.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RunningServer {
    /// `http://127.0.0.1:<port>` followed by `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Serve `router` in the background of the current tokio runtime.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn serve_router(router: Router) -> anyhow::Result<RunningServer> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind mock server")?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await;
    });
    Ok(RunningServer {
        addr,
        shutdown: Some(tx),
    })
}

/// A small OpenDota-shaped description with security requirements still attached.
#[must_use]
pub fn opendota_fixture_spec() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": { "title": "OpenDota API", "version": "28.0.0" },
        "servers": [{ "url": "https://api.opendota.com/api" }],
        "security": [{ "api_key": [] }],
        "components": {
            "securitySchemes": {
                "api_key": { "type": "apiKey", "name": "api_key", "in": "query" }
            },
            "parameters": {
                "accountIdParam": {
                    "name": "account_id",
                    "in": "path",
                    "description": "Steam32 account ID",
                    "required": true,
                    "schema": { "type": "integer" }
                }
            }
        },
        "paths": {
            "/heroes": {
                "get": {
                    "operationId": "get_heroes",
                    "summary": "Get hero data",
                    "security": [{ "api_key": [] }],
                    "responses": { "200": { "description": "Success" } }
                }
            },
            "/players/{account_id}": {
                "get": {
                    "operationId": "get_players_by_account_id",
                    "summary": "Player data",
                    "parameters": [
                        { "$ref": "#/components/parameters/accountIdParam" },
                        { "name": "api_key", "in": "query", "schema": { "type": "string" } },
                        { "name": "significant", "in": "query", "schema": { "type": "integer" } },
                        { "name": "x-api-key", "in": "header", "schema": { "type": "string" } }
                    ],
                    "responses": { "200": { "description": "Success" } }
                }
            },
            "/constants/{resource}": {
                "get": {
                    "summary": "Game constants",
                    "parameters": [
                        { "name": "resource", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "responses": { "200": { "description": "Success" } }
                }
            },
            "/matches/{match_id}": {
                "get": {
                    "operationId": "get_matches_by_match_id",
                    "parameters": [
                        { "name": "match_id", "in": "path", "required": true, "schema": { "type": "integer" } }
                    ],
                    "responses": { "200": { "description": "Success" } }
                }
            }
        }
    })
}

/// Router mimicking `api.opendota.com/api` for [`opendota_fixture_spec`].
///
/// - `GET /api`: the description
/// - `GET /api/heroes`: a hero list
/// - `GET /api/players/{account_id}`: echoes the query string and whether credentials arrived
/// - `GET /api/constants/{resource}`: a body containing invalid UTF-8
/// - `GET /api/matches/{match_id}`: always `404`
#[must_use]
pub fn mock_opendota_router() -> Router {
    Router::new()
        .route("/api", get(|| async { Json(opendota_fixture_spec()) }))
        .route(
            "/api/heroes",
            get(|| async {
                Json(json!([
                    { "id": 1, "localized_name": "Anti-Mage" },
                    { "id": 2, "localized_name": "Axe" }
                ]))
            }),
        )
        .route("/api/players/{account_id}", get(player))
        .route(
            "/api/constants/{resource}",
            get(|| async {
                (
                    [("content-type", "application/json")],
                    b"{\"name\":\"Anti\xffMage\"}".to_vec(),
                )
            }),
        )
        .route(
            "/api/matches/{match_id}",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "Not Found" })),
                )
                    .into_response()
            }),
        )
}

async fn player(
    Path(account_id): Path<u64>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Json<Value> {
    Json(json!({
        "account_id": account_id,
        "query": query,
        "authorization": headers.contains_key("authorization"),
        "x_api_key": headers.contains_key("x-api-key"),
    }))
}
