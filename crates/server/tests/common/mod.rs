#![allow(dead_code)]

use anyhow::Context as _;
use futures::StreamExt as _;
use opendota_openapi_tools::config::UpstreamConfig;
use opendota_test_support::{RunningServer, mock_opendota_router, serve_router};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::AsyncBufReadExt as _;
use tokio_util::io::StreamReader;

pub const MCP_ACCEPT: &str = "application/json, text/event-stream";

/// Mock OpenDota plus the upstream config pointing at it.
pub async fn mock_upstream() -> anyhow::Result<(RunningServer, UpstreamConfig)> {
    let server = serve_router(mock_opendota_router()).await?;
    let config = UpstreamConfig::at(server.url("/api"));
    Ok((server, config))
}

pub fn rpc(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

pub fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    rpc(id, "tools/call", json!({ "name": name, "arguments": arguments }))
}

/// POST one JSON-RPC message to `<base_url>/mcp` without a session and return the reply.
pub async fn post_mcp(base_url: &str, body: &Value) -> anyhow::Result<Value> {
    let resp = reqwest::Client::new()
        .post(format!("{}/mcp", base_url.trim_end_matches('/')))
        .header("Accept", MCP_ACCEPT)
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .context("POST /mcp")?
        .error_for_status()
        .context("POST /mcp status")?;

    tokio::time::timeout(Duration::from_secs(10), read_first_json_message(resp))
        .await
        .context("timeout waiting for MCP response")?
}

async fn read_first_json_message(resp: reqwest::Response) -> anyhow::Result<Value> {
    let is_json = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if is_json {
        return resp.json().await.context("parse JSON response");
    }

    let mut stream = resp.bytes_stream();
    let byte_stream = futures::stream::poll_fn(move |cx| stream.poll_next_unpin(cx))
        .map(|r| r.map_err(std::io::Error::other));
    let reader = StreamReader::new(byte_stream);
    let mut lines = tokio::io::BufReader::new(reader).lines();

    let mut data_lines: Vec<String> = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end().to_string();

        if line.is_empty() {
            if let Some(msg) = take_json_rpc(&mut data_lines) {
                return Ok(msg);
            }
            continue;
        }

        if let Some(v) = line.strip_prefix("data:") {
            data_lines.push(v.trim().to_string());
        }
    }

    take_json_rpc(&mut data_lines).context("event-stream ended without a JSON-RPC message")
}

/// Parse a fully buffered MCP response body (SSE or JSON).
pub fn parse_mcp_body(content_type: Option<&str>, body: &str) -> anyhow::Result<Value> {
    if content_type.is_some_and(|ct| ct.starts_with("application/json")) {
        return serde_json::from_str(body).context("parse JSON response");
    }

    let mut data_lines: Vec<String> = Vec::new();
    for line in body.lines().map(str::trim_end) {
        if line.is_empty() {
            if let Some(msg) = take_json_rpc(&mut data_lines) {
                return Ok(msg);
            }
            continue;
        }
        if let Some(v) = line.strip_prefix("data:") {
            data_lines.push(v.trim().to_string());
        }
    }
    take_json_rpc(&mut data_lines).context("body contained no JSON-RPC message")
}

// Skips priming events whose data is empty or not a JSON-RPC message.
fn take_json_rpc(data_lines: &mut Vec<String>) -> Option<Value> {
    if data_lines.is_empty() {
        return None;
    }
    let data = data_lines.join("\n");
    data_lines.clear();
    serde_json::from_str::<Value>(&data)
        .ok()
        .filter(|v| v.get("jsonrpc").is_some())
}

/// `result.content[0].text` of a `tools/call` reply.
pub fn tool_text(msg: &Value) -> anyhow::Result<String> {
    msg.get("result")
        .and_then(|r| r.get("content"))
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("tools/call reply has no text content: {msg}"))
}

pub fn tool_names(msg: &Value) -> Vec<String> {
    let mut names: Vec<String> = msg["result"]["tools"]
        .as_array()
        .map(|tools| {
            tools
                .iter()
                .filter_map(|t| t["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
