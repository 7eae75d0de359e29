mod common;

use common::{MCP_ACCEPT, mock_upstream, parse_mcp_body, rpc, tool_call, tool_names, tool_text};
use lambda_http::http::{Method, Response, header};
use lambda_http::{Body, Request};
use opendota_mcp_server::lambda::handle_invocation;
use opendota_openapi_tools::config::UpstreamConfig;
use serde_json::{Value, json};

fn mcp_request(message: &Value) -> Request {
    let mut request = Request::new(Body::Text(message.to_string()));
    *request.method_mut() = Method::POST;
    *request.uri_mut() = "/mcp".parse().expect("static uri");
    let headers = request.headers_mut();
    headers.insert(header::HOST, "localhost".parse().expect("static header"));
    headers.insert(header::ACCEPT, MCP_ACCEPT.parse().expect("static header"));
    headers.insert(
        header::CONTENT_TYPE,
        "application/json".parse().expect("static header"),
    );
    request
}

fn reply(response: &Response<Body>) -> anyhow::Result<Value> {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let text = match response.body() {
        Body::Text(text) => text.clone(),
        Body::Binary(bytes) => String::from_utf8(bytes.clone())?,
        Body::Empty => String::new(),
    };
    parse_mcp_body(content_type, &text)
}

#[tokio::test(flavor = "multi_thread")]
async fn invocation_lists_tools() -> anyhow::Result<()> {
    let (_upstream, config) = mock_upstream().await?;

    let response = handle_invocation(&config, mcp_request(&rpc(1, "tools/list", json!({}))))
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    assert!(response.status().is_success(), "{}", response.status());

    let msg = reply(&response)?;
    assert_eq!(tool_names(&msg).len(), 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn invocation_calls_a_tool() -> anyhow::Result<()> {
    let (_upstream, config) = mock_upstream().await?;

    let response = handle_invocation(
        &config,
        mcp_request(&tool_call(7, "get_heroes", json!({}))),
    )
    .await
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let msg = reply(&response)?;
    assert_eq!(msg["id"], 7);
    let heroes: Value = serde_json::from_str(&tool_text(&msg)?)?;
    assert_eq!(heroes[0]["localized_name"], "Anti-Mage");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn health_route_is_served_per_invocation() -> anyhow::Result<()> {
    let (_upstream, config) = mock_upstream().await?;

    let mut request = Request::new(Body::Empty);
    *request.uri_mut() = "/health".parse()?;
    let response = handle_invocation(&config, request)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let Body::Text(text) = response.body() else {
        anyhow::bail!("expected a text body");
    };
    let health: Value = serde_json::from_str(text)?;
    assert_eq!(health["tools"], 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_upstream_fails_the_invocation() {
    let port = opendota_test_support::pick_unused_port().expect("port");
    let config = UpstreamConfig::at(format!("http://127.0.0.1:{port}/api"));

    let err = handle_invocation(&config, mcp_request(&rpc(1, "tools/list", json!({}))))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("OpenAPI error"), "{err}");
}
