//! Credential stripping and upstream response repair.
//!
//! [`SanitizingMiddleware`] sits in a `reqwest_middleware` stack bound to the upstream API:
//! - every outgoing request loses its credential-bearing headers and `api_key` query parameters
//! - textual responses from the designated upstream host are re-encoded when their body is not
//!   valid UTF-8 (invalid sequences become U+FFFD)
//!
//! Binary responses (`image/*`, `audio/*`, `video/*`, `font/*`, `application/octet-stream`) and
//! responses from any other host are passed through untouched. Transport errors are never handled
//! here.

use crate::redact::redact_url;
use anyhow::Context as _;
use async_trait::async_trait;
use http::Extensions;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Request, Response, ResponseBuilderExt as _};
use reqwest_middleware::{Middleware, Next};
use std::borrow::Cow;
use url::Url;

/// Header names removed from every outgoing request.
///
/// `HeaderMap` lookups are case-insensitive, so `Authorization` and `X-Api-Key` match too.
pub const CREDENTIAL_HEADERS: [&str; 3] = ["authorization", "x-api-key", "api-key"];

/// Query parameter removed from every outgoing request (case-sensitive).
pub const CREDENTIAL_QUERY_PARAM: &str = "api_key";

/// What [`strip_credentials`] removed from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrippedCredentials {
    /// Credential headers that were present (lowercase names).
    pub headers: Vec<&'static str>,
    /// Number of `api_key` query pairs removed.
    pub query_params: usize,
}

impl StrippedCredentials {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query_params == 0
    }
}

/// Request/response interceptor for the upstream API client.
#[derive(Debug, Clone)]
pub struct SanitizingMiddleware {
    upstream_host: String,
}

impl SanitizingMiddleware {
    /// Create a middleware that repairs responses coming from `upstream_host`.
    #[must_use]
    pub fn new(upstream_host: impl Into<String>) -> Self {
        Self {
            upstream_host: upstream_host.into().to_ascii_lowercase(),
        }
    }

    #[must_use]
    pub fn upstream_host(&self) -> &str {
        &self.upstream_host
    }

    fn is_upstream(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case(&self.upstream_host))
    }
}

#[async_trait]
impl Middleware for SanitizingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let stripped = strip_credentials(&mut req);
        if !stripped.is_empty() {
            tracing::debug!(
                url = %redact_url(req.url()),
                headers = ?stripped.headers,
                query_params = stripped.query_params,
                "stripped credentials from outgoing request"
            );
        }

        // Decided on the request URL: redirects must not change which responses get repaired.
        let repair = self.is_upstream(req.url());

        let response = next.run(req, extensions).await?;
        if !repair || is_binary_content_type(response.headers()) {
            return Ok(response);
        }

        repair_response_encoding(response).await
    }
}

/// Remove credential headers and `api_key` query parameters from a request in place.
pub fn strip_credentials(req: &mut Request) -> StrippedCredentials {
    let headers = strip_credential_headers(req.headers_mut());
    let query_params = strip_query_param(req.url_mut(), CREDENTIAL_QUERY_PARAM);
    StrippedCredentials {
        headers,
        query_params,
    }
}

/// Remove every [`CREDENTIAL_HEADERS`] entry (all values) from `headers`.
pub fn strip_credential_headers(headers: &mut HeaderMap) -> Vec<&'static str> {
    CREDENTIAL_HEADERS
        .into_iter()
        .filter(|name| headers.remove(*name).is_some())
        .collect()
}

/// Remove every query pair whose decoded key equals `name`.
///
/// The remaining pairs are kept byte-for-byte in their original order, so their encoding is not
/// normalised. An emptied query string is removed (`/path?` becomes `/path`).
pub fn strip_query_param(url: &mut Url, name: &str) -> usize {
    let Some(query) = url.query() else {
        return 0;
    };

    let mut removed = 0;
    let mut kept: Vec<&str> = Vec::new();
    for pair in query.split('&') {
        if pair_key(pair).is_some_and(|k| k == name) {
            removed += 1;
        } else {
            kept.push(pair);
        }
    }

    if removed == 0 {
        return 0;
    }

    let rebuilt = kept.join("&");
    url.set_query((!rebuilt.is_empty()).then_some(rebuilt.as_str()));
    removed
}

fn pair_key(pair: &str) -> Option<Cow<'_, str>> {
    url::form_urlencoded::parse(pair.as_bytes())
        .next()
        .map(|(k, _)| k)
}

/// Whether `Content-Type` names a binary payload. A missing or unparsable header counts as text.
fn is_binary_content_type(headers: &HeaderMap) -> bool {
    let Some(mime) = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
    else {
        return false;
    };
    matches!(mime.type_().as_str(), "image" | "audio" | "video" | "font")
        || mime.essence_str() == mime::APPLICATION_OCTET_STREAM.essence_str()
}

/// Repaired body bytes, or `None` if `bytes` already is valid UTF-8.
#[must_use]
pub fn repair_utf8(bytes: &[u8]) -> Option<Vec<u8>> {
    match std::str::from_utf8(bytes) {
        Ok(_) => None,
        Err(_) => Some(String::from_utf8_lossy(bytes).into_owned().into_bytes()),
    }
}

async fn repair_response_encoding(response: Response) -> reqwest_middleware::Result<Response> {
    let status = response.status();
    let version = response.version();
    let url = response.url().clone();
    let mut headers = response.headers().clone();
    let extensions = response.extensions().clone();

    let bytes = response.bytes().await?;
    let body: reqwest::Body = match repair_utf8(&bytes) {
        None => bytes.into(),
        Some(repaired) => {
            tracing::warn!(
                url = %redact_url(&url),
                original_len = bytes.len(),
                repaired_len = repaired.len(),
                "upstream response body is not valid UTF-8; replaced invalid sequences"
            );
            headers.insert(CONTENT_LENGTH, HeaderValue::from(repaired.len()));
            repaired.into()
        }
    };

    let mut rebuilt = http::Response::builder()
        .status(status)
        .version(version)
        .url(url)
        .body(body)
        .context("rebuilding upstream response")
        .map_err(reqwest_middleware::Error::Middleware)?;
    *rebuilt.headers_mut() = headers;
    // Keeps connection metadata such as `remote_addr()`; the URL was set by the builder.
    rebuilt.extensions_mut().extend(extensions);

    Ok(Response::from(rebuilt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sanitizing_client;
    use axum::Router;
    use axum::http::{HeaderMap as AxumHeaderMap, Uri};
    use axum::routing::get;
    use reqwest::Method;
    use reqwest::header::HeaderName;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    fn request(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).expect("url"))
    }

    fn header(name: &str) -> HeaderName {
        HeaderName::from_bytes(name.as_bytes()).expect("header name")
    }

    #[test]
    fn strips_credential_headers_in_any_case() {
        let mut req = request("https://api.opendota.com/api/heroes");
        let headers = req.headers_mut();
        headers.insert(header("Authorization"), HeaderValue::from_static("Bearer xyz"));
        headers.insert(header("X-Api-Key"), HeaderValue::from_static("k1"));
        headers.insert(header("API-KEY"), HeaderValue::from_static("k2"));
        headers.insert(header("Accept"), HeaderValue::from_static("application/json"));

        let stripped = strip_credentials(&mut req);

        assert_eq!(stripped.headers, vec!["authorization", "x-api-key", "api-key"]);
        assert!(req.headers().get("authorization").is_none());
        assert!(req.headers().get("x-api-key").is_none());
        assert!(req.headers().get("api-key").is_none());
        assert_eq!(
            req.headers().get("accept").and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn strips_every_value_of_a_repeated_header() {
        let mut req = request("https://api.opendota.com/api/heroes");
        req.headers_mut()
            .append("authorization", HeaderValue::from_static("a"));
        req.headers_mut()
            .append("authorization", HeaderValue::from_static("b"));

        strip_credentials(&mut req);

        assert_eq!(req.headers().get_all("authorization").iter().count(), 0);
    }

    #[test]
    fn strips_api_key_and_keeps_other_params_in_order() {
        let mut url =
            Url::parse("https://api.opendota.com/api/x?z=1&api_key=abc&a=2&m=%20q").expect("url");
        let removed = strip_query_param(&mut url, CREDENTIAL_QUERY_PARAM);
        assert_eq!(removed, 1);
        assert_eq!(url.query(), Some("z=1&a=2&m=%20q"));
    }

    #[test]
    fn strips_repeated_and_encoded_api_key() {
        let mut url =
            Url::parse("https://api.opendota.com/api/x?api%5Fkey=1&mode=json&api_key=2")
                .expect("url");
        let removed = strip_query_param(&mut url, CREDENTIAL_QUERY_PARAM);
        assert_eq!(removed, 2);
        assert_eq!(url.query(), Some("mode=json"));
    }

    #[test]
    fn removes_query_entirely_when_only_api_key_was_present() {
        let mut url = Url::parse("https://api.opendota.com/api/x?api_key=abc").expect("url");
        strip_query_param(&mut url, CREDENTIAL_QUERY_PARAM);
        assert_eq!(url.query(), None);
        assert_eq!(url.as_str(), "https://api.opendota.com/api/x");
    }

    #[test]
    fn leaves_request_alone_without_credentials() {
        let mut req = request("https://api.opendota.com/api/x?apikey=1&key=2");
        let before = req.url().clone();
        let stripped = strip_credentials(&mut req);
        assert!(stripped.is_empty());
        assert_eq!(req.url(), &before);
    }

    #[test]
    fn param_name_match_is_case_sensitive() {
        let mut url = Url::parse("https://api.opendota.com/api/x?API_KEY=1").expect("url");
        assert_eq!(strip_query_param(&mut url, CREDENTIAL_QUERY_PARAM), 0);
        assert_eq!(url.query(), Some("API_KEY=1"));
    }

    #[test]
    fn repair_utf8_keeps_valid_payloads() {
        assert_eq!(repair_utf8("héros ✓".as_bytes()), None);
        assert_eq!(repair_utf8(b""), None);
    }

    #[test]
    fn repair_utf8_replaces_each_invalid_sequence() {
        let repaired = repair_utf8(b"caf\xe9 \xff\xfe ok").expect("repaired");
        let text = String::from_utf8(repaired).expect("valid utf-8");
        assert_eq!(text, "caf\u{FFFD} \u{FFFD}\u{FFFD} ok");
    }

    #[test]
    fn repair_utf8_handles_truncated_multibyte_sequence() {
        // "é" is C3 A9; a lone C3 at the end is one maximal invalid subpart.
        let repaired = repair_utf8(b"abc\xc3").expect("repaired");
        assert_eq!(
            String::from_utf8(repaired).expect("valid utf-8"),
            "abc\u{FFFD}"
        );
    }

    async fn spawn_upstream() -> (String, tokio::task::JoinHandle<()>) {
        async fn echo(uri: Uri, headers: AxumHeaderMap) -> axum::Json<Value> {
            let names: Vec<&str> = headers.keys().map(axum::http::HeaderName::as_str).collect();
            axum::Json(json!({
                "query": uri.query(),
                "headers": names,
            }))
        }

        async fn latin1() -> ([(axum::http::HeaderName, &'static str); 1], &'static [u8]) {
            (
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                b"{\"name\":\"Kunkka \xe9\"}",
            )
        }

        async fn png() -> ([(axum::http::HeaderName, &'static str); 1], &'static [u8]) {
            (
                [(axum::http::header::CONTENT_TYPE, "image/png")],
                b"\x89PNG\r\n\x1a\n\xff\x00",
            )
        }

        let app = Router::new()
            .route("/api/echo", get(echo))
            .route("/api/latin1", get(latin1))
            .route("/api/png", get(png));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn end_to_end_request_reaches_upstream_without_credentials() {
        let (base, server) = spawn_upstream().await;
        let client = sanitizing_client("127.0.0.1");

        let echoed: Value = client
            .get(format!("{base}/api/echo?api_key=abc&mode=json"))
            .header("Authorization", "Bearer xyz")
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("json");

        assert_eq!(echoed["query"], json!("mode=json"));
        let headers = echoed["headers"].as_array().expect("headers");
        assert!(!headers.contains(&json!("authorization")), "{echoed}");
        server.abort();
    }

    #[tokio::test]
    async fn repairs_invalid_utf8_from_the_designated_host() {
        let (base, server) = spawn_upstream().await;
        let client = sanitizing_client("127.0.0.1");

        let resp = client
            .get(format!("{base}/api/latin1"))
            .send()
            .await
            .expect("send");
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.url().path(), "/api/latin1");
        assert_eq!(
            resp.remote_addr().map(|a| a.ip().to_string()).as_deref(),
            Some("127.0.0.1")
        );
        let expected = "{\"name\":\"Kunkka \u{FFFD}\"}";
        assert_eq!(
            resp.headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok()),
            Some(expected.len().to_string().as_str())
        );
        let text = String::from_utf8(resp.bytes().await.expect("bytes").to_vec())
            .expect("repaired body is valid utf-8");
        assert_eq!(text, expected);
        server.abort();
    }

    #[tokio::test]
    async fn leaves_other_hosts_untouched() {
        let (base, server) = spawn_upstream().await;
        let client = sanitizing_client("api.opendota.com");

        let bytes = client
            .get(format!("{base}/api/latin1"))
            .send()
            .await
            .expect("send")
            .bytes()
            .await
            .expect("bytes");

        assert_eq!(bytes.as_ref(), b"{\"name\":\"Kunkka \xe9\"}");
        server.abort();
    }

    #[tokio::test]
    async fn binary_bodies_from_the_designated_host_pass_through() {
        let (base, server) = spawn_upstream().await;
        let client = sanitizing_client("127.0.0.1");

        let bytes = client
            .get(format!("{base}/api/png"))
            .send()
            .await
            .expect("send")
            .bytes()
            .await
            .expect("bytes");

        assert_eq!(bytes.as_ref(), b"\x89PNG\r\n\x1a\n\xff\x00");
        server.abort();
    }

    #[test]
    fn binary_content_types() {
        let mut headers = HeaderMap::new();
        assert!(!is_binary_content_type(&headers));

        for (ct, binary) in [
            ("image/png", true),
            ("application/octet-stream", true),
            ("audio/ogg", true),
            ("application/json; charset=utf-8", false),
            ("text/html", false),
            ("not a mime", false),
        ] {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
            assert_eq!(is_binary_content_type(&headers), binary, "{ct}");
        }
    }
}
