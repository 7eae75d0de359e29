//! Redaction helpers for log lines and error messages.
//!
//! Outbound URLs may still carry credentials when an error is raised before the sanitizing
//! middleware ran (or by a caller that bypassed it), so every message derived from a URL goes
//! through [`redact_url`].

use url::Url;

/// Drop userinfo, query and fragment from a URL.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

/// Same as [`sanitize_reqwest_error`] for errors surfaced by a middleware stack.
#[must_use]
pub fn sanitize_middleware_error(e: &reqwest_middleware::Error) -> String {
    match e {
        reqwest_middleware::Error::Reqwest(inner) => sanitize_reqwest_error(inner),
        reqwest_middleware::Error::Middleware(inner) => format!("{inner:#}"),
    }
}
