//! HTTP method semantics for MCP tool annotations.
//!
//! Every generated tool wraps one upstream HTTP operation, so the MCP hints follow RFC 9110
//! method properties. `openWorldHint` is always `true`: the tool talks to an external API.

use reqwest::Method;
use rmcp::model::ToolAnnotations;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MethodHints {
    read_only: Option<bool>,
    destructive: Option<bool>,
    idempotent: Option<bool>,
}

impl MethodHints {
    const fn known(read_only: bool, destructive: bool, idempotent: Option<bool>) -> Self {
        Self {
            read_only: Some(read_only),
            destructive: Some(destructive),
            idempotent,
        }
    }

    const UNKNOWN: Self = Self {
        read_only: None,
        destructive: None,
        idempotent: None,
    };
}

fn hints_for(method: &Method) -> MethodHints {
    match method.as_str() {
        "GET" | "HEAD" | "OPTIONS" | "TRACE" => MethodHints::known(true, false, Some(true)),
        "POST" => MethodHints::known(false, false, Some(false)),
        "PUT" | "DELETE" => MethodHints::known(false, true, Some(true)),
        // PATCH may or may not be idempotent.
        "PATCH" => MethodHints::known(false, true, None),
        _ => MethodHints::UNKNOWN,
    }
}

/// MCP tool annotations for an operation using `method`, with an optional human title.
#[must_use]
pub fn annotations_for_method(method: &Method, title: Option<&str>) -> ToolAnnotations {
    let hints = hints_for(method);
    ToolAnnotations {
        title: title.map(str::to_string),
        read_only_hint: hints.read_only,
        destructive_hint: hints.destructive,
        idempotent_hint: hints.idempotent,
        open_world_hint: Some(true),
    }
}
