//! `OpenAPI` -> MCP tool assembly and execution.
//!
//! [`OpenApiToolSource`] turns every operation of a (security-free) `OpenAPI` description into
//! one MCP tool and proxies tool calls to the upstream through the sanitizing client.

use crate::config::UpstreamConfig;
use crate::error::{OpenApiToolsError, Result};
use crate::resolver::ComponentResolver;
use base64::Engine as _;
use mime::Mime;
use openapiv3::{
    OpenAPI, Operation, Parameter, ParameterSchemaOrContent, PathItem, ReferenceOr, RequestBody,
};
use opendota_http_tools::redact::{sanitize_middleware_error, sanitize_reqwest_error};
use opendota_http_tools::semantics::annotations_for_method;
use regex::{Captures, Regex};
use reqwest::Method;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use url::Url;

const MAX_TOOL_NAME_LEN: usize = 64;

/// Name of the argument carrying a request body that is not flattened.
const BODY_ARGUMENT: &str = "body";

static PATH_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("path template regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ParamLocation {
    Path,
    Query,
    Header,
    /// One property of a flattened JSON body.
    BodyField,
    /// The entire request body.
    Body,
}

impl ParamLocation {
    fn of(parameter: &Parameter) -> Option<Self> {
        match parameter {
            Parameter::Path { .. } => Some(Self::Path),
            Parameter::Query { .. } => Some(Self::Query),
            Parameter::Header { .. } => Some(Self::Header),
            Parameter::Cookie { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ToolParameter {
    name: String,
    location: ParamLocation,
    required: bool,
    schema: Value,
}

#[derive(Debug, Clone)]
struct BodySpec {
    content_type: String,
    required: bool,
}

#[derive(Debug, Clone)]
struct GeneratedTool {
    name: String,
    title: Option<String>,
    description: String,
    method: Method,
    path: String,
    parameters: Vec<ToolParameter>,
    body: Option<BodySpec>,
    input_schema: Arc<JsonObject>,
}

#[derive(Debug, Default)]
struct RequestParts {
    path_values: HashMap<String, String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

enum ToolResponse {
    Value(Value),
    Image { bytes: Vec<u8>, mime_type: String },
}

/// MCP tools generated from an `OpenAPI` description, bound to one upstream.
#[derive(Clone)]
pub struct OpenApiToolSource {
    name: String,
    spec_title: String,
    base_url: Url,
    call_timeout: Duration,
    client: ClientWithMiddleware,
    tools: Arc<Vec<GeneratedTool>>,
}

impl std::fmt::Debug for OpenApiToolSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenApiToolSource")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl OpenApiToolSource {
    /// Assemble the tool surface for `spec`.
    ///
    /// Calls are resolved against `config.base_url`, never against the `servers` listed in the
    /// description. Operations that cannot be converted are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if `spec` is not a valid `OpenAPI` 3.0 document or the base URL is
    /// invalid.
    pub fn build(
        config: &UpstreamConfig,
        spec: &Value,
        client: ClientWithMiddleware,
    ) -> Result<Self> {
        let base_url = config.base()?;
        let parsed: OpenAPI = serde_json::from_value(spec.clone()).map_err(|source| {
            OpenApiToolsError::OpenApiSpecParse {
                location: config.spec_url.clone(),
                source,
            }
        })?;

        let resolver = ComponentResolver::new(spec);
        let tools = discover_tools(&parsed, &resolver);

        tracing::info!(
            source = %config.name,
            title = %parsed.info.title,
            version = %parsed.info.version,
            tools = tools.len(),
            base_url = %base_url,
            "Assembled OpenAPI tool source"
        );

        Ok(Self {
            name: config.name.clone(),
            spec_title: parsed.info.title,
            base_url,
            call_timeout: config.call_timeout,
            client,
            tools: Arc::new(tools),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `info.title` of the description the tools were generated from.
    #[must_use]
    pub fn spec_title(&self) -> &str {
        &self.spec_title
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|t| {
                let mut tool = Tool::new(
                    t.name.clone(),
                    t.description.clone(),
                    Arc::clone(&t.input_schema),
                );
                tool.annotations = Some(annotations_for_method(&t.method, t.title.as_deref()));
                tool
            })
            .collect()
    }

    /// Execute a tool call.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the tool name is unknown
    /// - required parameters are missing
    /// - the outbound HTTP request fails (transport or non-2xx response)
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| OpenApiToolsError::Runtime(format!("Tool not found: {name}")))?;

        match self.execute_request(tool, &arguments).await? {
            ToolResponse::Image { bytes, mime_type } => {
                let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
                Ok(CallToolResult::success(vec![Content::image(b64, mime_type)]))
            }
            ToolResponse::Value(body) => {
                let text = match body {
                    Value::String(s) => s,
                    other => serde_json::to_string(&other)?,
                };
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
        }
    }

    async fn execute_request(
        &self,
        tool: &GeneratedTool,
        arguments: &Value,
    ) -> Result<ToolResponse> {
        let parts = build_request_parts(tool, arguments)?;
        let url = build_url(&self.base_url, &tool.path, &parts.path_values, &parts.query)?;

        tracing::debug!(tool = %tool.name, method = %tool.method, path = %tool.path, "Calling upstream");

        let mut request = self
            .client
            .request(tool.method.clone(), url)
            .timeout(self.call_timeout);
        for (name, value) in parts.headers {
            request = request.header(name, value);
        }
        if let (Some(body), Some(spec)) = (parts.body.as_ref(), tool.body.as_ref()) {
            request = apply_body(request, body, &spec.content_type);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OpenApiToolsError::Request(sanitize_middleware_error(&e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| OpenApiToolsError::Request(sanitize_reqwest_error(&e)))?;

        let body = bytes_to_text_or_base64_json(&bytes, content_type.as_deref());

        if status.is_success() {
            if is_image_content_type(content_type.as_deref()) {
                let mime_type = content_type.unwrap_or_else(|| "image/*".to_string());
                return Ok(ToolResponse::Image {
                    bytes: bytes.to_vec(),
                    mime_type,
                });
            }
            Ok(ToolResponse::Value(parse_json_text(body)))
        } else {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            Err(OpenApiToolsError::Http(format!(
                "API returned {} {reason}: {}",
                status.as_u16(),
                parse_json_text(body)
            )))
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

fn discover_tools(spec: &OpenAPI, resolver: &ComponentResolver<'_>) -> Vec<GeneratedTool> {
    let mut names = HashSet::new();
    let mut tools = Vec::new();

    for (path, item) in &spec.paths.paths {
        let item: PathItem = match resolver.resolve(item) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Skipping path item");
                continue;
            }
        };

        for (method, op) in operations(&item) {
            match generate_tool(resolver, path, &method, op, &item.parameters, &mut names) {
                Ok(tool) => tools.push(tool),
                Err(e) => {
                    tracing::warn!(method = %method, path = %path, error = %e, "Skipping operation");
                }
            }
        }
    }

    tools
}

fn operations(item: &PathItem) -> impl Iterator<Item = (Method, &Operation)> {
    [
        (Method::GET, &item.get),
        (Method::PUT, &item.put),
        (Method::POST, &item.post),
        (Method::DELETE, &item.delete),
        (Method::OPTIONS, &item.options),
        (Method::HEAD, &item.head),
        (Method::PATCH, &item.patch),
        (Method::TRACE, &item.trace),
    ]
    .into_iter()
    .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
}

fn generate_tool(
    resolver: &ComponentResolver<'_>,
    path: &str,
    method: &Method,
    op: &Operation,
    path_item_params: &[ReferenceOr<Parameter>],
    names: &mut HashSet<String>,
) -> Result<GeneratedTool> {
    let mut parameters = Vec::new();
    let mut taken = HashSet::new();

    for param in merge_parameters(resolver, path_item_params, &op.parameters)? {
        let tool_param = extract_parameter(resolver, &param)?;
        if !taken.insert(tool_param.name.clone()) {
            return Err(OpenApiToolsError::ParamCollision(format!(
                "parameter '{}' appears in more than one location",
                tool_param.name
            )));
        }
        parameters.push(tool_param);
    }

    let mut body = None;
    if let Some(body_ref) = &op.request_body {
        let request_body: RequestBody = resolver.resolve(body_ref)?;
        if let Some((spec, body_params)) = extract_body_params(resolver, &request_body, &taken)? {
            parameters.extend(body_params);
            body = Some(spec);
        }
    }

    let base_name = op
        .operation_id
        .as_deref()
        .map(normalize_tool_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| canonical_tool_name(method.as_str(), path));
    let name = reserve_unique_tool_name(names, &base_name);

    let description = op
        .summary
        .clone()
        .or_else(|| op.description.clone())
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Calls {method} {path}"));

    Ok(GeneratedTool {
        name,
        title: op.summary.clone(),
        description,
        method: method.clone(),
        path: path.to_string(),
        input_schema: Arc::new(build_input_schema(&parameters)),
        parameters,
        body,
    })
}

/// Path-item parameters overlaid by operation parameters with the same name and location.
fn merge_parameters(
    resolver: &ComponentResolver<'_>,
    path_level: &[ReferenceOr<Parameter>],
    op_level: &[ReferenceOr<Parameter>],
) -> Result<Vec<Parameter>> {
    let mut merged: Vec<Parameter> = Vec::new();

    for param_ref in path_level.iter().chain(op_level) {
        let param: Parameter = resolver.resolve(param_ref)?;
        let Some(location) = ParamLocation::of(&param) else {
            return Err(OpenApiToolsError::OpenApi(format!(
                "cookie parameter '{}' is not supported",
                param.parameter_data_ref().name
            )));
        };

        let name = param.parameter_data_ref().name.clone();
        match merged.iter_mut().find(|p| {
            ParamLocation::of(p) == Some(location) && p.parameter_data_ref().name == name
        }) {
            Some(existing) => *existing = param,
            None => merged.push(param),
        }
    }

    Ok(merged)
}

fn extract_parameter(resolver: &ComponentResolver<'_>, param: &Parameter) -> Result<ToolParameter> {
    let location = ParamLocation::of(param).ok_or_else(|| {
        OpenApiToolsError::OpenApi("cookie parameters are not supported".to_string())
    })?;
    let data = param.parameter_data_ref();

    let mut schema = match &data.format {
        ParameterSchemaOrContent::Schema(schema) => resolver.schema_json(schema)?,
        ParameterSchemaOrContent::Content(content) => match content
            .values()
            .next()
            .and_then(|media| media.schema.as_ref())
        {
            Some(schema) => resolver.schema_json(schema)?,
            None => json!({}),
        },
    };

    if let (Some(description), Some(obj)) = (&data.description, schema.as_object_mut()) {
        obj.entry("description")
            .or_insert_with(|| Value::String(description.clone()));
    }

    Ok(ToolParameter {
        name: data.name.clone(),
        location,
        required: location == ParamLocation::Path || data.required,
        schema,
    })
}

/// Arguments for a request body: one per property of a JSON object schema, else a single
/// `body` argument.
fn extract_body_params(
    resolver: &ComponentResolver<'_>,
    body: &RequestBody,
    taken: &HashSet<String>,
) -> Result<Option<(BodySpec, Vec<ToolParameter>)>> {
    let Some((content_type, media)) = body
        .content
        .iter()
        .find(|(ct, _)| is_json_content_type(ct))
        .or_else(|| body.content.iter().next())
    else {
        return Ok(None);
    };

    let schema = match &media.schema {
        Some(schema) => resolver.schema_json(schema)?,
        None => json!({}),
    };
    let spec = BodySpec {
        content_type: content_type.clone(),
        required: body.required,
    };

    if is_json_content_type(content_type)
        && let Some(properties) = schema.get("properties").and_then(Value::as_object)
        && !properties.is_empty()
        && properties.keys().all(|k| !taken.contains(k))
    {
        let required_fields: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let params = properties
            .iter()
            .map(|(name, prop_schema)| ToolParameter {
                name: name.clone(),
                location: ParamLocation::BodyField,
                required: body.required && required_fields.contains(name.as_str()),
                schema: prop_schema.clone(),
            })
            .collect();
        return Ok(Some((spec, params)));
    }

    if taken.contains(BODY_ARGUMENT) {
        return Err(OpenApiToolsError::ParamCollision(format!(
            "request body argument '{BODY_ARGUMENT}' collides with a parameter"
        )));
    }

    Ok(Some((
        spec,
        vec![ToolParameter {
            name: BODY_ARGUMENT.to_string(),
            location: ParamLocation::Body,
            required: body.required,
            schema,
        }],
    )))
}

fn build_input_schema(parameters: &[ToolParameter]) -> JsonObject {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in parameters {
        properties.insert(param.name.clone(), param.schema.clone());
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema
}

// ============================================================================
// Naming
// ============================================================================

/// `get /players/{account_id}/wl` -> `get_players_account_id_wl`.
fn canonical_tool_name(method: &str, path: &str) -> String {
    let raw = format!(
        "{}_{}",
        method.to_ascii_lowercase(),
        PATH_TEMPLATE.replace_all(path, "_${1}")
    );
    normalize_tool_name(&raw)
}

/// Collapse runs of characters MCP clients reject into `_` and cap the length.
fn normalize_tool_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            name.push(c);
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    let mut name = name.trim_matches('_').to_string();
    name.truncate(MAX_TOOL_NAME_LEN);
    name
}

fn reserve_unique_tool_name(names: &mut HashSet<String>, base: &str) -> String {
    if names.insert(base.to_string()) {
        return base.to_string();
    }
    for i in 1.. {
        let suffix = format!("_{i}");
        let stem_len = MAX_TOOL_NAME_LEN.saturating_sub(suffix.len()).min(base.len());
        let candidate = format!("{}{suffix}", &base[..stem_len]);
        if names.insert(candidate.clone()) {
            return candidate;
        }
    }
    unreachable!("tool name suffixes are unbounded")
}

// ============================================================================
// Request building
// ============================================================================

fn build_request_parts(tool: &GeneratedTool, arguments: &Value) -> Result<RequestParts> {
    let args = match arguments {
        Value::Object(map) => Some(map),
        Value::Null => None,
        _ => {
            return Err(OpenApiToolsError::Runtime(
                "Tool arguments must be a JSON object".to_string(),
            ));
        }
    };

    let mut parts = RequestParts::default();
    let mut body_fields = Map::new();

    for param in &tool.parameters {
        let Some(value) = args
            .and_then(|a| a.get(&param.name))
            .filter(|v| !v.is_null())
        else {
            if param.required {
                return Err(OpenApiToolsError::Runtime(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
            continue;
        };

        match param.location {
            ParamLocation::Path => {
                parts
                    .path_values
                    .insert(param.name.clone(), value_to_string(value));
            }
            ParamLocation::Query => serialize_query_param(&param.name, value, &mut parts.query),
            ParamLocation::Header => {
                parts.headers.push((param.name.clone(), value_to_string(value)));
            }
            ParamLocation::BodyField => {
                body_fields.insert(param.name.clone(), value.clone());
            }
            ParamLocation::Body => parts.body = Some(value.clone()),
        }
    }

    let body_required = tool.body.as_ref().is_some_and(|b| b.required);
    if !body_fields.is_empty() || (body_required && parts.body.is_none()) {
        parts.body = Some(Value::Object(body_fields));
    }

    Ok(parts)
}

/// Form-style query serialization: arrays repeat the name, objects become `name[key]`.
fn serialize_query_param(name: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Array(items) => {
            out.extend(
                items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|item| (name.to_string(), value_to_string(item))),
            );
        }
        Value::Object(map) => {
            out.extend(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(key, v)| (format!("{name}[{key}]"), value_to_string(v))),
            );
        }
        other => out.push((name.to_string(), value_to_string(other))),
    }
}

fn build_url(
    base: &Url,
    template: &str,
    path_values: &HashMap<String, String>,
    query: &[(String, String)],
) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|()| {
            OpenApiToolsError::Config(format!("Base URL '{base}' cannot carry a path"))
        })?;
        segments.pop_if_empty();
        for segment in template.split('/').filter(|s| !s.is_empty()) {
            let rendered = PATH_TEMPLATE.replace_all(segment, |caps: &Captures<'_>| {
                path_values
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            });
            // `push` percent-encodes, so a `/` inside a value stays in its segment.
            segments.push(&rendered);
        }
    }

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

fn apply_body(request: RequestBuilder, body: &Value, content_type: &str) -> RequestBuilder {
    if is_json_content_type(content_type) {
        return request.json(body);
    }
    let raw = match body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    request
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(raw)
}

// ============================================================================
// Helpers
// ============================================================================

fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .parse::<Mime>()
        .is_ok_and(|m| m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
}

fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.parse::<Mime>().ok())
        .is_some_and(|m| m.type_() == mime::IMAGE)
}

fn bytes_to_text_or_base64_json(bytes: &[u8], content_type: Option<&str>) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        }),
    }
}

fn parse_json_text(body: Value) -> Value {
    match body {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
