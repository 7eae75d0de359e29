//! rmcp `ServerHandler` over an [`OpenApiToolSource`].

use crate::error::ServerError;
use opendota_openapi_tools::runtime::OpenApiToolSource;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct OpenApiServer {
    source: OpenApiToolSource,
}

impl OpenApiServer {
    #[must_use]
    pub fn new(source: OpenApiToolSource) -> Self {
        Self { source }
    }
}

impl ServerHandler for OpenApiServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.source.name().to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(format!(
                "Tools proxy the {} ({}) anonymously. Each tool is one HTTP operation.",
                self.source.spec_title(),
                self.source.base_url()
            )),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.source.list_tools(),
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let arguments = request.arguments.map_or(Value::Null, Value::Object);
        match self.source.call_tool(&request.name, arguments).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let e = ServerError::from(e);
                tracing::warn!(tool = %request.name, error = %e, "Tool call failed");
                tool_error_to_result(e)
            }
        }
    }
}

/// Caller mistakes are protocol errors, upstream refusals are tool results the model can read.
fn tool_error_to_result(e: ServerError) -> Result<CallToolResult, ErrorData> {
    match e {
        ServerError::Runtime(msg) => Err(ErrorData::invalid_params(msg, None)),
        ServerError::Http(msg) => Ok(CallToolResult::error(vec![Content::text(msg)])),
        other => Err(ErrorData::internal_error(other.to_string(), None)),
    }
}
