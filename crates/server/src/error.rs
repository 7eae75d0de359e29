//! Error types for the MCP server.

use opendota_openapi_tools::error::OpenApiToolsError;
use thiserror::Error;

/// Main error type for the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration errors (invalid upstream URLs, bad bind address)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (spec fetch, logging setup)
    #[error("Startup error: {0}")]
    Startup(String),

    /// Runtime errors (unknown tool, missing arguments)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// HTTP errors (upstream answered with a non-success status)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Transport errors (upstream unreachable, timed out)
    #[error("Transport error: {0}")]
    Transport(String),

    /// `OpenAPI` errors (spec fetch, parsing, validation)
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    /// Parameter collision errors
    #[error("Parameter collision: {0}")]
    ParamCollision(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<OpenApiToolsError> for ServerError {
    fn from(e: OpenApiToolsError) -> Self {
        match e {
            OpenApiToolsError::Config(msg) => Self::Config(msg),
            OpenApiToolsError::Startup(msg) => Self::Startup(msg),
            OpenApiToolsError::Runtime(msg) => Self::Runtime(msg),
            OpenApiToolsError::Http(msg) => Self::Http(msg),
            OpenApiToolsError::Request(msg) => Self::Transport(msg),
            OpenApiToolsError::ParamCollision(msg) => Self::ParamCollision(msg),
            OpenApiToolsError::Json(e) => Self::Json(e),
            e @ (OpenApiToolsError::OpenApi(_)
            | OpenApiToolsError::OpenApiSpecFetch { .. }
            | OpenApiToolsError::OpenApiSpecReadBody { .. }
            | OpenApiToolsError::OpenApiSpecParse { .. }) => {
                let msg = e.to_string();
                Self::OpenApi(msg.trim_start_matches("OpenAPI error: ").to_string())
            }
        }
    }
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
