//! Error types for `opendota-openapi-tools`.

use thiserror::Error;

/// Main error type for `OpenAPI` tooling.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (invalid upstream URLs).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (spec fetch could not be scheduled, assembly aborted).
    #[error("Startup error: {0}")]
    Startup(String),

    /// Runtime errors (unknown tool, missing arguments).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// HTTP errors (upstream answered with a non-success status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// `OpenAPI` errors (unresolvable references, unsupported constructs).
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    #[error("OpenAPI error: failed to fetch spec from '{url}': {message}")]
    OpenApiSpecFetch { url: String, message: String },

    #[error("OpenAPI error: failed to read spec body from '{url}': {message}")]
    OpenApiSpecReadBody { url: String, message: String },

    #[error("OpenAPI error: failed to parse OpenAPI spec from '{location}': {source}")]
    OpenApiSpecParse {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    /// Parameter collision errors.
    #[error("Parameter collision: {0}")]
    ParamCollision(String),

    /// JSON errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport errors while calling the upstream (URLs redacted).
    #[error("Request error: {0}")]
    Request(String),
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
