//! OpenDota API exposed as a stateless MCP server.
//!
//! The same router backs both entrypoints: the Lambda handler ([`lambda::handle_invocation`])
//! and the standalone HTTP listener.

pub mod app;
pub mod config;
pub mod error;
pub mod handler;
pub mod lambda;
pub mod logging;
