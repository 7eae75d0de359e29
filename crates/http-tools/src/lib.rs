//! Outbound HTTP plumbing for the OpenDota MCP shim.
//!
//! This crate is used by:
//! - `opendota-openapi-tools` (tool calls against the upstream API)
//! - `opendota-mcp-server` (client construction during app assembly)
//!
//! It owns the credential-stripping middleware and the upstream response repair. It knows
//! nothing about MCP sessions or `OpenAPI` documents.

pub mod client;
pub mod redact;
pub mod sanitize;
pub mod semantics;
