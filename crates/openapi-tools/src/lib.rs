//! OpenAPI->MCP tooling for the OpenDota shim.
//!
//! - [`fetch`]: synchronous retrieval of the upstream description
//! - [`sanitize`]: removal of security requirements from it
//! - [`runtime`]: one MCP tool per operation, proxied through the sanitizing client
//!
//! It contains no MCP transport code; serving the tools is the server crate's job.

pub mod config;
pub mod error;
pub mod fetch;
pub mod resolver;
pub mod runtime;
pub mod sanitize;
