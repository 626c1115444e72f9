//! MCP (Model Context Protocol) Server
//!
//! Exposes Google Cloud Logging, Monitoring, Spanner, IAM and Trace to LLM
//! clients as MCP tools and resources.
//!
//! ## Architecture
//!
//! - Transports: newline-delimited JSON-RPC on stdio, or `POST /mcp` over HTTP
//! - Sessions: HTTP clients carry an `Mcp-Session-Id` header, stdio uses one implicit session
//! - Tools: provider failures come back in-band with `isError: true`
//! - Resources: fixed URIs plus `{param}` templates

pub mod context;
pub mod format;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod resources;
pub mod tools;

pub use handler::{McpConnection, McpState};
pub use protocol::{McpError, McpRequest, McpResponse};
pub use registry::McpRegistry;
