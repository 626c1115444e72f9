//! GCP MCP Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod auth;
pub mod config;
pub mod error;
pub mod gcp;
pub mod mcp;
pub mod server;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use error::ServiceError;
pub use server::{run_server, run_stdio, RequestsLoggingLevel};
pub use session::SessionRegistry;
pub use state::ProjectState;
