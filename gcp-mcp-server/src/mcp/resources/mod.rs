//! MCP Resources
//!
//! Read-only views of the current project, the caller's session and
//! per-project cloud data.

pub mod cloud;
pub mod project;
pub mod session;

use super::registry::McpRegistry;

/// Register all resources with the registry
pub fn register_all_resources(registry: &mut McpRegistry) {
    project::register_resources(registry);
    session::register_resources(registry);
    cloud::register_resources(registry);
}
