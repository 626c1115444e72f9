//! Project Resources

use crate::mcp::context::ToolContext;
use crate::mcp::protocol::ResourceContent;
use crate::mcp::registry::{
    McpRegistry, RegisteredResource, ResourceBuilder, ResourceResult, UriParams,
};
use crate::mcp::tools::project::ProjectInfo;

pub const CURRENT_PROJECT_URI: &str = "gcp://project/current";

/// Register project resources with the registry
pub fn register_resources(registry: &mut McpRegistry) {
    registry.register_resource(current_project_resource());
}

fn current_project_resource() -> RegisteredResource {
    ResourceBuilder::new(CURRENT_PROJECT_URI, "Current project")
        .description("Current project id, credential status and server info")
        .mime_type("application/json")
        .build(current_project_handler)
}

async fn current_project_handler(ctx: ToolContext, uri: String, _params: UriParams) -> ResourceResult {
    let info = ProjectInfo::collect(&ctx);
    let output = serde_json::json!({
        "current_project_id": info.current_project_id,
        "default_project_id": info.default_project_id,
        "auth_initialized": info.auth_initialized,
        "credential_kind": info.credential_kind,
        "transport": ctx.transport.to_string(),
        "server_version": ctx.server_version,
        "uptime_secs": ctx.start_time.elapsed().as_secs(),
    });

    Ok(vec![ResourceContent::json(uri, &output)?])
}
