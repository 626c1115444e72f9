//! Project Tools
//!
//! Tools for reading and switching the current project.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parse_args;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

/// Register project tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(project_get_tool());
    registry.register_tool(project_set_tool());
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectInfo {
    pub current_project_id: Option<String>,
    pub default_project_id: Option<String>,
    pub auth_initialized: bool,
    pub credential_kind: Option<&'static str>,
}

impl ProjectInfo {
    pub fn collect(ctx: &ToolContext) -> Self {
        let state = ctx.project_state.snapshot();
        Self {
            current_project_id: state.current_project_id,
            default_project_id: ctx.auth.default_project_id(),
            auth_initialized: state.auth_initialized,
            credential_kind: ctx.auth.credential_kind(),
        }
    }
}

// ============================================================================
// project.get
// ============================================================================

fn project_get_tool() -> RegisteredTool {
    ToolBuilder::new("project.get")
        .description("Show the current project, the credentials' default project and auth status")
        .build(project_get_handler)
}

async fn project_get_handler(ctx: ToolContext, _params: Value) -> ToolResult {
    ToolsCallResult::json(&ProjectInfo::collect(&ctx))
        .map_err(|e| McpError::InternalError(e.to_string()))
}

// ============================================================================
// project.set
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProjectSetParams {
    project_id: String,
}

fn project_set_tool() -> RegisteredTool {
    ToolBuilder::new("project.set")
        .description("Switch the current project used by every tool that is not given a project_id")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project id to make current"
                }
            },
            "required": ["project_id"]
        }))
        .build(project_set_handler)
}

async fn project_set_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ProjectSetParams = parse_args(params)?;
    let previous = ctx.project_state.current_project_id();

    ctx.project_state.set_current_project_id(&params.project_id)?;

    let current = ctx.project_state.current_project_id();
    ToolsCallResult::json(&serde_json::json!({
        "previous_project_id": previous,
        "current_project_id": current,
    }))
    .map_err(|e| McpError::InternalError(e.to_string()))
}
