//! IAM Tools
//!
//! Tools for inspecting the project IAM policy and the caller's permissions.

use serde::Deserialize;
use serde_json::Value;

use super::{into_tool_result, parse_args};
use crate::gcp::iam::IamPolicy;
use crate::mcp::context::ToolContext;
use crate::mcp::format::markdown_table;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

/// testIamPermissions accepts at most this many permissions per call
const MAX_PERMISSIONS: usize = 100;

/// Register IAM tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(get_policy_tool());
    registry.register_tool(test_permissions_tool());
}

// ============================================================================
// iam.get_policy
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetPolicyParams {
    #[serde(default)]
    project_id: Option<String>,
    /// Only show bindings containing this member, e.g. `user:alice@example.com`
    #[serde(default)]
    member: Option<String>,
}

fn get_policy_tool() -> RegisteredTool {
    ToolBuilder::new("iam.get_policy")
        .description("Show the project IAM policy bindings, optionally for a single member")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project (defaults to the current project)"
                },
                "member": {
                    "type": "string",
                    "description": "Only bindings for this member, e.g. user:alice@example.com or serviceAccount:sa@p.iam.gserviceaccount.com"
                }
            }
        }))
        .build(get_policy_handler)
}

async fn get_policy_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: GetPolicyParams = parse_args(params)?;
    let member = params
        .member
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let policy = ctx.cloud().await?.get_iam_policy(&project_id).await?;
            Ok(ToolsCallResult::text(render_policy(
                &project_id,
                &policy,
                member,
            )))
        }
        .await,
    )
}

pub(crate) fn render_policy(project_id: &str, policy: &IamPolicy, member: Option<&str>) -> String {
    let mut out = format!("## IAM policy of `{}`\n\n", project_id);
    if let Some(version) = policy.version {
        out.push_str(&format!("Version: {}\n", version));
    }
    if let Some(etag) = &policy.etag {
        out.push_str(&format!("Etag: `{}`\n", etag));
    }
    out.push('\n');

    if let Some(member) = member {
        let roles = policy.roles_for_member(member);
        if roles.is_empty() {
            out.push_str(&format!("`{}` has no roles in this project.\n", member));
        } else {
            out.push_str(&format!("Roles granted to `{}`:\n\n", member));
            for role in roles {
                out.push_str(&format!("- {}\n", role));
            }
        }
        return out;
    }

    if policy.bindings.is_empty() {
        out.push_str("The policy has no bindings.\n");
        return out;
    }

    let rows: Vec<Vec<String>> = policy
        .bindings
        .iter()
        .map(|b| {
            vec![
                b.role.clone(),
                b.members.join(", "),
                b.condition
                    .as_ref()
                    .and_then(|c| c.title.clone().or_else(|| c.expression.clone()))
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    out.push_str(&markdown_table(&["Role", "Members", "Condition"], &rows));
    out
}

// ============================================================================
// iam.test_permissions
// ============================================================================

#[derive(Debug, Deserialize)]
struct TestPermissionsParams {
    #[serde(default)]
    project_id: Option<String>,
    permissions: Vec<String>,
}

fn test_permissions_tool() -> RegisteredTool {
    ToolBuilder::new("iam.test_permissions")
        .description("Check which of the given permissions the server's credentials hold on the project")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project (defaults to the current project)"
                },
                "permissions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Permissions to test, e.g. logging.logEntries.list",
                    "minItems": 1,
                    "maxItems": MAX_PERMISSIONS
                }
            },
            "required": ["permissions"]
        }))
        .build(test_permissions_handler)
}

async fn test_permissions_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: TestPermissionsParams = parse_args(params)?;
    let permissions: Vec<String> = params
        .permissions
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if permissions.is_empty() {
        return Err(McpError::InvalidParams(
            "permissions must contain at least one permission".to_string(),
        ));
    }
    if permissions.len() > MAX_PERMISSIONS {
        return Err(McpError::InvalidParams(format!(
            "At most {} permissions can be tested at once",
            MAX_PERMISSIONS
        )));
    }

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let granted = ctx
                .cloud()
                .await?
                .test_iam_permissions(&project_id, &permissions)
                .await?;

            let mut out = format!("## Permission check on `{}`\n\n", project_id);
            let rows: Vec<Vec<String>> = permissions
                .iter()
                .map(|p| {
                    let status = if granted.contains(p) { "granted" } else { "missing" };
                    vec![p.clone(), status.to_string()]
                })
                .collect();
            out.push_str(&markdown_table(&["Permission", "Status"], &rows));
            out.push_str(&format!(
                "\n{} of {} granted\n",
                permissions.iter().filter(|p| granted.contains(p)).count(),
                permissions.len()
            ));
            Ok(ToolsCallResult::text(out))
        }
        .await,
    )
}
