//! Session Resources
//!
//! Lets a client inspect the session its requests are bound to.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::SystemTime;

use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ResourceContent};
use crate::mcp::registry::{
    McpRegistry, RegisteredResource, ResourceBuilder, ResourceResult, UriParams,
};
use crate::session::MAX_ROTATIONS;

pub const CURRENT_SESSION_URI: &str = "session://current";

/// Leading characters of the session id shown back to the client
const VISIBLE_ID_CHARS: usize = 12;

/// Register session resources with the registry
pub fn register_resources(registry: &mut McpRegistry) {
    registry.register_resource(current_session_resource());
}

fn current_session_resource() -> RegisteredResource {
    ResourceBuilder::new(CURRENT_SESSION_URI, "Current session")
        .description("Age, rotation count and metadata of the session this connection uses")
        .mime_type("application/json")
        .build(current_session_handler)
}

async fn current_session_handler(ctx: ToolContext, uri: String, _params: UriParams) -> ResourceResult {
    let session_id = ctx
        .session_id
        .as_deref()
        .ok_or_else(|| McpError::ResourceNotFound("No session bound to this connection".to_string()))?;

    let record = ctx
        .sessions
        .get_session(session_id)
        .ok_or_else(|| McpError::ResourceNotFound("Session expired or invalidated".to_string()))?;

    let now = SystemTime::now();
    let lifetime = ctx.sessions.lifetime();
    let age = record.age_at(now);

    let output = serde_json::json!({
        "id_prefix": masked_id(&record.id),
        "transport": ctx.transport.to_string(),
        "created": format_time(record.created),
        "last_used": format_time(record.last_used),
        "age_secs": age.as_secs(),
        "expires_in_secs": lifetime.saturating_sub(age).as_secs(),
        "rotation_count": record.rotation_count,
        "rotations_remaining": MAX_ROTATIONS.saturating_sub(record.rotation_count),
        "metadata": record.metadata,
        "registry": ctx.sessions.get_session_stats(),
    });

    Ok(vec![ResourceContent::json(uri, &output)?])
}

fn masked_id(id: &str) -> String {
    let visible: String = id.chars().take(VISIBLE_ID_CHARS).collect();
    format!("{}…", visible)
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}
