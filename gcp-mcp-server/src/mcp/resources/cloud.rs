//! Cloud Resources
//!
//! Per-project views addressed by URI templates.

use chrono::{TimeDelta, Utc};

use crate::gcp::logging::LogQuery;
use crate::gcp::spanner::DatabasePath;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ResourceContent};
use crate::mcp::registry::{
    McpRegistry, RegisteredResource, ResourceBuilder, ResourceResult, UriParams,
};
use crate::mcp::tools::logging::render_entries;
use crate::mcp::tools::spanner::describe_schema;
use crate::mcp::tools::trace::render_trace;

const RECENT_LOG_ENTRIES: u32 = 50;
const RECENT_LOG_HOURS: i64 = 1;

/// Register cloud resources with the registry
pub fn register_resources(registry: &mut McpRegistry) {
    registry.register_resource(recent_logs_resource());
    registry.register_resource(iam_policy_resource());
    registry.register_resource(spanner_schema_resource());
    registry.register_resource(trace_resource());
}

fn param<'a>(params: &'a UriParams, name: &str) -> Result<&'a str, McpError> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| McpError::InvalidParams(format!("Missing URI parameter: {}", name)))
}

// ============================================================================
// logging://{project_id}/recent
// ============================================================================

fn recent_logs_resource() -> RegisteredResource {
    ResourceBuilder::new("logging://{project_id}/recent", "Recent log entries")
        .description("Newest log entries of the last hour")
        .mime_type("text/markdown")
        .build(recent_logs_handler)
}

async fn recent_logs_handler(ctx: ToolContext, uri: String, params: UriParams) -> ResourceResult {
    let mut query = LogQuery::new(param(&params, "project_id")?);
    query.page_size = RECENT_LOG_ENTRIES;
    query.start_time = Some(Utc::now() - TimeDelta::hours(RECENT_LOG_HOURS));

    let entries = ctx.cloud().await?.list_log_entries(&query).await?;
    Ok(vec![ResourceContent::markdown(
        uri,
        render_entries(&query, &entries),
    )])
}

// ============================================================================
// iam://{project_id}/policy
// ============================================================================

fn iam_policy_resource() -> RegisteredResource {
    ResourceBuilder::new("iam://{project_id}/policy", "IAM policy")
        .description("The project IAM policy as returned by Resource Manager")
        .mime_type("application/json")
        .build(iam_policy_handler)
}

async fn iam_policy_handler(ctx: ToolContext, uri: String, params: UriParams) -> ResourceResult {
    let project_id = param(&params, "project_id")?;
    let policy = ctx.cloud().await?.get_iam_policy(project_id).await?;
    Ok(vec![ResourceContent::json(uri, &policy)?])
}

// ============================================================================
// spanner://{project_id}/{instance}/{database}/schema
// ============================================================================

fn spanner_schema_resource() -> RegisteredResource {
    ResourceBuilder::new(
        "spanner://{project_id}/{instance}/{database}/schema",
        "Spanner schema",
    )
    .description("Tables and columns of a Spanner database")
    .mime_type("text/markdown")
    .build(spanner_schema_handler)
}

async fn spanner_schema_handler(
    ctx: ToolContext,
    uri: String,
    params: UriParams,
) -> ResourceResult {
    let path = DatabasePath::new(
        param(&params, "project_id")?,
        param(&params, "instance")?,
        param(&params, "database")?,
    );
    let text = describe_schema(ctx.cloud().await?, &path).await?;
    Ok(vec![ResourceContent::markdown(uri, text)])
}

// ============================================================================
// trace://{project_id}/{trace_id}
// ============================================================================

fn trace_resource() -> RegisteredResource {
    ResourceBuilder::new("trace://{project_id}/{trace_id}", "Trace")
        .description("A single trace rendered as a span tree")
        .mime_type("text/markdown")
        .build(trace_handler)
}

async fn trace_handler(ctx: ToolContext, uri: String, params: UriParams) -> ResourceResult {
    let trace = ctx
        .cloud()
        .await?
        .get_trace(param(&params, "project_id")?, param(&params, "trace_id")?)
        .await?;
    Ok(vec![ResourceContent::markdown(uri, render_trace(&trace))])
}
