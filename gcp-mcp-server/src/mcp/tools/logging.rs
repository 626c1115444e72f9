//! Logging Tools
//!
//! Tools for querying and searching Cloud Logging entries.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::{clamp_limit, into_tool_result, parse_args, TimeWindowArgs};
use crate::error::ServiceError;
use crate::gcp::logging::{search_filter, LogEntry, LogOrder, LogQuery};
use crate::mcp::context::ToolContext;
use crate::mcp::format::{markdown_table, or_dash, truncate};
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 1000;
const MAX_MESSAGE_CHARS: usize = 200;
const SEVERITIES: &[&str] = &[
    "DEFAULT",
    "DEBUG",
    "INFO",
    "NOTICE",
    "WARNING",
    "ERROR",
    "CRITICAL",
    "ALERT",
    "EMERGENCY",
];

/// Register logging tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(logging_query_tool());
    registry.register_tool(logging_search_tool());
}

// ============================================================================
// logging.query
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoggingQueryParams {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    order: LogOrder,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(flatten)]
    window: TimeWindowArgs,
}

fn logging_query_tool() -> RegisteredTool {
    ToolBuilder::new("logging.query")
        .description("Query Cloud Logging entries with a Logging query language filter")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project to query (defaults to the current project)"
                },
                "filter": {
                    "type": "string",
                    "description": "Logging filter, e.g. resource.type=\"k8s_container\" AND severity>=ERROR"
                },
                "order": {
                    "type": "string",
                    "enum": ["newest_first", "oldest_first"],
                    "description": "Sort order (default newest_first)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum entries to return (default 50)",
                    "minimum": 1,
                    "maximum": MAX_LIMIT
                },
                "start_time": { "type": "string", "description": "RFC 3339 start of the window" },
                "end_time": { "type": "string", "description": "RFC 3339 end of the window" },
                "hours": { "type": "number", "description": "Look back this many hours instead of start_time" }
            }
        }))
        .build(logging_query_handler)
}

async fn logging_query_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: LoggingQueryParams = parse_args(params)?;
    let window = params.window.resolve(None, Utc::now())?;

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let mut query = LogQuery::new(project_id);
            query.filter = params.filter;
            query.order = params.order;
            query.page_size = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
            query.start_time = window.start;
            query.end_time = window.end;
            run_query(&ctx, &query).await
        }
        .await,
    )
}

// ============================================================================
// logging.search
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoggingSearchParams {
    #[serde(default)]
    project_id: Option<String>,
    text: String,
    #[serde(default)]
    min_severity: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(flatten)]
    window: TimeWindowArgs,
}

fn logging_search_tool() -> RegisteredTool {
    ToolBuilder::new("logging.search")
        .description("Full-text search over recent log entries, optionally above a minimum severity")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project to search (defaults to the current project)"
                },
                "text": {
                    "type": "string",
                    "description": "Text to search for in any payload field"
                },
                "min_severity": {
                    "type": "string",
                    "enum": SEVERITIES,
                    "description": "Only entries at or above this severity"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum entries to return (default 50)",
                    "minimum": 1,
                    "maximum": MAX_LIMIT
                },
                "hours": { "type": "number", "description": "Look back this many hours (default 24)" },
                "start_time": { "type": "string", "description": "RFC 3339 start of the window" },
                "end_time": { "type": "string", "description": "RFC 3339 end of the window" }
            },
            "required": ["text"]
        }))
        .build(logging_search_handler)
}

async fn logging_search_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: LoggingSearchParams = parse_args(params)?;

    if params.text.trim().is_empty() {
        return Err(McpError::InvalidParams("text must not be empty".to_string()));
    }
    let min_severity = params
        .min_severity
        .as_deref()
        .map(validate_severity)
        .transpose()?;
    let window = params.window.resolve(Some(24.0), Utc::now())?;

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let mut query = LogQuery::new(project_id);
            query.filter = Some(search_filter(&params.text, min_severity));
            query.page_size = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
            query.start_time = window.start;
            query.end_time = window.end;
            run_query(&ctx, &query).await
        }
        .await,
    )
}

fn validate_severity(severity: &str) -> Result<&'static str, McpError> {
    SEVERITIES
        .iter()
        .find(|s| s.eq_ignore_ascii_case(severity.trim()))
        .copied()
        .ok_or_else(|| McpError::InvalidParams(format!("Unknown severity: {}", severity)))
}

async fn run_query(ctx: &ToolContext, query: &LogQuery) -> Result<ToolsCallResult, ServiceError> {
    let entries = ctx.cloud().await?.list_log_entries(query).await?;
    Ok(ToolsCallResult::text(render_entries(query, &entries)))
}

pub(crate) fn render_entries(query: &LogQuery, entries: &[LogEntry]) -> String {
    let filter = query.effective_filter();
    let mut out = format!("## Log entries for `{}`\n\n", query.project_id);
    if !filter.is_empty() {
        out.push_str(&format!("Filter: `{}`\n\n", filter));
    }

    if entries.is_empty() {
        out.push_str("No log entries matched.\n");
        return out;
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                or_dash(entry.timestamp.as_deref()).to_string(),
                or_dash(entry.severity.as_deref()).to_string(),
                entry
                    .resource
                    .as_ref()
                    .map(|r| r.resource_type.clone())
                    .unwrap_or_else(|| "-".to_string()),
                truncate(&entry.message(), MAX_MESSAGE_CHARS),
            ]
        })
        .collect();
    out.push_str(&markdown_table(
        &["Timestamp", "Severity", "Resource", "Message"],
        &rows,
    ));
    out.push_str(&format!("\n{} entries\n", entries.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_severity() {
        assert_eq!(validate_severity("error").unwrap(), "ERROR");
        assert_eq!(validate_severity(" Warning ").unwrap(), "WARNING");
        assert!(validate_severity("loud").is_err());
    }

    #[test]
    fn test_search_params_flatten_window() {
        let params: LoggingSearchParams = parse_args(serde_json::json!({
            "text": "timeout",
            "hours": 2
        }))
        .unwrap();
        assert_eq!(params.text, "timeout");
        assert_eq!(params.window.hours, Some(2.0));
    }

    #[test]
    fn test_render_entries() {
        let query = LogQuery::new("proj");
        let entries = vec![LogEntry {
            timestamp: Some("2024-01-01T00:00:00Z".to_string()),
            severity: Some("ERROR".to_string()),
            text_payload: Some("disk full".to_string()),
            ..Default::default()
        }];

        let text = render_entries(&query, &entries);
        assert!(text.contains("## Log entries for `proj`"));
        assert!(text.contains("| 2024-01-01T00:00:00Z | ERROR | - | disk full |"));
        assert!(text.contains("1 entries"));

        assert!(render_entries(&query, &[]).contains("No log entries matched."));
    }
}
