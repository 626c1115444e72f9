//! Trace Tools
//!
//! Tools for reading Cloud Trace traces.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::{clamp_limit, into_tool_result, parse_args, TimeWindowArgs};
use crate::gcp::trace::{ListTracesQuery, Trace};
use crate::mcp::context::ToolContext;
use crate::mcp::format::{markdown_table, or_dash};
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

/// Register trace tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(get_trace_tool());
    registry.register_tool(list_traces_tool());
}

// ============================================================================
// trace.get_trace
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetTraceParams {
    #[serde(default)]
    project_id: Option<String>,
    trace_id: String,
}

fn get_trace_tool() -> RegisteredTool {
    ToolBuilder::new("trace.get_trace")
        .description("Show a trace as a span tree with durations")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project (defaults to the current project)"
                },
                "trace_id": {
                    "type": "string",
                    "description": "32-character hex trace id"
                }
            },
            "required": ["trace_id"]
        }))
        .build(get_trace_handler)
}

async fn get_trace_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: GetTraceParams = parse_args(params)?;
    let trace_id = params.trace_id.trim();
    if trace_id.is_empty() {
        return Err(McpError::InvalidParams("trace_id must not be empty".to_string()));
    }

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let trace = ctx.cloud().await?.get_trace(&project_id, trace_id).await?;
            Ok(ToolsCallResult::text(render_trace(&trace)))
        }
        .await,
    )
}

pub(crate) fn render_trace(trace: &Trace) -> String {
    let mut out = format!("## Trace `{}`\n\n", trace.trace_id);
    if let Some(root) = trace.root_span() {
        out.push_str(&format!("Root span: {}\n", root.name));
        if let Some(ms) = root.duration_ms() {
            out.push_str(&format!("Duration: {:.3} ms\n", ms));
        }
    }
    out.push_str(&format!("Spans: {}\n\n", trace.spans.len()));

    if trace.spans.is_empty() {
        return out;
    }

    let rows: Vec<Vec<String>> = trace
        .span_tree()
        .into_iter()
        .map(|(depth, span)| {
            vec![
                format!("{}{}", "  ".repeat(depth), span.name),
                span.span_id.clone(),
                or_dash(span.kind.as_deref()).to_string(),
                or_dash(span.start_time.as_deref()).to_string(),
                span.duration_ms()
                    .map(|ms| format!("{:.3}", ms))
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    out.push_str(&markdown_table(
        &["Span", "Span id", "Kind", "Start", "Duration (ms)"],
        &rows,
    ));
    out
}

// ============================================================================
// trace.list_traces
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListTracesParams {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(flatten)]
    window: TimeWindowArgs,
}

fn list_traces_tool() -> RegisteredTool {
    ToolBuilder::new("trace.list_traces")
        .description("List recent traces, newest first")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project (defaults to the current project)"
                },
                "filter": {
                    "type": "string",
                    "description": "Trace filter, e.g. root:/api latency:500ms"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum traces to return (default 20)",
                    "minimum": 1,
                    "maximum": MAX_LIMIT
                },
                "hours": { "type": "number", "description": "Look back this many hours (default 1)" },
                "start_time": { "type": "string", "description": "RFC 3339 start of the window" },
                "end_time": { "type": "string", "description": "RFC 3339 end of the window" }
            }
        }))
        .build(list_traces_handler)
}

async fn list_traces_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ListTracesParams = parse_args(params)?;
    let window = params.window.resolve(Some(1.0), Utc::now())?;

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let query = ListTracesQuery {
                project_id,
                filter: params.filter.clone(),
                start_time: window.start,
                end_time: window.end,
                page_size: clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT),
            };
            let traces = ctx.cloud().await?.list_traces(&query).await?;
            Ok(ToolsCallResult::text(render_trace_list(
                &query.project_id,
                &traces,
            )))
        }
        .await,
    )
}

fn render_trace_list(project_id: &str, traces: &[Trace]) -> String {
    let mut out = format!("## Traces in `{}`\n\n", project_id);
    if traces.is_empty() {
        out.push_str("No traces found.\n");
        return out;
    }
    let rows: Vec<Vec<String>> = traces
        .iter()
        .map(|t| {
            let root = t.root_span();
            vec![
                t.trace_id.clone(),
                root.map(|s| s.name.clone()).unwrap_or_else(|| "-".to_string()),
                root.and_then(|s| s.start_time.clone())
                    .unwrap_or_else(|| "-".to_string()),
                root.and_then(|s| s.duration_ms())
                    .map(|ms| format!("{:.3}", ms))
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    out.push_str(&markdown_table(
        &["Trace id", "Root span", "Start", "Duration (ms)"],
        &rows,
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::trace::TraceSpan;

    fn sample_trace() -> Trace {
        Trace {
            project_id: "proj".to_string(),
            trace_id: "abc123".to_string(),
            spans: vec![
                TraceSpan {
                    span_id: "1".to_string(),
                    name: "/api/orders".to_string(),
                    start_time: Some("2024-01-01T00:00:00Z".to_string()),
                    end_time: Some("2024-01-01T00:00:00.120Z".to_string()),
                    ..Default::default()
                },
                TraceSpan {
                    span_id: "2".to_string(),
                    parent_span_id: Some("1".to_string()),
                    name: "spanner.query".to_string(),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_render_trace() {
        let text = render_trace(&sample_trace());
        assert!(text.contains("## Trace `abc123`"));
        assert!(text.contains("Root span: /api/orders"));
        assert!(text.contains("Duration: 120.000 ms"));
        assert!(text.contains("|   spanner.query | 2 |"));
    }

    #[test]
    fn test_render_trace_list() {
        let text = render_trace_list("proj", &[sample_trace()]);
        assert!(text.contains("| abc123 | /api/orders | 2024-01-01T00:00:00Z | 120.000 |"));
        assert!(render_trace_list("proj", &[]).contains("No traces found."));
    }
}
