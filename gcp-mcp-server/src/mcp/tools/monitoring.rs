//! Monitoring Tools
//!
//! Tools for reading Cloud Monitoring time series and metric descriptors.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{clamp_limit, into_tool_result, parse_args, TimeWindowArgs};
use crate::gcp::monitoring::{metric_filter, MetricDescriptor, TimeSeries, TimeSeriesQuery};
use crate::mcp::context::ToolContext;
use crate::mcp::format::{markdown_table, or_dash, truncate};
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const DEFAULT_SERIES_LIMIT: u32 = 20;
const MAX_SERIES_LIMIT: u32 = 500;
const MAX_POINTS_PER_SERIES: usize = 20;
const DEFAULT_DESCRIPTOR_LIMIT: u32 = 100;
const MAX_DESCRIPTOR_LIMIT: u32 = 1000;

/// Register monitoring tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(query_metrics_tool());
    registry.register_tool(list_metric_types_tool());
}

// ============================================================================
// monitoring.query_metrics
// ============================================================================

#[derive(Debug, Deserialize)]
struct QueryMetricsParams {
    #[serde(default)]
    project_id: Option<String>,
    /// Metric type or a full Monitoring filter
    metric: String,
    #[serde(default)]
    alignment_period_secs: Option<u64>,
    #[serde(default)]
    aligner: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(flatten)]
    window: TimeWindowArgs,
}

fn query_metrics_tool() -> RegisteredTool {
    ToolBuilder::new("monitoring.query_metrics")
        .description("Read time series for a metric type or Monitoring filter over a time window")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project to query (defaults to the current project)"
                },
                "metric": {
                    "type": "string",
                    "description": "Metric type (e.g. compute.googleapis.com/instance/cpu/utilization) or a full filter"
                },
                "alignment_period_secs": {
                    "type": "integer",
                    "description": "Align points into buckets of this many seconds",
                    "minimum": 60
                },
                "aligner": {
                    "type": "string",
                    "description": "Per-series aligner (default ALIGN_MEAN), e.g. ALIGN_MAX, ALIGN_RATE"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum time series to return (default 20)",
                    "minimum": 1,
                    "maximum": MAX_SERIES_LIMIT
                },
                "hours": { "type": "number", "description": "Look back this many hours (default 1)" },
                "start_time": { "type": "string", "description": "RFC 3339 start of the window" },
                "end_time": { "type": "string", "description": "RFC 3339 end of the window" }
            },
            "required": ["metric"]
        }))
        .build(query_metrics_handler)
}

async fn query_metrics_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: QueryMetricsParams = parse_args(params)?;

    if params.metric.trim().is_empty() {
        return Err(McpError::InvalidParams("metric must not be empty".to_string()));
    }
    if matches!(params.alignment_period_secs, Some(p) if p < 60) {
        return Err(McpError::InvalidParams(
            "alignment_period_secs must be at least 60".to_string(),
        ));
    }
    let now = Utc::now();
    let window = params.window.resolve(Some(1.0), now)?;
    let start_time = window.start.unwrap_or(now);
    let end_time = window.end.unwrap_or(now);
    if start_time >= end_time {
        return Err(McpError::InvalidParams(
            "start_time must be before end_time".to_string(),
        ));
    }

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let query = TimeSeriesQuery {
                project_id,
                filter: metric_filter(&params.metric),
                start_time,
                end_time,
                alignment_period_secs: params.alignment_period_secs,
                per_series_aligner: params.aligner.clone(),
                page_size: clamp_limit(params.limit, DEFAULT_SERIES_LIMIT, MAX_SERIES_LIMIT),
            };
            let series = ctx.cloud().await?.list_time_series(&query).await?;
            Ok(ToolsCallResult::text(render_time_series(&query, &series)))
        }
        .await,
    )
}

fn render_time_series(query: &TimeSeriesQuery, series: &[TimeSeries]) -> String {
    let mut out = format!(
        "## Time series for `{}`\n\nFilter: `{}`\nWindow: {} to {}\n\n",
        query.project_id,
        query.filter,
        query.start_time.to_rfc3339(),
        query.end_time.to_rfc3339()
    );

    if series.is_empty() {
        out.push_str("No time series matched.\n");
        return out;
    }

    for ts in series {
        out.push_str(&format!("### {}\n\n", ts.metric.metric_type));
        let labels = format_labels(&ts.metric.labels);
        if !labels.is_empty() {
            out.push_str(&format!("Metric labels: {}\n", labels));
        }
        out.push_str(&format!(
            "Resource: {} {}\n",
            or_dash(Some(ts.resource.resource_type.as_str())),
            format_labels(&ts.resource.labels)
        ));
        out.push_str(&format!(
            "Kind: {} / {}\n\n",
            or_dash(ts.metric_kind.as_deref()),
            or_dash(ts.value_type.as_deref())
        ));

        let rows: Vec<Vec<String>> = ts
            .points
            .iter()
            .take(MAX_POINTS_PER_SERIES)
            .map(|p| {
                vec![
                    or_dash(p.interval.end_time.as_deref()).to_string(),
                    p.value.to_string(),
                ]
            })
            .collect();
        out.push_str(&markdown_table(&["End time", "Value"], &rows));
        if ts.points.len() > MAX_POINTS_PER_SERIES {
            out.push_str(&format!(
                "\n{} more points not shown\n",
                ts.points.len() - MAX_POINTS_PER_SERIES
            ));
        }
        out.push('\n');
    }
    out.push_str(&format!("{} time series\n", series.len()));
    out
}

fn format_labels(labels: &std::collections::HashMap<String, String>) -> String {
    let sorted: BTreeMap<&String, &String> = labels.iter().collect();
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// monitoring.list_metric_types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListMetricTypesParams {
    #[serde(default)]
    project_id: Option<String>,
    /// Metric type prefix, e.g. `compute.googleapis.com/`
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

fn list_metric_types_tool() -> RegisteredTool {
    ToolBuilder::new("monitoring.list_metric_types")
        .description("List available metric types, optionally restricted to a type prefix")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project to list (defaults to the current project)"
                },
                "prefix": {
                    "type": "string",
                    "description": "Only metric types starting with this prefix, e.g. spanner.googleapis.com/"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum descriptors to return (default 100)",
                    "minimum": 1,
                    "maximum": MAX_DESCRIPTOR_LIMIT
                }
            }
        }))
        .build(list_metric_types_handler)
}

async fn list_metric_types_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ListMetricTypesParams = parse_args(params)?;
    let filter = params
        .prefix
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("metric.type = starts_with(\"{}\")", p.replace('"', "")));

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let descriptors = ctx
                .cloud()
                .await?
                .list_metric_descriptors(
                    &project_id,
                    filter.as_deref(),
                    clamp_limit(params.limit, DEFAULT_DESCRIPTOR_LIMIT, MAX_DESCRIPTOR_LIMIT),
                )
                .await?;
            Ok(ToolsCallResult::text(render_descriptors(
                &project_id,
                &descriptors,
            )))
        }
        .await,
    )
}

fn render_descriptors(project_id: &str, descriptors: &[MetricDescriptor]) -> String {
    let mut out = format!("## Metric types in `{}`\n\n", project_id);
    if descriptors.is_empty() {
        out.push_str("No metric types matched.\n");
        return out;
    }
    let rows: Vec<Vec<String>> = descriptors
        .iter()
        .map(|d| {
            vec![
                d.metric_type.clone(),
                or_dash(d.metric_kind.as_deref()).to_string(),
                or_dash(d.value_type.as_deref()).to_string(),
                or_dash(d.unit.as_deref()).to_string(),
                truncate(or_dash(d.description.as_deref()), 120),
            ]
        })
        .collect();
    out.push_str(&markdown_table(
        &["Type", "Kind", "Value type", "Unit", "Description"],
        &rows,
    ));
    out
}
