//! MCP Tools
//!
//! Tool implementations for Logging, Monitoring, Spanner, IAM, Trace and the
//! current project.

pub mod iam;
pub mod logging;
pub mod monitoring;
pub mod project;
pub mod spanner;
pub mod trace;

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::protocol::{McpError, ToolsCallResult};
use super::registry::{McpRegistry, ToolResult};
use crate::error::ServiceError;

/// Register all tools with the registry
pub fn register_all_tools(registry: &mut McpRegistry) {
    logging::register_tools(registry);
    monitoring::register_tools(registry);
    spanner::register_tools(registry);
    iam::register_tools(registry);
    trace::register_tools(registry);
    project::register_tools(registry);
}

pub(crate) fn parse_args<T: DeserializeOwned>(params: Value) -> Result<T, McpError> {
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

/// Provider and project-resolution failures are returned in-band.
pub(crate) fn into_tool_result(result: Result<ToolsCallResult, ServiceError>) -> ToolResult {
    Ok(result.unwrap_or_else(|e| ToolsCallResult::service_error(&e)))
}

/// Optional time window: explicit RFC 3339 bounds, or a lookback in hours.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TimeWindowArgs {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub hours: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindowArgs {
    /// Resolves the window against `now`; `default_hours` applies when no
    /// start is given.
    pub fn resolve(
        &self,
        default_hours: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<TimeWindow, McpError> {
        let end = self
            .end_time
            .as_deref()
            .map(|s| parse_timestamp("end_time", s))
            .transpose()?;

        let start = match (&self.start_time, self.hours.or(default_hours)) {
            (Some(start), _) => Some(parse_timestamp("start_time", start)?),
            (None, Some(hours)) => {
                if !hours.is_finite() || hours <= 0.0 {
                    return Err(McpError::InvalidParams(
                        "hours must be a positive number".to_string(),
                    ));
                }
                let millis = (hours * 3_600_000.0) as i64;
                let lookback = TimeDelta::try_milliseconds(millis).ok_or_else(|| {
                    McpError::InvalidParams("hours is out of range".to_string())
                })?;
                Some(end.unwrap_or(now) - lookback)
            }
            (None, None) => None,
        };

        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(McpError::InvalidParams(
                    "start_time must be before end_time".to_string(),
                ));
            }
        }

        Ok(TimeWindow { start, end })
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, McpError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            McpError::InvalidParams(format!("{} must be an RFC 3339 timestamp: {}", field, e))
        })
}

/// Clamps a caller-supplied limit into `1..=max`.
pub(crate) fn clamp_limit(limit: Option<u32>, default: u32, max: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, max)
}
