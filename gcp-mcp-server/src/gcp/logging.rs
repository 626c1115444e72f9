//! Cloud Logging request building and response models.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::MonitoredResource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl LogOrder {
    pub fn as_order_by(&self) -> &'static str {
        match self {
            LogOrder::NewestFirst => "timestamp desc",
            LogOrder::OldestFirst => "timestamp asc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogQuery {
    pub project_id: String,
    pub filter: Option<String>,
    pub order: LogOrder,
    pub page_size: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl LogQuery {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            filter: None,
            order: LogOrder::default(),
            page_size: 50,
            start_time: None,
            end_time: None,
        }
    }

    /// The user filter AND-ed with the time window clauses.
    pub fn effective_filter(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(filter) = self.filter.as_deref().map(str::trim) {
            if !filter.is_empty() {
                clauses.push(format!("({})", filter));
            }
        }
        if let Some(start) = self.start_time {
            clauses.push(format!(
                "timestamp>=\"{}\"",
                start.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if let Some(end) = self.end_time {
            clauses.push(format!(
                "timestamp<=\"{}\"",
                end.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        clauses.join(" AND ")
    }

    pub fn to_request(&self) -> ListLogEntriesRequest {
        let filter = self.effective_filter();
        ListLogEntriesRequest {
            resource_names: vec![format!("projects/{}", self.project_id)],
            filter: (!filter.is_empty()).then_some(filter),
            order_by: self.order.as_order_by().to_string(),
            page_size: self.page_size,
        }
    }
}

/// Builds a free-text search filter with an optional minimum severity.
pub fn search_filter(text: &str, min_severity: Option<&str>) -> String {
    let mut clauses = Vec::new();
    let text = text.trim();
    if !text.is_empty() {
        clauses.push(format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\"")));
    }
    if let Some(severity) = min_severity {
        clauses.push(format!("severity>={}", severity.to_uppercase()));
    }
    clauses.join(" AND ")
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLogEntriesRequest {
    pub resource_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub order_by: String,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLogEntriesResponse {
    #[serde(default)]
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub log_name: Option<String>,
    #[serde(default)]
    pub resource: Option<MonitoredResource>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub insert_id: Option<String>,
    #[serde(default)]
    pub text_payload: Option<String>,
    #[serde(default)]
    pub json_payload: Option<Value>,
    #[serde(default)]
    pub proto_payload: Option<Value>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub trace: Option<String>,
}

impl LogEntry {
    /// One-line message for the entry, whatever payload kind it carries.
    pub fn message(&self) -> String {
        if let Some(text) = &self.text_payload {
            return text.clone();
        }
        if let Some(json) = &self.json_payload {
            if let Some(message) = json.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
            return json.to_string();
        }
        if let Some(proto) = &self.proto_payload {
            return proto.to_string();
        }
        String::new()
    }
}
