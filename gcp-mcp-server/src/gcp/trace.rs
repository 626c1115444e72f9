//! Cloud Trace request building and response models.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ListTracesQuery {
    pub project_id: String,
    pub filter: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub page_size: u32,
}

impl ListTracesQuery {
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("pageSize", self.page_size.to_string()),
            ("view", "ROOTSPAN".to_string()),
            ("orderBy", "start desc".to_string()),
        ];
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.trim().is_empty()) {
            params.push(("filter", filter.clone()));
        }
        if let Some(start) = self.start_time {
            params.push((
                "startTime",
                start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        if let Some(end) = self.end_time {
            params.push(("endTime", end.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        params
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTracesResponse {
    #[serde(default)]
    pub traces: Vec<Trace>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub spans: Vec<TraceSpan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSpan {
    /// uint64 encoded as a string
    #[serde(default)]
    pub span_id: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl TraceSpan {
    pub fn duration_ms(&self) -> Option<f64> {
        let start = DateTime::parse_from_rfc3339(self.start_time.as_deref()?).ok()?;
        let end = DateTime::parse_from_rfc3339(self.end_time.as_deref()?).ok()?;
        let micros = (end - start).num_microseconds()?;
        Some(micros as f64 / 1000.0)
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id
            .as_deref()
            .map_or(true, |p| p.is_empty() || p == "0")
    }
}

impl Trace {
    pub fn root_span(&self) -> Option<&TraceSpan> {
        self.spans.iter().find(|s| s.is_root())
    }

    /// Spans ordered depth-first from the roots, each paired with its depth.
    pub fn span_tree(&self) -> Vec<(usize, &TraceSpan)> {
        let mut children: HashMap<&str, Vec<&TraceSpan>> = HashMap::new();
        let mut roots = Vec::new();
        for span in &self.spans {
            match span.parent_span_id.as_deref() {
                Some(parent)
                    if !span.is_root() && self.spans.iter().any(|s| s.span_id == parent) =>
                {
                    children.entry(parent).or_default().push(span)
                }
                _ => roots.push(span),
            }
        }

        let mut ordered = Vec::with_capacity(self.spans.len());
        let mut stack: Vec<(usize, &TraceSpan)> = roots.into_iter().rev().map(|s| (0, s)).collect();
        while let Some((depth, span)) = stack.pop() {
            ordered.push((depth, span));
            if let Some(kids) = children.get(span.span_id.as_str()) {
                stack.extend(kids.iter().rev().map(|k| (depth + 1, *k)));
            }
        }
        ordered
    }
}
