//! Cloud Monitoring request building and response models.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::MonitoredResource;

#[derive(Debug, Clone)]
pub struct TimeSeriesQuery {
    pub project_id: String,
    pub filter: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub alignment_period_secs: Option<u64>,
    pub per_series_aligner: Option<String>,
    pub page_size: u32,
}

impl TimeSeriesQuery {
    /// Query string parameters for `projects.timeSeries.list`.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("filter", self.filter.clone()),
            (
                "interval.startTime",
                self.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "interval.endTime",
                self.end_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(period) = self.alignment_period_secs {
            params.push(("aggregation.alignmentPeriod", format!("{}s", period)));
            params.push((
                "aggregation.perSeriesAligner",
                self.per_series_aligner
                    .clone()
                    .unwrap_or_else(|| "ALIGN_MEAN".to_string()),
            ));
        }
        params
    }
}

/// Turns a bare metric type into a `metric.type` filter; full filters pass through.
pub fn metric_filter(metric_or_filter: &str) -> String {
    let trimmed = metric_or_filter.trim();
    if trimmed.contains('=') {
        trimmed.to_string()
    } else {
        format!("metric.type=\"{}\"", trimmed)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTimeSeriesResponse {
    #[serde(default)]
    pub time_series: Vec<TimeSeries>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub resource: MonitoredResource,
    #[serde(default)]
    pub metric_kind: Option<String>,
    #[serde(default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "type", default)]
    pub metric_type: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub interval: TimeInterval,
    #[serde(default)]
    pub value: TypedValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    #[serde(default)]
    pub double_value: Option<f64>,
    /// int64 values are JSON strings in the REST API
    #[serde(default)]
    pub int64_value: Option<String>,
    #[serde(default)]
    pub bool_value: Option<bool>,
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub distribution_value: Option<Value>,
}

impl std::fmt::Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(v) = self.double_value {
            write!(f, "{}", v)
        } else if let Some(v) = &self.int64_value {
            write!(f, "{}", v)
        } else if let Some(v) = self.bool_value {
            write!(f, "{}", v)
        } else if let Some(v) = &self.string_value {
            write!(f, "{}", v)
        } else if let Some(v) = &self.distribution_value {
            let count = v.get("count").and_then(Value::as_str).unwrap_or("0");
            let mean = v.get("mean").and_then(Value::as_f64).unwrap_or(0.0);
            write!(f, "distribution(count={}, mean={})", count, mean)
        } else {
            write!(f, "-")
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetricDescriptorsResponse {
    #[serde(default)]
    pub metric_descriptors: Vec<MetricDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDescriptor {
    #[serde(rename = "type", default)]
    pub metric_type: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metric_kind: Option<String>,
    #[serde(default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}
