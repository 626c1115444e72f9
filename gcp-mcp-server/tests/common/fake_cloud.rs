//! In-memory `CloudApi` for end-to-end tests
//!
//! Serves fixed data and records which project each call targeted, so tests
//! can check project resolution without touching Google Cloud.

use super::constants::*;
use async_trait::async_trait;
use gcp_mcp_server::gcp::iam::{Binding, IamPolicy};
use gcp_mcp_server::gcp::logging::{LogEntry, LogQuery};
use gcp_mcp_server::gcp::monitoring::{
    Metric, MetricDescriptor, Point, TimeInterval, TimeSeries, TimeSeriesQuery, TypedValue,
};
use gcp_mcp_server::gcp::spanner::{
    DatabasePath, Field, ResultSet, ResultSetMetadata, SpannerDatabase, SpannerInstance,
    StructType, LIST_TABLES_SQL,
};
use gcp_mcp_server::gcp::trace::{ListTracesQuery, Trace, TraceSpan};
use gcp_mcp_server::gcp::{CloudApi, MonitoredResource};
use gcp_mcp_server::ServiceError;
use serde_json::{json, Value};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeCloud {
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeCloud {
    fn record(&self, operation: &str, project_id: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), project_id.to_string()));
    }

    /// `(operation, project_id)` pairs in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Project targeted by the most recent call
    pub fn last_project(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|(_, p)| p.clone())
    }
}

fn result_set(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
    ResultSet {
        metadata: ResultSetMetadata {
            row_type: StructType {
                fields: columns
                    .iter()
                    .map(|name| Field {
                        name: name.to_string(),
                    })
                    .collect(),
            },
        },
        rows,
    }
}

fn fake_trace(project_id: &str) -> Trace {
    Trace {
        project_id: project_id.to_string(),
        trace_id: FAKE_TRACE_ID.to_string(),
        spans: vec![
            TraceSpan {
                span_id: "100".to_string(),
                kind: Some("RPC_SERVER".to_string()),
                name: "/api/checkout".to_string(),
                start_time: Some("2024-05-01T10:00:00Z".to_string()),
                end_time: Some("2024-05-01T10:00:00.250Z".to_string()),
                ..Default::default()
            },
            TraceSpan {
                span_id: "101".to_string(),
                kind: Some("RPC_CLIENT".to_string()),
                name: "spanner.ExecuteSql".to_string(),
                start_time: Some("2024-05-01T10:00:00.010Z".to_string()),
                end_time: Some("2024-05-01T10:00:00.090Z".to_string()),
                parent_span_id: Some("100".to_string()),
                ..Default::default()
            },
        ],
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn list_log_entries(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ServiceError> {
        self.record("list_log_entries", &query.project_id);
        Ok(vec![
            LogEntry {
                timestamp: Some("2024-05-01T10:00:01Z".to_string()),
                severity: Some("INFO".to_string()),
                resource: Some(MonitoredResource {
                    resource_type: "cloud_run_revision".to_string(),
                    ..Default::default()
                }),
                text_payload: Some(FAKE_LOG_MESSAGE.to_string()),
                ..Default::default()
            },
            LogEntry {
                timestamp: Some("2024-05-01T10:00:00Z".to_string()),
                severity: Some("ERROR".to_string()),
                json_payload: Some(json!({"message": "payment declined"})),
                ..Default::default()
            },
        ])
    }

    async fn list_time_series(
        &self,
        query: &TimeSeriesQuery,
    ) -> Result<Vec<TimeSeries>, ServiceError> {
        self.record("list_time_series", &query.project_id);
        Ok(vec![TimeSeries {
            metric: Metric {
                metric_type: FAKE_METRIC_TYPE.to_string(),
                ..Default::default()
            },
            metric_kind: Some("GAUGE".to_string()),
            value_type: Some("DOUBLE".to_string()),
            points: vec![Point {
                interval: TimeInterval {
                    start_time: None,
                    end_time: Some("2024-05-01T10:00:00Z".to_string()),
                },
                value: TypedValue {
                    double_value: Some(0.42),
                    ..Default::default()
                },
            }],
            ..Default::default()
        }])
    }

    async fn list_metric_descriptors(
        &self,
        project_id: &str,
        _filter: Option<&str>,
        _page_size: u32,
    ) -> Result<Vec<MetricDescriptor>, ServiceError> {
        self.record("list_metric_descriptors", project_id);
        Ok(vec![MetricDescriptor {
            metric_type: FAKE_METRIC_TYPE.to_string(),
            display_name: Some("CPU utilization".to_string()),
            metric_kind: Some("GAUGE".to_string()),
            value_type: Some("DOUBLE".to_string()),
            ..Default::default()
        }])
    }

    async fn list_spanner_instances(
        &self,
        project_id: &str,
    ) -> Result<Vec<SpannerInstance>, ServiceError> {
        self.record("list_spanner_instances", project_id);
        Ok(vec![SpannerInstance {
            name: format!("projects/{}/instances/{}", project_id, FAKE_INSTANCE),
            display_name: Some("Main".to_string()),
            node_count: Some(1),
            state: Some("READY".to_string()),
            ..Default::default()
        }])
    }

    async fn list_spanner_databases(
        &self,
        project_id: &str,
        instance: &str,
    ) -> Result<Vec<SpannerDatabase>, ServiceError> {
        self.record("list_spanner_databases", project_id);
        if instance != FAKE_INSTANCE {
            return Err(ServiceError::NotFound(format!("Instance {} not found", instance)));
        }
        Ok(vec![SpannerDatabase {
            name: format!(
                "projects/{}/instances/{}/databases/{}",
                project_id, FAKE_INSTANCE, FAKE_DATABASE
            ),
            state: Some("READY".to_string()),
        }])
    }

    async fn execute_sql(
        &self,
        database: &DatabasePath,
        sql: &str,
    ) -> Result<ResultSet, ServiceError> {
        self.record("execute_sql", &database.project_id);
        if database.database != FAKE_DATABASE {
            return Err(ServiceError::NotFound(format!(
                "Database {} not found",
                database.database
            )));
        }
        if sql == LIST_TABLES_SQL {
            return Ok(result_set(
                &["table_name", "column_name", "spanner_type", "is_nullable"],
                vec![
                    vec![json!("Orders"), json!("OrderId"), json!("STRING(36)"), json!("NO")],
                    vec![json!("Orders"), json!("Total"), json!("FLOAT64"), json!("YES")],
                    vec![json!("Customers"), json!("CustomerId"), json!("STRING(36)"), json!("NO")],
                ],
            ));
        }
        Ok(result_set(
            &["OrderId", "Total"],
            vec![
                vec![json!("o-1"), json!(12.5)],
                vec![json!("o-2"), Value::Null],
            ],
        ))
    }

    async fn get_iam_policy(&self, project_id: &str) -> Result<IamPolicy, ServiceError> {
        self.record("get_iam_policy", project_id);
        Ok(IamPolicy {
            version: Some(3),
            bindings: vec![
                Binding {
                    role: "roles/viewer".to_string(),
                    members: vec![FAKE_MEMBER.to_string()],
                    condition: None,
                },
                Binding {
                    role: "roles/owner".to_string(),
                    members: vec!["user:bob@example.com".to_string()],
                    condition: None,
                },
            ],
            etag: Some("BwXhqDq3Gsw=".to_string()),
        })
    }

    async fn test_iam_permissions(
        &self,
        project_id: &str,
        permissions: &[String],
    ) -> Result<Vec<String>, ServiceError> {
        self.record("test_iam_permissions", project_id);
        Ok(permissions
            .iter()
            .filter(|p| p.starts_with(GRANTED_PERMISSION_PREFIX))
            .cloned()
            .collect())
    }

    async fn get_trace(&self, project_id: &str, trace_id: &str) -> Result<Trace, ServiceError> {
        self.record("get_trace", project_id);
        if trace_id != FAKE_TRACE_ID {
            return Err(ServiceError::NotFound(format!("Trace {} not found", trace_id)));
        }
        Ok(fake_trace(project_id))
    }

    async fn list_traces(&self, query: &ListTracesQuery) -> Result<Vec<Trace>, ServiceError> {
        self.record("list_traces", &query.project_id);
        Ok(vec![fake_trace(&query.project_id)])
    }
}
