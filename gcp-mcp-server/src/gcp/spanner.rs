//! Cloud Spanner request building and response models.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::ServiceError;

/// Lists user tables in a database, used by the schema tool and resource.
pub const LIST_TABLES_SQL: &str = "SELECT t.table_name, c.column_name, c.spanner_type, c.is_nullable \
     FROM information_schema.tables AS t \
     JOIN information_schema.columns AS c ON t.table_name = c.table_name \
     WHERE t.table_catalog = '' AND t.table_schema = '' \
     ORDER BY t.table_name, c.ordinal_position";

#[derive(Debug, Clone)]
pub struct DatabasePath {
    pub project_id: String,
    pub instance: String,
    pub database: String,
}

impl DatabasePath {
    pub fn new(
        project_id: impl Into<String>,
        instance: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            instance: instance.into(),
            database: database.into(),
        }
    }

    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project_id, self.instance, self.database
        )
    }
}

fn read_only_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*(select|with)\b").expect("read-only SQL regex is valid")
    })
}

/// Accepts a single `SELECT`/`WITH` statement; DML and DDL are rejected.
pub fn validate_read_only_sql(sql: &str) -> Result<&str, ServiceError> {
    let statement = sql.trim().trim_end_matches(';').trim_end();
    if statement.is_empty() {
        return Err(ServiceError::InvalidArgument("SQL query is empty".to_string()));
    }
    if statement.contains(';') {
        return Err(ServiceError::InvalidArgument(
            "Only a single SQL statement is allowed".to_string(),
        ));
    }
    if !read_only_regex().is_match(statement) {
        return Err(ServiceError::InvalidArgument(
            "Only read-only queries (SELECT/WITH) are allowed".to_string(),
        ));
    }
    Ok(statement)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListInstancesResponse {
    #[serde(default)]
    pub instances: Vec<SpannerInstance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpannerInstance {
    pub name: String,
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub node_count: Option<u32>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDatabasesResponse {
    #[serde(default)]
    pub databases: Vec<SpannerDatabase>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpannerDatabase {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Last path segment of a resource name (`projects/p/instances/i` -> `i`).
pub fn short_name(resource_name: &str) -> &str {
    resource_name.rsplit('/').next().unwrap_or(resource_name)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpannerSession {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteSqlBody<'a> {
    pub sql: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    #[serde(default)]
    pub metadata: ResultSetMetadata,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetadata {
    #[serde(default)]
    pub row_type: StructType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructType {
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: String,
}

impl ResultSet {
    pub fn column_names(&self) -> Vec<String> {
        self.metadata
            .row_type
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if f.name.is_empty() {
                    format!("column_{}", i)
                } else {
                    f.name.clone()
                }
            })
            .collect()
    }
}

/// Renders a Spanner cell; strings come back unquoted, NULL as `NULL`.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
