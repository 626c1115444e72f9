use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use super::iam::{GetIamPolicyBody, IamPolicy, TestPermissionsBody, TestPermissionsResponse};
use super::logging::{ListLogEntriesResponse, LogEntry, LogQuery};
use super::monitoring::{
    ListMetricDescriptorsResponse, ListTimeSeriesResponse, MetricDescriptor, TimeSeries,
    TimeSeriesQuery,
};
use super::spanner::{
    DatabasePath, ExecuteSqlBody, ListDatabasesResponse, ListInstancesResponse, ResultSet,
    SpannerDatabase, SpannerInstance, SpannerSession,
};
use super::trace::{ListTracesQuery, ListTracesResponse, Trace};
use crate::auth::AuthResolver;
use crate::error::ServiceError;

/// Operations the MCP handlers need from Google Cloud.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn list_log_entries(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ServiceError>;

    async fn list_time_series(
        &self,
        query: &TimeSeriesQuery,
    ) -> Result<Vec<TimeSeries>, ServiceError>;

    async fn list_metric_descriptors(
        &self,
        project_id: &str,
        filter: Option<&str>,
        page_size: u32,
    ) -> Result<Vec<MetricDescriptor>, ServiceError>;

    async fn list_spanner_instances(
        &self,
        project_id: &str,
    ) -> Result<Vec<SpannerInstance>, ServiceError>;

    async fn list_spanner_databases(
        &self,
        project_id: &str,
        instance: &str,
    ) -> Result<Vec<SpannerDatabase>, ServiceError>;

    /// Runs an already validated read-only statement.
    async fn execute_sql(&self, database: &DatabasePath, sql: &str)
        -> Result<ResultSet, ServiceError>;

    async fn get_iam_policy(&self, project_id: &str) -> Result<IamPolicy, ServiceError>;

    /// Returns the subset of `permissions` the caller holds on the project.
    async fn test_iam_permissions(
        &self,
        project_id: &str,
        permissions: &[String],
    ) -> Result<Vec<String>, ServiceError>;

    async fn get_trace(&self, project_id: &str, trace_id: &str) -> Result<Trace, ServiceError>;

    async fn list_traces(&self, query: &ListTracesQuery) -> Result<Vec<Trace>, ServiceError>;
}

/// Base URLs of the REST APIs, overridable for tests.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub logging: String,
    pub monitoring: String,
    pub spanner: String,
    pub resource_manager: String,
    pub trace: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            logging: "https://logging.googleapis.com/v2".to_string(),
            monitoring: "https://monitoring.googleapis.com/v3".to_string(),
            spanner: "https://spanner.googleapis.com/v1".to_string(),
            resource_manager: "https://cloudresourcemanager.googleapis.com/v1".to_string(),
            trace: "https://cloudtrace.googleapis.com/v1".to_string(),
        }
    }
}

impl ApiEndpoints {
    /// Points every API at the same base URL.
    pub fn all(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            logging: base_url.clone(),
            monitoring: base_url.clone(),
            spanner: base_url.clone(),
            resource_manager: base_url.clone(),
            trace: base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Extracts the provider's error message, falling back to the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(status) => format!("{} ({})", parsed.error.message, status),
            None => parsed.error.message,
        },
        Err(_) if body.trim().is_empty() => "empty response".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Checks an id before it becomes a URL path segment.
///
/// Project, instance, database and trace ids only use `[A-Za-z0-9._:-]`;
/// anything else (`/`, `?`, `#`, `..`) would change the endpoint being called.
fn path_segment<'a>(kind: &str, value: &'a str) -> Result<&'a str, ServiceError> {
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'));
    if value.is_empty() || value == "." || value == ".." || !valid_chars {
        return Err(ServiceError::InvalidArgument(format!(
            "Invalid {}: {:?}",
            kind, value
        )));
    }
    Ok(value)
}

fn database_name(database: &DatabasePath) -> Result<String, ServiceError> {
    path_segment("project id", &database.project_id)?;
    path_segment("instance id", &database.instance)?;
    path_segment("database id", &database.database)?;
    Ok(database.resource_name())
}

/// [`CloudApi`] over the public REST endpoints.
pub struct RestCloudApi {
    client: reqwest::Client,
    auth: Arc<AuthResolver>,
    endpoints: ApiEndpoints,
}

impl RestCloudApi {
    pub fn new(client: reqwest::Client, auth: Arc<AuthResolver>, endpoints: ApiEndpoints) -> Self {
        let endpoints = ApiEndpoints {
            logging: endpoints.logging.trim_end_matches('/').to_string(),
            monitoring: endpoints.monitoring.trim_end_matches('/').to_string(),
            spanner: endpoints.spanner.trim_end_matches('/').to_string(),
            resource_manager: endpoints.resource_manager.trim_end_matches('/').to_string(),
            trace: endpoints.trace.trim_end_matches('/').to_string(),
        };
        Self {
            client,
            auth,
            endpoints,
        }
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, ServiceError> {
        let token = self.auth.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            warn!("Google Cloud API {} failed with {}: {}", url, status, message);
            return Err(ServiceError::from_http_status(status.as_u16(), message));
        }

        debug!("Google Cloud API {} -> {}", url, status);
        let body = response.text().await?;
        if body.trim().is_empty() {
            return serde_json::from_str("{}")
                .map_err(|e| ServiceError::Internal(format!("Failed to parse response: {}", e)));
        }
        serde_json::from_str(&body)
            .map_err(|e| ServiceError::Internal(format!("Failed to parse response: {}", e)))
    }

    async fn create_spanner_session(
        &self,
        database: &DatabasePath,
    ) -> Result<SpannerSession, ServiceError> {
        let url = format!(
            "{}/{}/sessions",
            self.endpoints.spanner,
            database_name(database)?
        );
        let request = self.request(Method::POST, &url).await?.json(&json!({}));
        self.send(request).await
    }

    async fn delete_spanner_session(&self, session: &SpannerSession) {
        let url = format!("{}/{}", self.endpoints.spanner, session.name);
        let result = match self.request(Method::DELETE, &url).await {
            Ok(request) => self.send::<serde_json::Value>(request).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to delete Spanner session {}: {}", session.name, e);
        }
    }
}

#[async_trait]
impl CloudApi for RestCloudApi {
    async fn list_log_entries(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ServiceError> {
        path_segment("project id", &query.project_id)?;
        let url = format!("{}/entries:list", self.endpoints.logging);
        let request = self
            .request(Method::POST, &url)
            .await?
            .json(&query.to_request());
        let response: ListLogEntriesResponse = self.send(request).await?;
        Ok(response.entries)
    }

    async fn list_time_series(
        &self,
        query: &TimeSeriesQuery,
    ) -> Result<Vec<TimeSeries>, ServiceError> {
        let url = format!(
            "{}/projects/{}/timeSeries",
            self.endpoints.monitoring,
            path_segment("project id", &query.project_id)?
        );
        let request = self
            .request(Method::GET, &url)
            .await?
            .query(&query.query_params());
        let response: ListTimeSeriesResponse = self.send(request).await?;
        Ok(response.time_series)
    }

    async fn list_metric_descriptors(
        &self,
        project_id: &str,
        filter: Option<&str>,
        page_size: u32,
    ) -> Result<Vec<MetricDescriptor>, ServiceError> {
        let url = format!(
            "{}/projects/{}/metricDescriptors",
            self.endpoints.monitoring,
            path_segment("project id", project_id)?
        );
        let mut params = vec![("pageSize", page_size.to_string())];
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            params.push(("filter", filter.to_string()));
        }
        let request = self.request(Method::GET, &url).await?.query(&params);
        let response: ListMetricDescriptorsResponse = self.send(request).await?;
        Ok(response.metric_descriptors)
    }

    async fn list_spanner_instances(
        &self,
        project_id: &str,
    ) -> Result<Vec<SpannerInstance>, ServiceError> {
        let url = format!(
            "{}/projects/{}/instances",
            self.endpoints.spanner,
            path_segment("project id", project_id)?
        );
        let request = self.request(Method::GET, &url).await?;
        let response: ListInstancesResponse = self.send(request).await?;
        Ok(response.instances)
    }

    async fn list_spanner_databases(
        &self,
        project_id: &str,
        instance: &str,
    ) -> Result<Vec<SpannerDatabase>, ServiceError> {
        let url = format!(
            "{}/projects/{}/instances/{}/databases",
            self.endpoints.spanner,
            path_segment("project id", project_id)?,
            path_segment("instance id", instance)?
        );
        let request = self.request(Method::GET, &url).await?;
        let response: ListDatabasesResponse = self.send(request).await?;
        Ok(response.databases)
    }

    async fn execute_sql(
        &self,
        database: &DatabasePath,
        sql: &str,
    ) -> Result<ResultSet, ServiceError> {
        let session = self.create_spanner_session(database).await?;
        let url = format!("{}/{}:executeSql", self.endpoints.spanner, session.name);

        let result = match self.request(Method::POST, &url).await {
            Ok(request) => {
                self.send::<ResultSet>(request.json(&ExecuteSqlBody { sql }))
                    .await
            }
            Err(e) => Err(e),
        };

        self.delete_spanner_session(&session).await;
        result
    }

    async fn get_iam_policy(&self, project_id: &str) -> Result<IamPolicy, ServiceError> {
        let url = format!(
            "{}/projects/{}:getIamPolicy",
            self.endpoints.resource_manager,
            path_segment("project id", project_id)?
        );
        let request = self
            .request(Method::POST, &url)
            .await?
            .json(&GetIamPolicyBody::default());
        self.send(request).await
    }

    async fn test_iam_permissions(
        &self,
        project_id: &str,
        permissions: &[String],
    ) -> Result<Vec<String>, ServiceError> {
        let url = format!(
            "{}/projects/{}:testIamPermissions",
            self.endpoints.resource_manager,
            path_segment("project id", project_id)?
        );
        let request = self
            .request(Method::POST, &url)
            .await?
            .json(&TestPermissionsBody { permissions });
        let response: TestPermissionsResponse = self.send(request).await?;
        Ok(response.permissions)
    }

    async fn get_trace(&self, project_id: &str, trace_id: &str) -> Result<Trace, ServiceError> {
        let url = format!(
            "{}/projects/{}/traces/{}",
            self.endpoints.trace,
            path_segment("project id", project_id)?,
            path_segment("trace id", trace_id)?
        );
        let request = self.request(Method::GET, &url).await?;
        self.send(request).await
    }

    async fn list_traces(&self, query: &ListTracesQuery) -> Result<Vec<Trace>, ServiceError> {
        let url = format!(
            "{}/projects/{}/traces",
            self.endpoints.trace,
            path_segment("project id", &query.project_id)?
        );
        let request = self
            .request(Method::GET, &url)
            .await?
            .query(&query.query_params());
        let response: ListTracesResponse = self.send(request).await?;
        Ok(response.traces)
    }
}
