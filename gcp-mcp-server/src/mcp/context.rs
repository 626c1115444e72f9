//! MCP Tool Execution Context
//!
//! Provides access to server state for tool implementations.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthResolver;
use crate::config::Transport;
use crate::error::ServiceError;
use crate::gcp::CloudApi;
use crate::session::SessionRegistry;
use crate::state::ProjectState;

/// Context provided to tool and resource handlers during execution
#[derive(Clone)]
pub struct ToolContext {
    /// Process-wide current project and auth flag
    pub project_state: Arc<ProjectState>,

    /// Credential resolver
    pub auth: Arc<AuthResolver>,

    /// Google Cloud API client
    pub cloud: Arc<dyn CloudApi>,

    /// Session registry, for session introspection
    pub sessions: Arc<SessionRegistry>,

    /// Session the request arrived on, if any
    pub session_id: Option<String>,

    pub transport: Transport,

    /// Server version info
    pub server_version: String,

    /// Server start time (for uptime calculation)
    pub start_time: Instant,
}

impl ToolContext {
    /// Picks the project a call applies to: the explicit argument, then the
    /// current project, then the default discovered with the credentials.
    pub async fn resolve_project_id(&self, explicit: Option<&str>) -> Result<String, ServiceError> {
        if let Some(project_id) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
            return Ok(project_id.to_string());
        }
        if let Some(project_id) = self.project_state.current_project_id() {
            return Ok(project_id);
        }
        if self.auth.initialize().await {
            if let Some(project_id) = self.auth.default_project_id() {
                return Ok(project_id);
            }
        }
        Err(ServiceError::InvalidArgument(
            "No project id given and no default project is configured; pass project_id or set GOOGLE_CLOUD_PROJECT".to_string(),
        ))
    }

    /// Cloud client, once credentials are available.
    pub async fn cloud(&self) -> Result<&dyn CloudApi, ServiceError> {
        self.auth.ensure_initialized().await?;
        Ok(self.cloud.as_ref())
    }
}
