use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::credentials::{find_credentials_file, CredentialsFile, DEFAULT_TOKEN_URI};
use super::token_source::{
    AccessToken, AuthorizedUserTokenSource, MetadataTokenSource, ServiceAccountTokenSource,
    StaticTokenSource, TokenSource, METADATA_FLAVOR_HEADER,
};
use super::AuthError;
use crate::error::ServiceError;
use crate::state::ProjectState;

pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";

const METADATA_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Pre-issued access token. Takes precedence over everything else.
    pub access_token: Option<String>,
    /// Explicit credentials file. When unset the ADC lookup is used.
    pub credentials_path: Option<PathBuf>,
    pub metadata_url: String,
    pub use_metadata_server: bool,
    /// Operator-configured project. Wins over the project found next to the
    /// credentials.
    pub project_id: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            credentials_path: None,
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            use_metadata_server: true,
            project_id: None,
        }
    }
}

struct ResolvedCredentials {
    source: Arc<dyn TokenSource>,
    kind: &'static str,
    default_project_id: Option<String>,
}

/// Lazily resolves and caches credentials and the default project.
///
/// Resolution failures are never fatal: they are logged and the next call
/// tries again.
pub struct AuthResolver {
    settings: AuthSettings,
    client: reqwest::Client,
    state: Arc<ProjectState>,
    resolved: OnceCell<ResolvedCredentials>,
    token_cache: Mutex<Option<AccessToken>>,
}

impl AuthResolver {
    pub fn new(settings: AuthSettings, client: reqwest::Client, state: Arc<ProjectState>) -> Self {
        Self {
            settings,
            client,
            state,
            resolved: OnceCell::new(),
            token_cache: Mutex::new(None),
        }
    }

    /// Resolves credentials if not done yet. Returns whether credentials are available.
    pub async fn initialize(&self) -> bool {
        match self.resolved().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Credential resolution failed: {}", e);
                false
            }
        }
    }

    /// Lazy entry point for tool calls.
    pub async fn ensure_initialized(&self) -> Result<(), ServiceError> {
        self.resolved().await.map(|_| ()).map_err(ServiceError::from)
    }

    pub fn is_initialized(&self) -> bool {
        self.resolved.initialized()
    }

    /// Credential kind, once resolved (`service_account`, `authorized_user`, ...).
    pub fn credential_kind(&self) -> Option<&'static str> {
        self.resolved.get().map(|r| r.kind)
    }

    /// Project discovered alongside the credentials.
    pub fn default_project_id(&self) -> Option<String> {
        self.resolved
            .get()
            .and_then(|r| r.default_project_id.clone())
    }

    /// Returns a bearer token, refreshing it when it is about to expire.
    pub async fn access_token(&self) -> Result<String, ServiceError> {
        let resolved = self.resolved().await?;

        let mut cache = self.token_cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        debug!("Fetching new access token ({})", resolved.kind);
        let token = resolved.source.fetch_token(&self.client).await?;
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }

    async fn resolved(&self) -> Result<&ResolvedCredentials, AuthError> {
        self.resolved
            .get_or_try_init(|| async {
                let resolved = self.resolve_credentials().await?;

                if self.state.current_project_id().is_none() {
                    if let Some(project_id) = &resolved.default_project_id {
                        if let Err(e) = self.state.set_current_project_id(project_id) {
                            warn!("Ignoring discovered project id: {}", e);
                        }
                    }
                }
                self.state.set_auth_initialized(true);

                info!(
                    "Google Cloud credentials resolved ({}, default project: {})",
                    resolved.kind,
                    resolved.default_project_id.as_deref().unwrap_or("none")
                );
                Ok(resolved)
            })
            .await
    }

    async fn resolve_credentials(&self) -> Result<ResolvedCredentials, AuthError> {
        let configured_project = self.settings.project_id.clone();

        if let Some(token) = &self.settings.access_token {
            return Ok(ResolvedCredentials {
                source: Arc::new(StaticTokenSource::new(token.clone())),
                kind: "access_token",
                default_project_id: configured_project,
            });
        }

        let credentials_path = self
            .settings
            .credentials_path
            .clone()
            .or_else(find_credentials_file);

        if let Some(path) = credentials_path {
            debug!("Loading credentials from {:?}", path);
            let credentials = CredentialsFile::load(&path)?;
            let kind = credentials.kind();
            let default_project_id =
                configured_project.or(credentials.project_id().map(String::from));
            let source: Arc<dyn TokenSource> = match credentials {
                CredentialsFile::ServiceAccount(key) => {
                    Arc::new(ServiceAccountTokenSource::new(key))
                }
                CredentialsFile::AuthorizedUser(key) => {
                    Arc::new(AuthorizedUserTokenSource::new(key, DEFAULT_TOKEN_URI))
                }
            };
            return Ok(ResolvedCredentials {
                source,
                kind,
                default_project_id,
            });
        }

        if self.settings.use_metadata_server {
            if let Some(metadata_project) = self.probe_metadata_server().await {
                return Ok(ResolvedCredentials {
                    source: Arc::new(MetadataTokenSource::new(&self.settings.metadata_url)),
                    kind: "metadata_server",
                    default_project_id: configured_project.or(Some(metadata_project)),
                });
            }
        }

        Err(AuthError::NoCredentials)
    }

    /// Returns the project id reported by the metadata server, if reachable.
    async fn probe_metadata_server(&self) -> Option<String> {
        let url = format!(
            "{}/computeMetadata/v1/project/project-id",
            self.settings.metadata_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .header(METADATA_FLAVOR_HEADER, "Google")
            .timeout(METADATA_PROBE_TIMEOUT)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let project = response.text().await.ok()?;
        let project = project.trim();
        (!project.is_empty()).then(|| project.to_string())
    }
}
