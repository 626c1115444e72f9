//! Application Default Credentials file discovery and parsing.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::AuthError;

pub const CREDENTIALS_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl CredentialsFile {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::InvalidCredentials(format!("Failed to read {:?}: {}", path, e))
        })?;
        Self::parse(&content)
            .map_err(|e| AuthError::InvalidCredentials(format!("{:?}: {}", path, e)))
    }

    pub fn parse(content: &str) -> Result<Self, AuthError> {
        serde_json::from_str(content).map_err(|e| AuthError::InvalidCredentials(e.to_string()))
    }

    /// Project embedded in the credentials, if any.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            CredentialsFile::ServiceAccount(key) => key.project_id.as_deref(),
            CredentialsFile::AuthorizedUser(key) => key.quota_project_id.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CredentialsFile::ServiceAccount(_) => "service_account",
            CredentialsFile::AuthorizedUser(_) => "authorized_user",
        }
    }
}

/// Locates the credentials file: `GOOGLE_APPLICATION_CREDENTIALS` first, then
/// the gcloud well-known location. Returns `None` if neither exists.
pub fn find_credentials_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CREDENTIALS_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let home = std::env::var("HOME").ok()?;
    let well_known = Path::new(&home)
        .join(".config")
        .join("gcloud")
        .join("application_default_credentials.json");
    well_known.exists().then_some(well_known)
}
