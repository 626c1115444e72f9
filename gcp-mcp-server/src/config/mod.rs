mod file_config;

pub use file_config::{AuthConfig, EndpointsConfig, FileConfig, SessionConfig};

use crate::auth::{AuthSettings, DEFAULT_METADATA_URL};
use crate::gcp::ApiEndpoints;
use crate::server::RequestsLoggingLevel;
use crate::session::{DEFAULT_SESSION_LIFETIME, DEFAULT_SWEEP_INTERVAL};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Transport {
    #[default]
    Stdio,
    Http,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Stdio => write!(f, "stdio"),
            Transport::Http => write!(f, "http"),
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub project_id: Option<String>,
    pub lazy_auth: bool,
    pub logging_level: RequestsLoggingLevel,
    pub request_timeout_sec: u64,
    pub session_lifetime_sec: u64,
    pub session_sweep_interval_sec: u64,
    pub session_rotation_interval_sec: u64,
    pub access_token: Option<String>,
    pub credentials_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            host: "127.0.0.1".to_string(),
            port: 8080,
            project_id: None,
            lazy_auth: false,
            logging_level: RequestsLoggingLevel::default(),
            request_timeout_sec: 60,
            session_lifetime_sec: DEFAULT_SESSION_LIFETIME.as_secs(),
            session_sweep_interval_sec: DEFAULT_SWEEP_INTERVAL.as_secs(),
            session_rotation_interval_sec: DEFAULT_ROTATION_INTERVAL.as_secs(),
            access_token: None,
            credentials_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub project_id: Option<String>,
    pub lazy_auth: bool,
    pub logging_level: RequestsLoggingLevel,
    pub request_timeout: Duration,

    // Feature configs (with defaults)
    pub session: SessionSettings,
    pub auth: AuthSettings,
    pub endpoints: ApiEndpoints,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub lifetime: Duration,
    pub sweep_interval: Duration,
    /// `None` disables rotation on the HTTP transport
    pub rotation_interval: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_SESSION_LIFETIME,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            rotation_interval: Some(DEFAULT_ROTATION_INTERVAL),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let transport = match file.transport {
            Some(s) => Transport::from_str(&s, true)
                .map_err(|_| anyhow::anyhow!("Invalid transport in config file: {}", s))?,
            None => cli.transport,
        };

        let host = file.host.unwrap_or_else(|| cli.host.clone());
        let port = file.port.unwrap_or(cli.port);

        let project_id = file
            .project_id
            .or_else(|| cli.project_id.clone())
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let lazy_auth = file.lazy_auth.unwrap_or(cli.lazy_auth);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let request_timeout_sec = file.request_timeout_sec.unwrap_or(cli.request_timeout_sec);
        if request_timeout_sec == 0 {
            bail!("request_timeout_sec must be greater than 0");
        }

        // Session settings - merge file config with CLI
        let session_file = file.session.unwrap_or_default();
        let lifetime_sec = session_file
            .lifetime_sec
            .unwrap_or(cli.session_lifetime_sec);
        let sweep_interval_sec = session_file
            .sweep_interval_sec
            .unwrap_or(cli.session_sweep_interval_sec);
        let rotation_interval_sec = session_file
            .rotation_interval_sec
            .unwrap_or(cli.session_rotation_interval_sec);
        if lifetime_sec == 0 {
            bail!("Session lifetime must be greater than 0");
        }
        if sweep_interval_sec == 0 {
            bail!("Session sweep interval must be greater than 0");
        }
        if rotation_interval_sec >= lifetime_sec {
            bail!(
                "Session rotation interval ({}s) must be shorter than the session lifetime ({}s)",
                rotation_interval_sec,
                lifetime_sec
            );
        }
        let session = SessionSettings {
            lifetime: Duration::from_secs(lifetime_sec),
            sweep_interval: Duration::from_secs(sweep_interval_sec),
            rotation_interval: (rotation_interval_sec > 0)
                .then(|| Duration::from_secs(rotation_interval_sec)),
        };

        // Auth settings - the access token is never read from the file
        let auth_file = file.auth.unwrap_or_default();
        let auth = AuthSettings {
            access_token: cli.access_token.clone().filter(|t| !t.trim().is_empty()),
            credentials_path: auth_file
                .credentials_path
                .map(PathBuf::from)
                .or_else(|| cli.credentials_path.clone()),
            metadata_url: auth_file
                .metadata_url
                .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()),
            use_metadata_server: auth_file.use_metadata_server.unwrap_or(true),
            project_id: project_id.clone(),
        };
        if let Some(path) = &auth.credentials_path {
            if !path.exists() {
                bail!("Credentials file not found: {:?}", path);
            }
        }

        let endpoints_file = file.endpoints.unwrap_or_default();
        let defaults = ApiEndpoints::default();
        let endpoints = ApiEndpoints {
            logging: endpoints_file.logging.unwrap_or(defaults.logging),
            monitoring: endpoints_file.monitoring.unwrap_or(defaults.monitoring),
            spanner: endpoints_file.spanner.unwrap_or(defaults.spanner),
            resource_manager: endpoints_file
                .resource_manager
                .unwrap_or(defaults.resource_manager),
            trace: endpoints_file.trace.unwrap_or(defaults.trace),
        };

        Ok(Self {
            transport,
            host,
            port,
            project_id,
            lazy_auth,
            logging_level,
            request_timeout: Duration::from_secs(request_timeout_sec),
            session,
            auth,
            endpoints,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
