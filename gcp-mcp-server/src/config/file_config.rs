use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub transport: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub project_id: Option<String>,
    pub lazy_auth: Option<bool>,
    pub logging_level: Option<String>,
    pub request_timeout_sec: Option<u64>,

    // Feature configs
    pub session: Option<SessionConfig>,
    pub auth: Option<AuthConfig>,
    pub endpoints: Option<EndpointsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub lifetime_sec: Option<u64>,
    pub sweep_interval_sec: Option<u64>,
    /// 0 disables rotation
    pub rotation_interval_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub credentials_path: Option<String>,
    pub metadata_url: Option<String>,
    pub use_metadata_server: Option<bool>,
}

/// Base URL overrides, mostly useful against emulators.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EndpointsConfig {
    pub logging: Option<String>,
    pub monitoring: Option<String>,
    pub spanner: Option<String>,
    pub resource_manager: Option<String>,
    pub trace: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
transport = "http"
port = 8181
project_id = "from-file"

[session]
lifetime_sec = 600
rotation_interval_sec = 0

[auth]
use_metadata_server = false

[endpoints]
spanner = "http://localhost:9020/v1"
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.transport.as_deref(), Some("http"));
        assert_eq!(config.port, Some(8181));
        assert_eq!(config.project_id.as_deref(), Some("from-file"));

        let session = config.session.unwrap();
        assert_eq!(session.lifetime_sec, Some(600));
        assert_eq!(session.sweep_interval_sec, None);
        assert_eq!(session.rotation_interval_sec, Some(0));

        assert_eq!(config.auth.unwrap().use_metadata_server, Some(false));
        assert_eq!(
            config.endpoints.unwrap().spanner.as_deref(),
            Some("http://localhost:9020/v1")
        );
    }

    #[test]
    fn test_load_empty_config() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert!(config.port.is_none());
        assert!(config.session.is_none());
    }

    #[test]
    fn test_load_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/gcp-mcp.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
