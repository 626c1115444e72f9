use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gcp_mcp_server::auth::AuthResolver;
use gcp_mcp_server::config::{self, Transport};
use gcp_mcp_server::gcp::RestCloudApi;
use gcp_mcp_server::mcp::McpState;
use gcp_mcp_server::server::{run_server, run_stdio, RequestsLoggingLevel};
use gcp_mcp_server::session::SessionRegistry;
use gcp_mcp_server::state::{export_project_env, ProjectState};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Transport to serve MCP over.
    #[clap(long, env = "MCP_TRANSPORT", value_enum, default_value_t = Transport::Stdio)]
    pub transport: Transport,

    /// Address to bind the HTTP transport to.
    #[clap(long, env = "MCP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// The port to listen on (HTTP transport only).
    #[clap(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Project used by tools that are not given a project_id.
    #[clap(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: Option<String>,

    /// Resolve credentials on the first tool call instead of at startup.
    #[clap(long, env = "LAZY_AUTH")]
    pub lazy_auth: bool,

    /// The level of logging to perform on each HTTP request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Timeout in seconds for calls to Google Cloud APIs.
    #[clap(long, default_value_t = 60)]
    pub request_timeout_sec: u64,

    /// Session lifetime in seconds, measured from creation.
    #[clap(long, default_value_t = 24 * 60 * 60)]
    pub session_lifetime_sec: u64,

    /// Interval in seconds between sweeps of expired sessions.
    #[clap(long, default_value_t = 60 * 60)]
    pub session_sweep_interval_sec: u64,

    /// Age in seconds after which HTTP session ids are rotated. Set to 0 to disable rotation.
    #[clap(long, default_value_t = 60 * 60)]
    pub session_rotation_interval_sec: u64,

    /// OAuth access token to use instead of resolving credentials.
    #[clap(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Service account or authorized user JSON file.
    #[clap(long, env = "GOOGLE_APPLICATION_CREDENTIALS", value_parser = parse_path)]
    pub credentials_path: Option<PathBuf>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            transport: args.transport,
            host: args.host.clone(),
            port: args.port,
            project_id: args.project_id.clone(),
            lazy_auth: args.lazy_auth,
            logging_level: args.logging_level.clone(),
            request_timeout_sec: args.request_timeout_sec,
            session_lifetime_sec: args.session_lifetime_sec,
            session_sweep_interval_sec: args.session_sweep_interval_sec,
            session_rotation_interval_sec: args.session_rotation_interval_sec,
            access_token: args.access_token.clone(),
            credentials_path: args.credentials_path.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    // stdout carries the stdio transport, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = Arc::new(config::AppConfig::resolve(&cli_config, file_config)?);

    info!("Configuration loaded:");
    info!("  transport: {}", app_config.transport);
    info!(
        "  project_id: {}",
        app_config.project_id.as_deref().unwrap_or("<from credentials>")
    );
    info!("  lazy_auth: {}", app_config.lazy_auth);
    info!("  session lifetime: {:?}", app_config.session.lifetime);

    // Still single-threaded: the runtime is built below
    if let Some(project_id) = &app_config.project_id {
        export_project_env(project_id);
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(serve(app_config))
}

async fn serve(app_config: Arc<config::AppConfig>) -> Result<()> {
    let http_client = reqwest::Client::builder()
        .timeout(app_config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let project_state = Arc::new(ProjectState::new(app_config.project_id.clone()));
    let auth = Arc::new(AuthResolver::new(
        app_config.auth.clone(),
        http_client.clone(),
        project_state.clone(),
    ));
    let cloud = Arc::new(RestCloudApi::new(
        http_client,
        auth.clone(),
        app_config.endpoints.clone(),
    ));
    let sessions = SessionRegistry::with_sweeper(
        app_config.session.lifetime,
        app_config.session.sweep_interval,
    );

    let mcp_state = Arc::new(McpState::new(
        project_state,
        auth.clone(),
        cloud,
        sessions,
        app_config.transport,
    ));

    if app_config.lazy_auth {
        info!("Lazy auth enabled, credentials resolve on first use");
    } else {
        tokio::spawn(async move {
            if auth.initialize().await {
                info!(
                    "Credentials resolved ({})",
                    auth.credential_kind().unwrap_or("unknown")
                );
            }
        });
    }

    match app_config.transport {
        Transport::Stdio => run_stdio(mcp_state).await,
        Transport::Http => run_server(app_config, mcp_state).await,
    }
}
