//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own session registry and
//! fake cloud.

use super::constants::*;
use super::fake_cloud::FakeCloud;
use gcp_mcp_server::auth::{AuthResolver, AuthSettings};
use gcp_mcp_server::config::{AppConfig, CliConfig, Transport};
use gcp_mcp_server::mcp::McpState;
use gcp_mcp_server::server::{server::make_app, RequestsLoggingLevel};
use gcp_mcp_server::session::SessionRegistry;
use gcp_mcp_server::state::ProjectState;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Knobs for servers that need non-default settings
pub struct TestServerOptions {
    /// Project the server starts with
    pub project_id: Option<String>,
    pub session_lifetime_sec: u64,
    /// 0 disables rotation
    pub session_rotation_interval_sec: u64,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            project_id: Some(TEST_PROJECT_ID.to_string()),
            session_lifetime_sec: 60 * 60,
            session_rotation_interval_sec: 0,
        }
    }
}

/// Test server instance with an isolated session registry and fake cloud
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Session registry for direct inspection in tests
    pub sessions: Arc<SessionRegistry>,

    /// Project state for direct inspection in tests
    pub project_state: Arc<ProjectState>,

    /// Fake cloud recording every call
    pub cloud: Arc<FakeCloud>,

    // Private fields - keep resources alive until drop
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port with default options
    pub async fn spawn() -> Self {
        Self::spawn_with(TestServerOptions::default()).await
    }

    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Resolves an HTTP transport config from CLI defaults
    /// 2. Wires a static access token and the fake cloud into the MCP state
    /// 3. Binds to a random port (127.0.0.1:0)
    /// 4. Spawns the server in a background task
    /// 5. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if the config is rejected, port binding fails, or the server
    /// doesn't become ready within timeout.
    pub async fn spawn_with(options: TestServerOptions) -> Self {
        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let cli = CliConfig {
            transport: Transport::Http,
            port,
            project_id: options.project_id.clone(),
            lazy_auth: true,
            logging_level: RequestsLoggingLevel::None,
            session_lifetime_sec: options.session_lifetime_sec,
            session_rotation_interval_sec: options.session_rotation_interval_sec,
            access_token: Some("ya29.e2e-token".to_string()),
            ..Default::default()
        };
        let config = Arc::new(AppConfig::resolve(&cli, None).expect("Failed to resolve config"));

        let project_state = Arc::new(ProjectState::new(config.project_id.clone()));
        let auth = Arc::new(AuthResolver::new(
            AuthSettings {
                use_metadata_server: false,
                ..config.auth.clone()
            },
            reqwest::Client::new(),
            project_state.clone(),
        ));
        let cloud = Arc::new(FakeCloud::default());
        let sessions = Arc::new(SessionRegistry::new(config.session.lifetime));

        let mcp_state = Arc::new(McpState::new(
            project_state.clone(),
            auth,
            cloud.clone(),
            sessions.clone(),
            Transport::Http,
        ));

        let app = make_app(config, mcp_state);

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        // Wait for server to be ready
        let server = Self {
            base_url,
            port,
            sessions,
            project_state,
            cloud,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
