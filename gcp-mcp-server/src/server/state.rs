use axum::extract::FromRef;

use crate::config::AppConfig;
use crate::mcp::McpState;
use crate::session::SessionRegistry;
use std::sync::Arc;
use std::time::Instant;

pub type GuardedAppConfig = Arc<AppConfig>;
pub type GuardedMcpState = Arc<McpState>;
pub type GuardedSessionRegistry = Arc<SessionRegistry>;

#[derive(Clone)]
pub struct ServerState {
    pub config: GuardedAppConfig,
    pub start_time: Instant,
    pub mcp_state: GuardedMcpState,
    pub sessions: GuardedSessionRegistry,
    pub hash: String,
}

impl ServerState {
    pub fn new(config: GuardedAppConfig, mcp_state: GuardedMcpState) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            sessions: mcp_state.sessions.clone(),
            mcp_state,
            hash: env!("GIT_HASH").to_string(),
        }
    }
}

impl FromRef<ServerState> for GuardedAppConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedMcpState {
    fn from_ref(input: &ServerState) -> Self {
        input.mcp_state.clone()
    }
}

impl FromRef<ServerState> for GuardedSessionRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.sessions.clone()
    }
}
