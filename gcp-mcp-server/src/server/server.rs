use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use super::session::{SessionHeader, HEADER_SESSION_ID};
use super::{log_requests, state::*};
use crate::config::AppConfig;
use crate::mcp::handler::{parse_request, server_version};
use crate::mcp::protocol::methods;
use crate::mcp::{McpConnection, McpError, McpRequest, McpResponse, McpState};
use crate::session::{SessionMetadata, SessionStats};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub hash: String,
    pub transport: String,
    pub current_project_id: Option<String>,
    pub auth_initialized: bool,
    pub sessions: SessionStats,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let project = state.mcp_state.project_state.snapshot();
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: server_version(),
        hash: state.hash.clone(),
        transport: state.config.transport.to_string(),
        current_project_id: project.current_project_id,
        auth_initialized: project.auth_initialized,
        sessions: state.sessions.get_session_stats(),
    };
    Json(stats)
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    match HeaderValue::from_str(session_id) {
        Ok(value) => {
            response.headers_mut().insert(HEADER_SESSION_ID, value);
        }
        Err(e) => error!("Session id is not a valid header value: {}", e),
    }
    response
}

fn rpc_error(status: StatusCode, request: Option<&McpRequest>, error: McpError) -> Response {
    let id = request.and_then(|r| r.id.clone());
    (status, Json(McpResponse::error(id, error))).into_response()
}

fn rpc_response(response: Option<McpResponse>) -> Response {
    match response {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// `initialize` opens a new session; its id goes back in the response header.
async fn initialize_session(state: &ServerState, request: McpRequest) -> Response {
    let mut metadata = SessionMetadata::new();
    metadata.insert("transport".to_string(), json!("http"));
    let session_id = state.sessions.create_session(metadata);

    let mut connection = McpConnection::new(Some(session_id.clone()));
    let response = state
        .mcp_state
        .handle_request(request, &mut connection)
        .await;

    if !connection.initialized {
        state.sessions.invalidate_session(&session_id);
        return rpc_response(response);
    }

    info!("Opened MCP session over HTTP");
    with_session_header(rpc_response(response), &session_id)
}

/// Rotates the id once the session outlived the rotation interval.
/// `None` means the session is gone and the client has to initialize again.
fn refresh_session_id(state: &ServerState, session_id: String) -> Option<String> {
    let Some(rotation_interval) = state.config.session.rotation_interval else {
        return Some(session_id);
    };
    let record = state.sessions.get_session(&session_id)?;
    if record.age_at(SystemTime::now()) <= rotation_interval {
        return Some(session_id);
    }
    match state.sessions.rotate_session_id(&session_id) {
        Some(new_id) => {
            debug!("Rotated MCP session id");
            Some(new_id)
        }
        None => {
            warn!("MCP session retired after reaching the rotation limit");
            None
        }
    }
}

async fn post_mcp(
    State(state): State<ServerState>,
    SessionHeader(session_id): SessionHeader,
    body: String,
) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(error) => return rpc_error(StatusCode::BAD_REQUEST, None, error),
    };

    if request.method == methods::INITIALIZE && !request.is_notification() {
        return initialize_session(&state, request).await;
    }

    let Some(session_id) = session_id else {
        return rpc_error(
            StatusCode::BAD_REQUEST,
            Some(&request),
            McpError::InvalidRequest(format!("Missing {} header", HEADER_SESSION_ID)),
        );
    };

    if !state.sessions.validate_session(&session_id) {
        return rpc_error(
            StatusCode::NOT_FOUND,
            Some(&request),
            McpError::InvalidRequest("Unknown or expired session".to_string()),
        );
    }

    let Some(session_id) = refresh_session_id(&state, session_id) else {
        return rpc_error(
            StatusCode::NOT_FOUND,
            Some(&request),
            McpError::InvalidRequest("Session retired, initialize again".to_string()),
        );
    };

    let initialized = state
        .sessions
        .get_session_metadata(&session_id)
        .and_then(|metadata| metadata.get("initialized").and_then(|v| v.as_bool()))
        .unwrap_or(false);
    let mut connection = McpConnection {
        session_id: Some(session_id.clone()),
        initialized,
    };

    let response = state
        .mcp_state
        .handle_request(request, &mut connection)
        .await;
    with_session_header(rpc_response(response), &session_id)
}

async fn delete_mcp(
    State(state): State<ServerState>,
    SessionHeader(session_id): SessionHeader,
) -> StatusCode {
    let Some(session_id) = session_id else {
        return StatusCode::BAD_REQUEST;
    };
    if state.sessions.invalidate_session(&session_id) {
        info!("Closed MCP session over HTTP");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub fn make_app(config: Arc<AppConfig>, mcp_state: Arc<McpState>) -> Router {
    let state = ServerState::new(config, mcp_state);

    let mcp_routes: Router = Router::new()
        .route("/mcp", post(post_mcp).delete(delete_mcp))
        .with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    home_router
        .merge(mcp_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}

pub async fn run_server(config: Arc<AppConfig>, mcp_state: Arc<McpState>) -> Result<()> {
    let address = config.bind_address();
    let sessions = mcp_state.sessions.clone();
    let app = make_app(config, mcp_state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Ready to serve MCP at http://{}/mcp", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.shutdown().await;
    info!("HTTP server stopped");
    Ok(())
}
