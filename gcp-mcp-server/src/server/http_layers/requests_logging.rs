//! Request logging middleware

use super::super::state::ServerState;
use axum::extract::State;
use axum::{
    body::{Body, Bytes},
    http::{header::HeaderMap, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info};

use crate::server::HEADER_SESSION_ID;

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 4096;
const LOGGED_SESSION_PREFIX: usize = 8;

/// Headers that carry credentials or session ids are never logged verbatim.
fn is_sensitive_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("authorization") || name.eq_ignore_ascii_case(HEADER_SESSION_ID)
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} headers:", label);
    for (name, value) in headers.iter() {
        if is_sensitive_header(name.as_str()) {
            info!("    {}: <redacted>", name);
        } else {
            info!("    {}: {:?}", name, value);
        }
    }
}

/// Short, non-reusable tag for the session a request belongs to.
fn session_tag(headers: &HeaderMap) -> String {
    match headers
        .get(HEADER_SESSION_ID)
        .and_then(|value| value.to_str().ok())
    {
        Some(id) => {
            let prefix: String = id.chars().take(LOGGED_SESSION_PREFIX).collect();
            format!("session={}…", prefix)
        }
        None => "session=-".to_string(),
    }
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get("content-length")?
        .to_str()
        .ok()?
        .parse::<usize>()
        .ok()
}

/// Buffers a body small enough to log and prints it, returning the bytes so
/// the message can be rebuilt. Larger or unsized bodies pass through untouched.
async fn capture_body(label: &str, headers: &HeaderMap, body: Body) -> Result<Body, StatusCode> {
    let size = match content_length(headers) {
        Some(size) => size,
        None => {
            info!("  {} body: streamed", label);
            return Ok(body);
        }
    };
    if size > MAX_LOGGABLE_BODY_LENGTH {
        info!("  {} body: {:#}", label, byte_unit::Byte::from(size));
        return Ok(body);
    }

    let bytes: Bytes = axum::body::to_bytes(body, size).await.map_err(|err| {
        error!("Failed to buffer {} body: {:?}", label, err);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!("  {} body: {}", label, String::from_utf8_lossy(&bytes).trim_end());
    Ok(Body::from(bytes))
}

pub async fn log_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let level = state.config.logging_level.clone();
    if level == RequestsLoggingLevel::None {
        return next.run(request).await;
    }

    let start = Instant::now();
    info!(
        ">>> {} {} {}",
        request.method(),
        request.uri(),
        session_tag(request.headers())
    );

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Request", request.headers());
    }

    let request = if level >= RequestsLoggingLevel::Body {
        let (parts, body) = request.into_parts();
        match capture_body("Request", &parts.headers, body).await {
            Ok(body) => Request::from_parts(parts, body),
            Err(status) => return status.into_response(),
        }
    } else {
        request
    };

    let response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Response", response.headers());
    }

    let response = if level >= RequestsLoggingLevel::Body {
        let (parts, body) = response.into_parts();
        match capture_body("Response", &parts.headers, body).await {
            Ok(body) => Response::from_parts(parts, body),
            Err(status) => return status.into_response(),
        }
    } else {
        response
    };

    info!(
        "<<< {} ({}ms)",
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}
