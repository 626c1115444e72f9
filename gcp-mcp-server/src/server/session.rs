use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};
use tracing::debug;

pub const HEADER_SESSION_ID: &str = "Mcp-Session-Id";

/// The `Mcp-Session-Id` header of a request, if present.
///
/// Only reads the header; whether the id names a live session is decided by
/// the route, since `initialize` is allowed without one.
#[derive(Debug)]
pub struct SessionHeader(pub Option<String>);

pub enum SessionExtractionError {
    MalformedHeader,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SessionExtractionError::MalformedHeader => (
                StatusCode::BAD_REQUEST,
                "Malformed Mcp-Session-Id header",
            )
                .into_response(),
        }
    }
}

fn extract_session_id_from_headers(
    parts: &Parts,
) -> Result<Option<String>, SessionExtractionError> {
    let Some(value) = parts.headers.get(HEADER_SESSION_ID) else {
        return Ok(None);
    };
    let id = value.to_str().map_err(|_| {
        debug!("Session header is not visible ASCII");
        SessionExtractionError::MalformedHeader
    })?;
    let id = id.trim();
    if id.is_empty() {
        return Ok(None);
    }
    Ok(Some(id.to_string()))
}

impl<S> FromRequestParts<S> for SessionHeader
where
    S: Send + Sync,
{
    type Rejection = SessionExtractionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_session_id_from_headers(parts).map(SessionHeader)
    }
}
