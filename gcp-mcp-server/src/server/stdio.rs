//! Stdio transport
//!
//! Newline-delimited JSON-RPC on stdin/stdout. The whole process lifetime is
//! one implicit session. Logs go to stderr so stdout carries only responses.

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::mcp::{McpConnection, McpState};
use crate::session::{SessionMetadata, SessionRegistry};

fn open_stdio_session(sessions: &SessionRegistry) -> String {
    let mut metadata = SessionMetadata::new();
    metadata.insert("transport".to_string(), json!("stdio"));
    sessions.create_session(metadata)
}

/// Serves MCP messages read line by line from `reader` until EOF.
pub async fn serve_lines<R, W>(mcp_state: &McpState, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let sessions = mcp_state.sessions.clone();
    let mut connection = McpConnection::new(Some(open_stdio_session(&sessions)));
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let session_alive = connection
            .session_id
            .as_deref()
            .is_some_and(|id| sessions.validate_session(id));
        if !session_alive {
            warn!("Stdio session expired, opening a new one");
            let session_id = open_stdio_session(&sessions);
            if connection.initialized {
                let mut metadata = SessionMetadata::new();
                metadata.insert("initialized".to_string(), json!(true));
                sessions.update_session_metadata(&session_id, metadata);
            }
            connection.session_id = Some(session_id);
        }

        let Some(response) = mcp_state.handle_message(line, &mut connection).await else {
            continue;
        };
        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        writer
            .write_all(payload.as_bytes())
            .await
            .context("Failed to write stdout")?;
        writer.flush().await?;
    }

    debug!("Stdin closed");
    if let Some(session_id) = &connection.session_id {
        sessions.invalidate_session(session_id);
    }
    Ok(())
}

pub async fn run_stdio(mcp_state: Arc<McpState>) -> Result<()> {
    info!("Serving MCP over stdio");
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    let result = tokio::select! {
        result = serve_lines(&mcp_state, reader, writer) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(())
        }
    };

    mcp_state.sessions.shutdown().await;
    info!("Stdio transport stopped");
    result
}
