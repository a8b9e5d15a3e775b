//! Control socket for the session UI and CLI
//!
//! The rewrite popup is rendered by an external front-end; its command
//! surface is this socket. Requests and responses are single
//! newline-terminated JSON objects over a Unix socket in the runtime
//! directory, one request per connection round.

use crate::config::{Config, ModeId};
use crate::error::RewordError;
use crate::session::SessionSnapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};

/// A command from the session front-end or the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Report daemon state and the open session, if any
    Status,
    /// Focus a mode, dispatching its request on first selection
    SelectMode { mode: ModeId },
    /// Re-run the focused mode after it settled
    Retry,
    /// Replace the original selection with the focused result (terminal)
    Replace,
    /// Copy the focused result to the clipboard (terminal)
    Copy,
    /// Close the session without side effects (terminal)
    Dismiss,
}

/// Reply to one control request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,

    /// Daemon state label, mirrors the state file ("idle", "fixing", "session")
    pub state: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSnapshot>,
}

impl ControlResponse {
    pub fn ok(state: impl Into<String>, session: Option<SessionSnapshot>) -> Self {
        Self {
            ok: true,
            state: state.into(),
            error: None,
            session,
        }
    }

    pub fn err(state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            state: state.into(),
            error: Some(message.into()),
            session: None,
        }
    }
}

/// A control request paired with its reply channel, delivered to the daemon
#[derive(Debug)]
pub struct ControlEvent {
    pub request: ControlRequest,
    pub reply: oneshot::Sender<ControlResponse>,
}

/// Bind the control socket, replacing any stale one from a dead daemon
pub fn bind_socket(path: &Path) -> Result<UnixListener, RewordError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let listener = UnixListener::bind(path)
        .map_err(|e| RewordError::Ipc(format!("bind {}: {}", path.display(), e)))?;
    tracing::debug!("Control socket bound at {}", path.display());
    Ok(listener)
}

/// Accept loop: forward each request to the daemon and write its reply back
pub async fn serve(listener: UnixListener, tx: mpsc::Sender<ControlEvent>) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!("Control socket accept failed: {}", e);
                continue;
            }
        };

        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, tx).await {
                tracing::debug!("Control connection ended: {}", e);
            }
        });
    }
}

async fn handle_connection(
    stream: UnixStream,
    tx: mpsc::Sender<ControlEvent>,
) -> Result<(), RewordError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let line = match lines.next_line().await? {
        Some(line) => line,
        None => return Ok(()),
    };

    let response = match serde_json::from_str::<ControlRequest>(&line) {
        Ok(request) => {
            let (reply_tx, reply_rx) = oneshot::channel();
            let event = ControlEvent {
                request,
                reply: reply_tx,
            };
            if tx.send(event).await.is_err() {
                ControlResponse::err("stopping", "daemon is shutting down")
            } else {
                reply_rx
                    .await
                    .unwrap_or_else(|_| ControlResponse::err("stopping", "daemon dropped request"))
            }
        }
        Err(e) => ControlResponse::err("unknown", format!("invalid request: {}", e)),
    };

    let mut payload = serde_json::to_string(&response)
        .map_err(|e| RewordError::Ipc(format!("encode response: {}", e)))?;
    payload.push('\n');
    writer.write_all(payload.as_bytes()).await?;

    Ok(())
}

/// Send one request to a running daemon and await its reply (CLI side)
pub async fn send_request(
    path: PathBuf,
    request: &ControlRequest,
) -> Result<ControlResponse, RewordError> {
    let stream = UnixStream::connect(&path).await.map_err(|e| {
        RewordError::Ipc(format!(
            "cannot reach daemon at {} ({}). Is `reword daemon` running?",
            path.display(),
            e
        ))
    })?;

    let (reader, mut writer) = stream.into_split();

    let mut payload = serde_json::to_string(request)
        .map_err(|e| RewordError::Ipc(format!("encode request: {}", e)))?;
    payload.push('\n');
    writer.write_all(payload.as_bytes()).await?;

    let mut lines = BufReader::new(reader).lines();
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| RewordError::Ipc("daemon closed connection without replying".into()))?;

    serde_json::from_str(&line).map_err(|e| RewordError::Ipc(format!("invalid reply: {}", e)))
}

/// Default control socket path from the runtime directory
pub fn default_socket_path() -> PathBuf {
    Config::control_socket_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trips_through_json() {
        let mode = ModeId::new();
        let request = ControlRequest::SelectMode { mode };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("select_mode"));

        let parsed: ControlRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_terminal_requests_have_stable_wire_names() {
        for (request, name) in [
            (ControlRequest::Replace, "replace"),
            (ControlRequest::Copy, "copy"),
            (ControlRequest::Dismiss, "dismiss"),
            (ControlRequest::Retry, "retry"),
            (ControlRequest::Status, "status"),
        ] {
            let json = serde_json::to_string(&request).unwrap();
            assert!(json.contains(name), "{} missing from {}", name, json);
        }
    }

    #[test]
    fn test_error_response_serializes_without_session() {
        let response = ControlResponse::err("idle", "no session open");
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("\"session\""));
        assert!(json.contains("no session open"));
    }
}
