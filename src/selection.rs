//! Selection capture and replacement
//!
//! The daemon treats "read the selected text" and "write it back" as an
//! external capability behind a trait, so tests can substitute a fake and
//! other desktops can grow their own adapters.
//!
//! The Wayland adapter shells out to the standard tools:
//! - wl-paste reads the primary selection
//! - wl-copy writes the clipboard
//! - wtype simulates Ctrl+V so the focused app replaces its selection
//!
//! All operations are best-effort; a missing or empty selection aborts the
//! triggering action instead of erroring loudly.

use crate::error::SelectionError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// External text capture/replace capability
#[async_trait::async_trait]
pub trait SelectionAccess: Send + Sync {
    /// Whether the required capture/replace tooling is usable
    async fn is_authorized(&self) -> bool;

    /// Ask the user to make the tooling available (install, permissions)
    async fn request_authorization(&self);

    /// Currently selected text in the foreground application, if any
    async fn selected_text(&self) -> Option<String>;

    /// Replace the current selection with new text
    async fn replace_selection(&self, text: &str) -> Result<(), SelectionError>;

    /// Put text on the system clipboard
    async fn copy_to_clipboard(&self, text: &str) -> Result<(), SelectionError>;
}

/// Wayland adapter built on wl-clipboard and wtype
pub struct WaylandSelection;

impl WaylandSelection {
    pub fn new() -> Self {
        Self
    }

    async fn tool_available(tool: &str) -> bool {
        Command::new("which")
            .arg(tool)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Pipe text into wl-copy, optionally targeting the primary selection
    async fn wl_copy(&self, text: &str, primary: bool) -> Result<(), SelectionError> {
        let mut command = Command::new("wl-copy");
        if primary {
            command.arg("--primary");
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SelectionError::WlCopyNotFound
                } else {
                    SelectionError::ReplaceFailed(e.to_string())
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| SelectionError::ReplaceFailed(e.to_string()))?;
            drop(stdin);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| SelectionError::ReplaceFailed(e.to_string()))?;

        if !status.success() {
            return Err(SelectionError::ReplaceFailed(
                "wl-copy exited with error".to_string(),
            ));
        }

        Ok(())
    }

    /// Simulate Ctrl+V so the focused application pastes over its selection
    async fn simulate_ctrl_v(&self) -> Result<(), SelectionError> {
        let output = Command::new("wtype")
            .args(["-M", "ctrl", "-k", "v", "-m", "ctrl"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SelectionError::WtypeNotFound
                } else {
                    SelectionError::ReplaceFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SelectionError::ReplaceFailed(stderr.to_string()));
        }

        Ok(())
    }
}

impl Default for WaylandSelection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SelectionAccess for WaylandSelection {
    async fn is_authorized(&self) -> bool {
        Self::tool_available("wl-paste").await
            && Self::tool_available("wl-copy").await
            && Self::tool_available("wtype").await
    }

    async fn request_authorization(&self) {
        let _ = Command::new("notify-send")
            .args([
                "--app-name=Reword",
                "--urgency=normal",
                "Reword needs Wayland tools",
                "Install wl-clipboard and wtype via your package manager, then retry.",
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
    }

    async fn selected_text(&self) -> Option<String> {
        let output = Command::new("wl-paste")
            .args(["--primary", "--no-newline"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            tracing::debug!("wl-paste reported no usable selection");
            return None;
        }

        let text = String::from_utf8(output.stdout).ok()?;
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    async fn replace_selection(&self, text: &str) -> Result<(), SelectionError> {
        if text.is_empty() {
            return Ok(());
        }

        self.wl_copy(text, false).await?;

        // Give the compositor a moment to own the clipboard before pasting.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        self.simulate_ctrl_v().await?;

        tracing::info!("Selection replaced ({} chars)", text.len());
        Ok(())
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), SelectionError> {
        if text.is_empty() {
            return Ok(());
        }

        self.wl_copy(text, false).await?;
        tracing::info!("Text copied to clipboard ({} chars)", text.len());
        Ok(())
    }
}
