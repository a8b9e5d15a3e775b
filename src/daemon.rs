//! Daemon module - main event loop orchestration
//!
//! Coordinates the hotkey dispatcher, LLM client, rewrite session, and the
//! selection capability. All mutable state (the open session, generation
//! counters, the config snapshot) is owned by one task; hotkey events, LLM
//! completions, and control requests arrive over channels and are applied
//! here, so completions from any thread are serialized before they touch
//! shared state.

use crate::config::{Config, ModeId, RewriteMode};
use crate::error::{LlmError, Result};
use crate::hotkey::{self, HotkeyAction, HotkeyDispatcher, Shortcut};
use crate::ipc::{self, ControlEvent, ControlRequest, ControlResponse};
use crate::llm;
use crate::prompt;
use crate::selection::SelectionAccess;
use crate::session::{RewriteSession, SessionId};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// Send a desktop notification
async fn send_notification(title: &str, body: &str) {
    let _ = Command::new("notify-send")
        .args(["--app-name=Reword", "--expire-time=2000", title, body])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}

/// Write state to file for external integrations (e.g., Waybar)
fn write_state_file(path: &PathBuf, state: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create state file directory: {}", e);
            return;
        }
    }

    if let Err(e) = std::fs::write(path, state) {
        tracing::warn!("Failed to write state file: {}", e);
    } else {
        tracing::trace!("State file updated: {}", state);
    }
}

/// Remove state file on shutdown
fn cleanup_state_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove state file: {}", e);
        }
    }
}

/// A settled LLM request routed back to the daemon loop
#[derive(Debug)]
enum Completion {
    /// One-shot fix finished; `generation` guards against stale results
    Fix {
        generation: u64,
        outcome: std::result::Result<String, LlmError>,
    },
    /// A session mode finished; matched by (session, mode) identity
    Mode {
        session: SessionId,
        mode: ModeId,
        outcome: std::result::Result<String, LlmError>,
    },
}

/// Resolve the instruction the fix action sends
///
/// The configured default mode wins while it still exists in the mode list;
/// otherwise the plain grammar-fix instruction is used.
fn resolve_fix_prompt(config: &Config, text: &str) -> String {
    match config.default_mode() {
        Some(mode) => prompt::rewrite_prompt(mode, text),
        None => prompt::grammar_prompt(text),
    }
}

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    state_file_path: Option<PathBuf>,
    selection: Arc<dyn SelectionAccess>,

    session: Option<RewriteSession>,
    next_session: u64,

    fix_generation: u64,
    fix_in_flight: bool,

    completion_tx: mpsc::Sender<Completion>,
    completion_rx: Option<mpsc::Receiver<Completion>>,
}

impl Daemon {
    /// Create a new daemon with the given configuration
    pub fn new(config: Config, selection: Arc<dyn SelectionAccess>) -> Self {
        let state_file_path = config.resolve_state_file();
        let (completion_tx, completion_rx) = mpsc::channel(32);

        Self {
            config,
            state_file_path,
            selection,
            session: None,
            next_session: 0,
            fix_generation: 0,
            fix_in_flight: false,
            completion_tx,
            completion_rx: Some(completion_rx),
        }
    }

    /// Current state label for the state file and status responses
    fn state_label(&self) -> &'static str {
        if self.session.is_some() {
            "session"
        } else if self.fix_in_flight {
            "fixing"
        } else {
            "idle"
        }
    }

    /// Update the state file if configured
    fn update_state(&self) {
        if let Some(ref path) = self.state_file_path {
            write_state_file(path, self.state_label());
        }
    }

    /// Failure cue for the fix action; configurable, never mutates text
    async fn signal_failure(&self, body: &str) {
        if self.config.notification.on_error {
            send_notification("Reword failed", body).await;
        } else {
            tracing::debug!("Failure cue suppressed by config: {}", body);
        }
    }

    /// Run the daemon until interrupted
    pub async fn run(mut self) -> Result<()> {
        let fix_shortcut = Shortcut::parse(&self.config.shortcuts.fix)?;
        let rewrite_shortcut = Shortcut::parse(&self.config.shortcuts.rewrite)?;

        let (hotkey_tx, mut hotkey_rx) = mpsc::channel(32);
        let mut dispatcher = hotkey::create_dispatcher()?;
        dispatcher.register(fix_shortcut, rewrite_shortcut, hotkey_tx)?;
        tracing::info!(
            "Hotkeys registered: fix={:?} rewrite={:?}",
            self.config.shortcuts.fix,
            self.config.shortcuts.rewrite
        );

        let socket_path = Config::control_socket_path();
        let listener = ipc::bind_socket(&socket_path)?;
        let (control_tx, mut control_rx) = mpsc::channel(32);
        tokio::spawn(ipc::serve(listener, control_tx));

        let mut completion_rx = self
            .completion_rx
            .take()
            .expect("daemon run consumed twice");

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sighup = signal(SignalKind::hangup())?;

        self.update_state();
        tracing::info!("Reword daemon ready");

        loop {
            tokio::select! {
                Some(action) = hotkey_rx.recv() => match action {
                    HotkeyAction::Fix => self.handle_fix().await,
                    HotkeyAction::Rewrite => self.handle_rewrite().await,
                },

                Some(completion) = completion_rx.recv() => {
                    self.handle_completion(completion).await;
                }

                Some(event) = control_rx.recv() => {
                    self.handle_control(event).await;
                }

                _ = sighup.recv() => {
                    self.reload_config(dispatcher.as_mut());
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, shutting down");
                    break;
                }

                _ = sigterm.recv() => {
                    tracing::info!("Terminated, shutting down");
                    break;
                }
            }
        }

        dispatcher.shutdown();
        if let Some(ref path) = self.state_file_path {
            cleanup_state_file(path);
        }
        if socket_path.exists() {
            let _ = std::fs::remove_file(&socket_path);
        }

        Ok(())
    }

    /// Re-read the config file and rebind shortcuts atomically
    fn reload_config(&mut self, dispatcher: &mut dyn HotkeyDispatcher) {
        let reloaded = match crate::config::load_config(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Config reload failed, keeping current config: {}", e);
                return;
            }
        };

        match (
            Shortcut::parse(&reloaded.shortcuts.fix),
            Shortcut::parse(&reloaded.shortcuts.rewrite),
        ) {
            (Ok(fix), Ok(rewrite)) => {
                dispatcher.update_shortcuts(fix, rewrite);
                tracing::info!("Config reloaded");
            }
            (fix, rewrite) => {
                for err in [fix.err(), rewrite.err()].into_iter().flatten() {
                    tracing::error!("Rejecting reloaded shortcut: {}", err);
                }
                return;
            }
        }

        self.config = reloaded;
        self.state_file_path = self.config.resolve_state_file();
    }

    /// Capture the selection, or abort the triggering action
    async fn capture_selection(&self, cue_on_empty: bool) -> Option<String> {
        if !self.selection.is_authorized().await {
            tracing::warn!("Selection tooling unavailable, requesting authorization");
            self.selection.request_authorization().await;
            return None;
        }

        match self.selection.selected_text().await {
            Some(text) => Some(text),
            None => {
                tracing::debug!("No selection captured, aborting action");
                if cue_on_empty {
                    self.signal_failure("No text selected").await;
                }
                None
            }
        }
    }

    /// Fix action: one request, replace in place on success
    async fn handle_fix(&mut self) {
        let text = match self.capture_selection(true).await {
            Some(text) => text,
            None => return,
        };

        let prompt = resolve_fix_prompt(&self.config, &text);

        self.fix_generation += 1;
        self.fix_in_flight = true;
        self.update_state();
        tracing::info!("Fix requested ({} chars selected)", text.len());

        self.spawn_fix(self.fix_generation, prompt);
    }

    /// Rewrite action: open a session, eagerly run the initial mode
    async fn handle_rewrite(&mut self) {
        let text = match self.capture_selection(false).await {
            Some(text) => text,
            None => return,
        };

        // Snapshot the mode list; the session keeps it even if config changes.
        let modes: Vec<RewriteMode> = self.config.modes.clone();
        if modes.is_empty() {
            tracing::info!("Rewrite hotkey ignored: no modes configured");
            return;
        }

        if let Some(old) = self.session.take() {
            tracing::debug!(
                "Discarding session {:?}; its pending results will be dropped",
                old.id()
            );
        }

        self.next_session += 1;
        let id = SessionId(self.next_session);

        let Some((session, dispatch)) =
            RewriteSession::new(id, text, modes, self.config.default_mode)
        else {
            return;
        };

        tracing::info!(
            "Session {:?} opened with {} mode(s), initial mode {:?}",
            id,
            session.modes().len(),
            dispatch.mode.name
        );

        let prompt = prompt::rewrite_prompt(&dispatch.mode, session.source_text());
        self.session = Some(session);
        self.update_state();
        self.spawn_mode_generation(id, dispatch.mode.id, prompt);
    }

    /// Run one fix request off the loop thread
    fn spawn_fix(&self, generation: u64, prompt: String) {
        let llm_config = self.config.llm.clone();
        let tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || {
                let client = llm::create_client(&llm_config);
                client.generate(&prompt)
            })
            .await
            .unwrap_or_else(|e| Err(LlmError::ConnectionFailed(e.to_string())));

            let _ = tx.send(Completion::Fix { generation, outcome }).await;
        });
    }

    /// Run one session-mode request off the loop thread
    fn spawn_mode_generation(&self, session: SessionId, mode: ModeId, prompt: String) {
        let llm_config = self.config.llm.clone();
        let tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || {
                let client = llm::create_client(&llm_config);
                client.generate(&prompt)
            })
            .await
            .unwrap_or_else(|e| Err(LlmError::ConnectionFailed(e.to_string())));

            let _ = tx.send(Completion::Mode { session, mode, outcome }).await;
        });
    }

    /// Apply a settled request to current state, dropping stale results
    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fix { generation, outcome } => {
                if generation != self.fix_generation {
                    tracing::debug!("Dropping stale fix completion (gen {})", generation);
                    return;
                }
                self.fix_in_flight = false;

                match outcome {
                    Ok(text) => {
                        tracing::info!("Fix succeeded ({} chars)", text.len());
                        if let Err(e) = self.selection.replace_selection(&text).await {
                            tracing::error!("Replacement failed: {}", e);
                            self.signal_failure(&e.to_string()).await;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Fix failed: {}", e);
                        self.signal_failure(&e.to_string()).await;
                    }
                }
                self.update_state();
            }

            Completion::Mode { session: id, mode, outcome } => {
                let current = self.session.as_mut().filter(|s| s.id() == id);
                let Some(session) = current else {
                    tracing::debug!("Dropping completion for discarded session {:?}", id);
                    return;
                };

                if let Err(ref e) = outcome {
                    tracing::warn!("Mode {:?} in session {:?} failed: {}", mode, id, e);
                }
                session.settle(mode, outcome);
            }
        }
    }

    /// Serve one control request against the open session
    async fn handle_control(&mut self, event: ControlEvent) {
        let state = self.state_label().to_string();

        let response = match event.request {
            ControlRequest::Status => {
                ControlResponse::ok(state, self.session.as_ref().map(|s| s.snapshot()))
            }

            ControlRequest::SelectMode { mode } => match self.session.as_mut() {
                Some(session) => {
                    let pending = session.select_mode(mode).map(|dispatch| {
                        (
                            session.id(),
                            dispatch.mode.id,
                            prompt::rewrite_prompt(&dispatch.mode, session.source_text()),
                        )
                    });
                    if let Some((id, mode_id, prompt)) = pending {
                        self.spawn_mode_generation(id, mode_id, prompt);
                    }
                    ControlResponse::ok(state, self.session.as_ref().map(|s| s.snapshot()))
                }
                None => ControlResponse::err(state, "no session open"),
            },

            ControlRequest::Retry => match self.session.as_mut() {
                Some(session) => {
                    let pending = session.retry_focused().map(|dispatch| {
                        (
                            session.id(),
                            dispatch.mode.id,
                            prompt::rewrite_prompt(&dispatch.mode, session.source_text()),
                        )
                    });
                    if let Some((id, mode_id, prompt)) = pending {
                        self.spawn_mode_generation(id, mode_id, prompt);
                    }
                    ControlResponse::ok(state, self.session.as_ref().map(|s| s.snapshot()))
                }
                None => ControlResponse::err(state, "no session open"),
            },

            ControlRequest::Replace => match self.take_focused_result() {
                Ok(text) => {
                    let result = self.selection.replace_selection(&text).await;
                    self.update_state();
                    match result {
                        Ok(()) => ControlResponse::ok(self.state_label(), None),
                        Err(e) => ControlResponse::err(self.state_label(), e.to_string()),
                    }
                }
                Err(response) => response,
            },

            ControlRequest::Copy => match self.take_focused_result() {
                Ok(text) => {
                    let result = self.selection.copy_to_clipboard(&text).await;
                    self.update_state();
                    match result {
                        Ok(()) => ControlResponse::ok(self.state_label(), None),
                        Err(e) => ControlResponse::err(self.state_label(), e.to_string()),
                    }
                }
                Err(response) => response,
            },

            ControlRequest::Dismiss => {
                match self.session.take() {
                    Some(session) => {
                        tracing::info!("Session {:?} dismissed", session.id());
                        self.update_state();
                        ControlResponse::ok(self.state_label(), None)
                    }
                    None => ControlResponse::err(state, "no session open"),
                }
            }
        };

        if event.reply.send(response).is_err() {
            tracing::debug!("Control client went away before reply");
        }
    }

    /// Close the session and hand out its focused result text
    ///
    /// Valid only while the focused mode holds a result; otherwise the
    /// session stays open and the caller gets an error response.
    fn take_focused_result(&mut self) -> std::result::Result<String, ControlResponse> {
        let state = self.state_label().to_string();

        let Some(session) = self.session.as_ref() else {
            return Err(ControlResponse::err(state, "no session open"));
        };

        match session.focused_result() {
            Some(text) => {
                let text = text.to_string();
                let id = session.id();
                self.session = None;
                tracing::info!("Session {:?} finished", id);
                Ok(text)
            }
            None => Err(ControlResponse::err(
                state,
                "focused mode has no result yet",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeId;

    fn config_with_default_mode() -> (Config, ModeId) {
        let id = ModeId::new();
        let config = Config {
            modes: vec![RewriteMode {
                id,
                name: "Professional".into(),
                prompt: "Rewrite professionally.".into(),
            }],
            default_mode: Some(id),
            ..Config::default()
        };
        (config, id)
    }

    #[test]
    fn test_fix_prompt_uses_default_mode_when_present() {
        let (config, _) = config_with_default_mode();
        let prompt = resolve_fix_prompt(&config, "some text");
        assert!(prompt.starts_with("Rewrite professionally."));
        assert!(prompt.ends_with("some text"));
    }

    #[test]
    fn test_fix_prompt_falls_back_to_grammar_instruction() {
        let (mut config, _) = config_with_default_mode();

        // Default mode id no longer in the list: plain grammar fix.
        config.default_mode = Some(ModeId::new());
        let prompt = resolve_fix_prompt(&config, "some text");
        assert!(prompt.contains("grammar, spelling, and punctuation"));

        config.default_mode = None;
        let prompt = resolve_fix_prompt(&config, "some text");
        assert!(prompt.contains("grammar, spelling, and punctuation"));
    }
}
