//! Rewrite session state machine
//!
//! A session spans one rewrite hotkey trigger through one terminal action.
//! It owns the captured source text, a snapshot of the mode list, one
//! generation phase per mode, and the currently focused mode. The machine is
//! pure: methods return dispatch values describing which requests the
//! orchestrator should fire, and completions are fed back in via
//! [`RewriteSession::settle`].
//!
//! Phases move `Loading -> Result | Error` exactly once per dispatch.
//! Switching the focused mode never cancels or disturbs other modes'
//! requests; results are matched back by mode identity, not arrival order.

use crate::config::{ModeId, RewriteMode};
use crate::error::LlmError;
use serde::{Deserialize, Serialize};

/// Identity of one session, used to discard stale completions
///
/// The orchestrator allocates these from a counter; a completion whose
/// session id no longer matches the live session is dropped unseen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// Per-mode lifecycle of one generation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationPhase {
    /// Request dispatched, no outcome yet
    Loading,
    /// Generation succeeded
    Result(String),
    /// Generation failed; message shown inline for this mode only
    Error(String),
}

/// A generation request the orchestrator must dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub session: SessionId,
    pub mode: RewriteMode,
}

/// One bounded rewrite interaction
#[derive(Debug)]
pub struct RewriteSession {
    id: SessionId,
    source_text: String,
    modes: Vec<RewriteMode>,
    phases: std::collections::HashMap<ModeId, GenerationPhase>,
    focused: ModeId,
}

impl RewriteSession {
    /// Create a session over a mode-list snapshot
    ///
    /// The initial focus is the configured default mode if it is still in
    /// the list, else the first mode. Creation eagerly dispatches exactly
    /// one request, for that initial mode; every other mode waits until
    /// first selected. Returns None when the snapshot is empty.
    pub fn new(
        id: SessionId,
        source_text: String,
        modes: Vec<RewriteMode>,
        default_mode: Option<ModeId>,
    ) -> Option<(Self, Dispatch)> {
        let initial = default_mode
            .and_then(|id| modes.iter().find(|m| m.id == id))
            .or_else(|| modes.first())?
            .clone();

        let mut session = Self {
            id,
            source_text,
            modes,
            phases: std::collections::HashMap::new(),
            focused: initial.id,
        };
        session.phases.insert(initial.id, GenerationPhase::Loading);

        let dispatch = Dispatch {
            session: id,
            mode: initial,
        };
        Some((session, dispatch))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn focused(&self) -> ModeId {
        self.focused
    }

    pub fn modes(&self) -> &[RewriteMode] {
        &self.modes
    }

    /// Phase of the focused mode
    pub fn focused_phase(&self) -> &GenerationPhase {
        self.phases
            .get(&self.focused)
            .unwrap_or(&GenerationPhase::Loading)
    }

    /// Phase of an arbitrary mode, if one has been recorded
    pub fn phase(&self, mode: ModeId) -> Option<&GenerationPhase> {
        self.phases.get(&mode)
    }

    /// Focus a mode, dispatching its request if it has none yet
    ///
    /// Re-selecting a mode that already has a recorded phase (loading or
    /// settled) changes only the focus; it never re-dispatches. Unknown ids
    /// are ignored entirely.
    pub fn select_mode(&mut self, mode_id: ModeId) -> Option<Dispatch> {
        let mode = self.modes.iter().find(|m| m.id == mode_id)?.clone();
        self.focused = mode_id;

        if self.phases.contains_key(&mode_id) {
            return None;
        }

        self.phases.insert(mode_id, GenerationPhase::Loading);
        Some(Dispatch {
            session: self.id,
            mode,
        })
    }

    /// Explicitly re-run the focused mode
    ///
    /// Only settled modes can be re-run; a loading mode already has its one
    /// in-flight request.
    pub fn retry_focused(&mut self) -> Option<Dispatch> {
        match self.phases.get(&self.focused) {
            Some(GenerationPhase::Loading) => return None,
            Some(_) | None => {}
        }

        let mode = self.modes.iter().find(|m| m.id == self.focused)?.clone();
        self.phases.insert(self.focused, GenerationPhase::Loading);
        Some(Dispatch {
            session: self.id,
            mode,
        })
    }

    /// Record a completed request for one mode
    ///
    /// Touches only that mode's phase; other modes are unaffected whatever
    /// the arrival order. Completions for unknown modes, or for modes that
    /// are not loading, are ignored. Returns whether a phase changed.
    pub fn settle(&mut self, mode_id: ModeId, outcome: Result<String, LlmError>) -> bool {
        match self.phases.get(&mode_id) {
            Some(GenerationPhase::Loading) => {}
            _ => return false,
        }

        let phase = match outcome {
            Ok(text) => GenerationPhase::Result(text),
            Err(e) => GenerationPhase::Error(e.to_string()),
        };
        self.phases.insert(mode_id, phase);
        true
    }

    /// Result text of the focused mode, available only once it succeeded
    ///
    /// This gates the replace/copy terminal actions; an error phase offers
    /// only dismissal.
    pub fn focused_result(&self) -> Option<&str> {
        match self.focused_phase() {
            GenerationPhase::Result(text) => Some(text),
            _ => None,
        }
    }

    /// Snapshot for the control socket / status surface
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.id,
            focused: self.focused,
            modes: self
                .modes
                .iter()
                .map(|m| ModeSnapshot {
                    id: m.id,
                    name: m.name.clone(),
                    phase: match self.phases.get(&m.id) {
                        None => PhaseSnapshot::Pending,
                        Some(GenerationPhase::Loading) => PhaseSnapshot::Loading,
                        Some(GenerationPhase::Result(text)) => {
                            PhaseSnapshot::Result { text: text.clone() }
                        }
                        Some(GenerationPhase::Error(message)) => PhaseSnapshot::Error {
                            message: message.clone(),
                        },
                    },
                })
                .collect(),
        }
    }
}

/// Wire-friendly view of a session for the control socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: SessionId,
    pub focused: ModeId,
    pub modes: Vec<ModeSnapshot>,
}

/// One mode's state within a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeSnapshot {
    pub id: ModeId,
    pub name: String,
    pub phase: PhaseSnapshot,
}

/// Serializable phase, with a distinct marker for never-dispatched modes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseSnapshot {
    Pending,
    Loading,
    Result { text: String },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(name: &str) -> RewriteMode {
        RewriteMode {
            id: ModeId::new(),
            name: name.to_string(),
            prompt: format!("Rewrite as {}.", name),
        }
    }

    fn session_with_modes(
        modes: Vec<RewriteMode>,
        default_mode: Option<ModeId>,
    ) -> (RewriteSession, Dispatch) {
        RewriteSession::new(SessionId(1), "source".into(), modes, default_mode)
            .expect("non-empty mode list")
    }

    #[test]
    fn test_creation_dispatches_exactly_the_default_mode() {
        let a = mode("A");
        let b = mode("B");
        let (session, dispatch) = session_with_modes(vec![a.clone(), b.clone()], Some(a.id));

        assert_eq!(dispatch.mode.id, a.id);
        assert_eq!(session.focused(), a.id);
        assert_eq!(session.phase(a.id), Some(&GenerationPhase::Loading));
        assert_eq!(session.phase(b.id), None);
    }

    #[test]
    fn test_missing_default_falls_back_to_first_mode() {
        let a = mode("A");
        let b = mode("B");
        let gone = ModeId::new();
        let (session, dispatch) = session_with_modes(vec![a.clone(), b], Some(gone));

        assert_eq!(dispatch.mode.id, a.id);
        assert_eq!(session.focused(), a.id);
    }

    #[test]
    fn test_empty_mode_list_yields_no_session() {
        assert!(RewriteSession::new(SessionId(1), "text".into(), vec![], None).is_none());
    }

    #[test]
    fn test_selecting_unseen_mode_dispatches_once() {
        let a = mode("A");
        let b = mode("B");
        let (mut session, _) = session_with_modes(vec![a.clone(), b.clone()], Some(a.id));

        let dispatch = session.select_mode(b.id).expect("first selection dispatches");
        assert_eq!(dispatch.mode.id, b.id);
        assert_eq!(session.focused(), b.id);

        // Still loading: switching back and forth must not re-dispatch.
        assert!(session.select_mode(a.id).is_none());
        assert!(session.select_mode(b.id).is_none());
    }

    #[test]
    fn test_completions_are_isolated_per_mode() {
        let a = mode("A");
        let b = mode("B");
        let (mut session, _) = session_with_modes(vec![a.clone(), b.clone()], Some(a.id));
        session.select_mode(b.id);

        // B settles first even though A was dispatched first.
        assert!(session.settle(b.id, Ok("rewritten b".into())));
        assert_eq!(session.phase(a.id), Some(&GenerationPhase::Loading));
        assert_eq!(
            session.phase(b.id),
            Some(&GenerationPhase::Result("rewritten b".into()))
        );

        assert!(session.settle(a.id, Err(LlmError::EmptyResponse)));
        assert_eq!(
            session.phase(b.id),
            Some(&GenerationPhase::Result("rewritten b".into()))
        );
    }

    #[test]
    fn test_settled_mode_never_redispatches_on_reselect() {
        let a = mode("A");
        let b = mode("B");
        let (mut session, _) = session_with_modes(vec![a.clone(), b.clone()], Some(a.id));

        session.settle(a.id, Ok("done".into()));
        session.select_mode(b.id);

        assert!(session.select_mode(a.id).is_none());
        assert_eq!(
            session.phase(a.id),
            Some(&GenerationPhase::Result("done".into()))
        );
    }

    #[test]
    fn test_retry_redispatches_only_settled_modes() {
        let a = mode("A");
        let (mut session, _) = session_with_modes(vec![a.clone()], None);

        // In flight: no second request for the same mode.
        assert!(session.retry_focused().is_none());

        session.settle(a.id, Err(LlmError::ServerError(500)));
        let dispatch = session.retry_focused().expect("settled mode can re-run");
        assert_eq!(dispatch.mode.id, a.id);
        assert_eq!(session.phase(a.id), Some(&GenerationPhase::Loading));
    }

    #[test]
    fn test_settle_ignores_unknown_and_unsettled_modes() {
        let a = mode("A");
        let (mut session, _) = session_with_modes(vec![a.clone()], None);

        assert!(!session.settle(ModeId::new(), Ok("phantom".into())));

        assert!(session.settle(a.id, Ok("first".into())));
        // A second completion for an already-settled mode changes nothing.
        assert!(!session.settle(a.id, Ok("second".into())));
        assert_eq!(
            session.phase(a.id),
            Some(&GenerationPhase::Result("first".into()))
        );
    }

    #[test]
    fn test_terminal_actions_gate_on_focused_result() {
        let a = mode("A");
        let b = mode("B");
        let (mut session, _) = session_with_modes(vec![a.clone(), b.clone()], Some(a.id));

        assert!(session.focused_result().is_none());

        session.settle(a.id, Ok("ready".into()));
        assert_eq!(session.focused_result(), Some("ready"));

        // An errored focus offers no replace/copy text.
        session.select_mode(b.id);
        session.settle(b.id, Err(LlmError::ConnectionFailed("refused".into())));
        assert!(session.focused_result().is_none());
    }

    #[test]
    fn test_focus_is_independent_of_completion() {
        let a = mode("A");
        let b = mode("B");
        let (mut session, _) = session_with_modes(vec![a.clone(), b.clone()], Some(a.id));

        session.select_mode(b.id);
        assert_eq!(session.focused(), b.id);

        // A's completion must not steal focus back.
        session.settle(a.id, Ok("a done".into()));
        assert_eq!(session.focused(), b.id);
        assert!(matches!(session.focused_phase(), GenerationPhase::Loading));
    }

    #[test]
    fn test_select_unknown_mode_is_ignored() {
        let a = mode("A");
        let (mut session, _) = session_with_modes(vec![a.clone()], None);

        assert!(session.select_mode(ModeId::new()).is_none());
        assert_eq!(session.focused(), a.id);
    }

    #[test]
    fn test_snapshot_reports_pending_modes() {
        let a = mode("A");
        let b = mode("B");
        let (session, _) = session_with_modes(vec![a.clone(), b.clone()], Some(a.id));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.focused, a.id);
        assert!(matches!(snapshot.modes[0].phase, PhaseSnapshot::Loading));
        assert!(matches!(snapshot.modes[1].phase, PhaseSnapshot::Pending));
    }
}
