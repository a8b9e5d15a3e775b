//! End-to-end rewrite session flows using fake collaborators
//!
//! These tests drive the session state machine the way the daemon does:
//! dispatch values out, completions fed back over a channel, results matched
//! by (session, mode) identity rather than arrival order.

use reword::config::{LlmConfig, ModeId, RewriteMode};
use reword::error::LlmError;
use reword::llm::{create_client, LlmClient};
use reword::prompt;
use reword::session::{GenerationPhase, RewriteSession, SessionId};
use tokio::sync::mpsc;

fn mode(name: &str, prompt_text: &str) -> RewriteMode {
    RewriteMode {
        id: ModeId::new(),
        name: name.to_string(),
        prompt: prompt_text.to_string(),
    }
}

/// A scripted stand-in for the HTTP backends
struct FakeLlm {
    reply: Result<String, LlmError>,
}

impl LlmClient for FakeLlm {
    fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        self.reply.clone()
    }

    fn list_models(&self) -> Vec<String> {
        vec!["model-a".into(), "model-b".into()]
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// A completion as the daemon's channel carries it
struct Completion {
    session: SessionId,
    mode: ModeId,
    outcome: Result<String, LlmError>,
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn completions_arrive_out_of_order_and_land_by_identity() {
    let formal = mode("Formal", "Rewrite formally.");
    let casual = mode("Casual", "Rewrite casually.");

    let (mut session, initial) = RewriteSession::new(
        SessionId(1),
        "the source text".into(),
        vec![formal.clone(), casual.clone()],
        Some(formal.id),
    )
    .expect("two modes configured");
    assert_eq!(initial.mode.id, formal.id);

    // User selects the second mode while the first is still in flight.
    let second = session.select_mode(casual.id).expect("first selection dispatches");

    let (tx, mut rx) = mpsc::channel::<Completion>(8);

    // The casual request finishes first, the formal one later: reverse of
    // dispatch order.
    for (dispatch, reply) in [
        (second, Ok("casual version".to_string())),
        (initial, Ok("formal version".to_string())),
    ] {
        let tx = tx.clone();
        let client = FakeLlm { reply };
        let prompt = prompt::rewrite_prompt(&dispatch.mode, session.source_text());
        tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || client.generate(&prompt))
                .await
                .unwrap();
            let _ = tx
                .send(Completion {
                    session: dispatch.session,
                    mode: dispatch.mode.id,
                    outcome,
                })
                .await;
        });
    }
    drop(tx);

    while let Some(completion) = rx.recv().await {
        assert_eq!(completion.session, session.id());
        session.settle(completion.mode, completion.outcome);
    }

    assert_eq!(
        session.phase(formal.id),
        Some(&GenerationPhase::Result("formal version".into()))
    );
    assert_eq!(
        session.phase(casual.id),
        Some(&GenerationPhase::Result("casual version".into()))
    );
    // Focus followed the user's last selection, not the completion order.
    assert_eq!(session.focused(), casual.id);
}

#[tokio::test]
async fn error_in_one_mode_leaves_the_other_usable() {
    let a = mode("A", "Rewrite as A.");
    let b = mode("B", "Rewrite as B.");

    let (mut session, _) = RewriteSession::new(
        SessionId(7),
        "text".into(),
        vec![a.clone(), b.clone()],
        None,
    )
    .unwrap();

    session.select_mode(b.id);
    session.settle(a.id, Err(LlmError::ServerError(502)));
    session.settle(b.id, Ok("b result".into()));

    // The errored mode reports its message inline; the focused mode still
    // offers its result for the terminal actions.
    assert!(matches!(
        session.phase(a.id),
        Some(GenerationPhase::Error(msg)) if msg.contains("502")
    ));
    assert_eq!(session.focused_result(), Some("b result"));
}

#[test]
fn discarded_session_cannot_poison_its_replacement() {
    let old_mode = mode("Old", "old prompt");
    let (old_session, old_dispatch) = RewriteSession::new(
        SessionId(1),
        "first selection".into(),
        vec![old_mode.clone()],
        None,
    )
    .unwrap();
    let old_id = old_session.id();

    // New hotkey press: old session is discarded before its request settles.
    drop(old_session);

    let new_mode = mode("New", "new prompt");
    let (mut new_session, _) = RewriteSession::new(
        SessionId(2),
        "second selection".into(),
        vec![new_mode.clone()],
        None,
    )
    .unwrap();

    // The daemon's first guard: the completion names a dead session.
    assert_ne!(old_id, new_session.id());

    // Even fed directly, a completion for a mode outside the new session's
    // snapshot changes nothing.
    assert!(!new_session.settle(old_dispatch.mode.id, Ok("stale result".into())));
    assert_eq!(
        new_session.phase(new_mode.id),
        Some(&GenerationPhase::Loading)
    );
    assert_eq!(new_session.phase(old_mode.id), None);
}

// ============================================================================
// Prompt round-trips
// ============================================================================

#[test]
fn every_mode_prompt_carries_the_source_verbatim() {
    let source = "Line one.\n  Indented line two — with punctuation?";
    let modes = [
        mode("Formal", "Rewrite the following text formally."),
        mode("My Tone", "dry, terse"),
        mode("", ""),
    ];

    for m in &modes {
        let built = prompt::rewrite_prompt(m, source);
        assert!(
            built.ends_with(source),
            "prompt for {:?} must end with the source text",
            m.name
        );
    }
}

// ============================================================================
// Client factory
// ============================================================================

#[test]
fn factory_builds_a_client_per_call_from_the_snapshot() {
    let mut config = LlmConfig::default();
    let client = create_client(&config);
    assert_eq!(client.name(), "ollama");

    // Settings change between calls: next factory call sees the new backend.
    config.backend = reword::config::BackendKind::OpenAi;
    let client = create_client(&config);
    assert_eq!(client.name(), "openai");
}
