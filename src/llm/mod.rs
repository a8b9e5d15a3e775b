//! LLM client backends
//!
//! Two interchangeable wire protocols behind one trait:
//!
//! - **Ollama**: POST /api/generate, response is newline-delimited JSON;
//!   the `response` fragments are concatenated into one final string.
//! - **OpenAI-compatible**: POST /v1/chat/completions, single JSON response.
//!
//! Both return one aggregated result; no token-level streaming reaches the
//! caller. The client performs no retries and caches nothing: backend, base
//! URL, and model name come from the configuration snapshot taken when the
//! factory is invoked.

pub mod ollama;
pub mod openai;

use crate::config::{BackendKind, LlmConfig};
use crate::error::LlmError;
use std::time::Duration;

/// Timeout for generation requests (generous for slow local models)
pub(crate) const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for model discovery requests (best-effort, keep it snappy)
pub(crate) const MODELS_TIMEOUT: Duration = Duration::from_secs(5);

/// Sampling temperature sent with every generation request
pub(crate) const TEMPERATURE: f32 = 0.3;

/// Trait for LLM client implementations
pub trait LlmClient: Send + Sync {
    /// Send one prompt and return the full generated text, trimmed.
    ///
    /// One request, one outcome; failures are never retried here.
    fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// List model names offered by the server, sorted ascending.
    ///
    /// Discovery is best-effort: any failure degrades to an empty list.
    fn list_models(&self) -> Vec<String>;

    /// Human-readable backend name for logging
    fn name(&self) -> &'static str;
}

/// Build the client for the configured backend
///
/// Called per invocation so configuration changes take effect on the next
/// request without restarting the daemon.
pub fn create_client(config: &LlmConfig) -> Box<dyn LlmClient> {
    match config.backend {
        BackendKind::Ollama => Box::new(ollama::OllamaBackend::new(config)),
        BackendKind::OpenAi => Box::new(openai::OpenAiBackend::new(config)),
    }
}

/// Validate that a configured base URL can become a request target
pub(crate) fn validate_base_url(base_url: &str) -> Result<(), LlmError> {
    let rest = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .ok_or(LlmError::InvalidEndpoint)?;

    if rest.trim_end_matches('/').is_empty() {
        return Err(LlmError::InvalidEndpoint);
    }

    Ok(())
}

/// Join a base URL and an API path without doubling slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}

/// Map a ureq failure onto the shared taxonomy
///
/// A non-success status always becomes `ServerError`, regardless of what the
/// body contains.
pub(crate) fn map_transport_error(e: ureq::Error) -> LlmError {
    match e {
        ureq::Error::Status(code, _) => LlmError::ServerError(code),
        ureq::Error::Transport(t) => LlmError::ConnectionFailed(t.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("http://localhost:11434").is_ok());
        assert!(validate_base_url("https://llm.example.com/v1/").is_ok());

        assert_eq!(
            validate_base_url("localhost:11434"),
            Err(LlmError::InvalidEndpoint)
        );
        assert_eq!(validate_base_url("http://"), Err(LlmError::InvalidEndpoint));
        assert_eq!(validate_base_url(""), Err(LlmError::InvalidEndpoint));
    }

    #[test]
    fn test_join_url_handles_trailing_slash() {
        assert_eq!(
            join_url("http://localhost:11434/", "/api/generate"),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            join_url("http://localhost:11434", "api/generate"),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn test_factory_selects_backend() {
        let mut config = LlmConfig::default();
        assert_eq!(create_client(&config).name(), "ollama");

        config.backend = crate::config::BackendKind::OpenAi;
        assert_eq!(create_client(&config).name(), "openai");
    }
}
