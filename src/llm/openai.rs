//! OpenAI-compatible backend (chat completions API)
//!
//! Single-shot chat protocol: one user message in, one JSON response out,
//! text pulled from `choices[0].message.content`. Any missing hop in that
//! path is reported as an empty response, matching the generate contract
//! users see from the Ollama backend.

use super::{join_url, map_transport_error, validate_base_url, LlmClient};
use super::{GENERATE_TIMEOUT, MODELS_TIMEOUT, TEMPERATURE};
use crate::config::LlmConfig;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat-completions client
pub struct OpenAiBackend {
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl OpenAiBackend {
    /// Create a client from the configuration snapshot taken at call time
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }
}

impl LlmClient for OpenAiBackend {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        validate_base_url(&self.base_url)?;
        let url = join_url(&self.base_url, "/v1/chat/completions");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            stream: false,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        tracing::debug!("Calling chat completions API with model: {}", self.model);

        let agent = ureq::AgentBuilder::new().timeout(GENERATE_TIMEOUT).build();
        let response = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(map_transport_error)?;

        let text = response
            .into_string()
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        parse_chat_completion(&text)
    }

    fn list_models(&self) -> Vec<String> {
        if validate_base_url(&self.base_url).is_err() {
            return vec![];
        }
        let url = join_url(&self.base_url, "/v1/models");

        let agent = ureq::AgentBuilder::new().timeout(MODELS_TIMEOUT).build();
        let response = match agent.get(&url).call() {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Model discovery failed: {}", e);
                return vec![];
            }
        };
        let body = match response.into_string() {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Model discovery failed reading body: {}", e);
                return vec![];
            }
        };

        parse_models(&body)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Extract the first choice's message content, trimmed
///
/// Missing `choices`, `message`, or `content` all collapse into
/// `EmptyResponse`, as does a body that is not JSON at all.
fn parse_chat_completion(body: &str) -> Result<String, LlmError> {
    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Option<Vec<Choice>>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: Option<Message>,
    }

    #[derive(Deserialize)]
    struct Message {
        content: Option<String>,
    }

    if body.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let response: ChatResponse =
        serde_json::from_str(body).map_err(|_| LlmError::EmptyResponse)?;

    let content = response
        .choices
        .and_then(|choices| choices.into_iter().next())
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or(LlmError::EmptyResponse)?;

    Ok(content.trim().to_string())
}

/// Extract sorted model ids from a models response; any failure yields none
fn parse_models(body: &str) -> Vec<String> {
    #[derive(Deserialize)]
    struct ModelsResponse {
        data: Option<Vec<ModelEntry>>,
    }

    #[derive(Deserialize)]
    struct ModelEntry {
        id: Option<String>,
    }

    let models: ModelsResponse = match serde_json::from_str(body) {
        Ok(models) => models,
        Err(_) => return vec![],
    };

    let mut names: Vec<String> = models
        .data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| m.id)
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_is_extracted_and_trimmed() {
        let body = r#"{"choices":[{"message":{"content":"  Fixed text  "}}]}"#;
        assert_eq!(parse_chat_completion(body).unwrap(), "Fixed text");
    }

    #[test]
    fn test_missing_hops_collapse_to_empty_response() {
        for body in [
            r#"{}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":[{}]}"#,
            r#"{"choices":[{"message":{}}]}"#,
        ] {
            assert_eq!(
                parse_chat_completion(body),
                Err(LlmError::EmptyResponse),
                "body: {}",
                body
            );
        }
    }

    #[test]
    fn test_malformed_json_collapses_to_empty_response() {
        assert_eq!(
            parse_chat_completion("not json"),
            Err(LlmError::EmptyResponse)
        );
    }

    #[test]
    fn test_empty_body_is_empty_response() {
        assert_eq!(parse_chat_completion(""), Err(LlmError::EmptyResponse));
    }

    #[test]
    fn test_only_first_choice_is_used() {
        let body = r#"{"choices":[{"message":{"content":"first"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(parse_chat_completion(body).unwrap(), "first");
    }

    #[test]
    fn test_models_parse_and_sort() {
        let body = r#"{"data":[{"id":"model-b"},{"id":"model-a"},{"id":"model-c"}]}"#;
        assert_eq!(parse_models(body), vec!["model-a", "model-b", "model-c"]);
    }

    #[test]
    fn test_models_malformed_body_yields_empty() {
        assert!(parse_models("not json").is_empty());
        assert!(parse_models(r#"{"data":null}"#).is_empty());
    }

    #[test]
    fn test_generate_rejects_invalid_endpoint() {
        let backend = OpenAiBackend::new(&LlmConfig {
            base_url: "ftp://example.com".into(),
            ..LlmConfig::default()
        });
        assert_eq!(backend.generate("hi"), Err(LlmError::InvalidEndpoint));
    }
}
