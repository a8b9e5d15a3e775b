//! Ollama backend (generate API, newline-delimited JSON)
//!
//! The request asks the server to stream, but the whole body is read in one
//! piece and folded into a single result string. Lines that fail to parse or
//! lack a `response` field are skipped without failing the call.

use super::{join_url, map_transport_error, validate_base_url, LlmClient};
use super::{GENERATE_TIMEOUT, MODELS_TIMEOUT, TEMPERATURE};
use crate::config::LlmConfig;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};

/// Ollama generate-API client
pub struct OllamaBackend {
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

impl OllamaBackend {
    /// Create a client from the configuration snapshot taken at call time
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }
}

impl LlmClient for OllamaBackend {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        validate_base_url(&self.base_url)?;
        let url = join_url(&self.base_url, "/api/generate");

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
            options: GenerateOptions {
                temperature: TEMPERATURE,
            },
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        tracing::debug!("Calling Ollama generate API with model: {}", self.model);

        let agent = ureq::AgentBuilder::new().timeout(GENERATE_TIMEOUT).build();
        let response = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(map_transport_error)?;

        let text = response
            .into_string()
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        parse_generate_stream(&text)
    }

    fn list_models(&self) -> Vec<String> {
        if validate_base_url(&self.base_url).is_err() {
            return vec![];
        }
        let url = join_url(&self.base_url, "/api/tags");

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

        parse_tags(&body)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

/// Fold a newline-delimited generate response into one string
///
/// Each non-empty line is parsed independently; unparsable lines and lines
/// without a `response` field are skipped.
fn parse_generate_stream(body: &str) -> Result<String, LlmError> {
    #[derive(Deserialize)]
    struct GenerateLine {
        response: Option<String>,
    }

    let mut result = String::new();
    for line in body.split('\n').filter(|l| !l.is_empty()) {
        if let Ok(parsed) = serde_json::from_str::<GenerateLine>(line) {
            if let Some(fragment) = parsed.response {
                result.push_str(&fragment);
            }
        }
    }

    if result.is_empty() {
        Err(LlmError::EmptyResponse)
    } else {
        Ok(result.trim().to_string())
    }
}

/// Extract sorted model names from a tags response; any failure yields none
fn parse_tags(body: &str) -> Vec<String> {
    #[derive(Deserialize)]
    struct TagsResponse {
        models: Option<Vec<ModelInfo>>,
    }

    #[derive(Deserialize)]
    struct ModelInfo {
        name: Option<String>,
    }

    let tags: TagsResponse = match serde_json::from_str(body) {
        Ok(tags) => tags,
        Err(_) => return vec![],
    };

    let mut names: Vec<String> = tags
        .models
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| m.name)
        .collect();
    names.sort();
    names
}
