//! Chat completion client.
//!
//! The pipeline needs exactly one thing from a language model: given a
//! system instruction and a user message, return the assistant's text.
//! `Completion` captures that; `ChatClient` implements it for
//! OpenAI-compatible `/chat/completions` APIs (DeepSeek by default).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ChatConfig;
use crate::error::{CompletionError, TransportError};

pub trait Completion {
    fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError>;
}

impl<F> Completion for F
where
    F: Fn(&str, &str) -> Result<String, CompletionError>,
{
    fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        self(system, user)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    config: ChatConfig,
    agent: ureq::Agent,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Self { config, agent }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl Completion for ChatClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            stream: false,
        };
        let payload =
            serde_json::to_vec(&request).map_err(|e| TransportError::Decode(e.to_string()))?;

        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .content_type("application/json")
            .send(&payload[..])
            .map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(TransportError::Status { status, body }.into());
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyChoice)?;

        debug!(model = %self.config.model, chars = content.len(), "completion received");
        Ok(content)
    }
}
