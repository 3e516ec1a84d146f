//! Turning a free-text query into an `HttpRequest` via the model.

use serde_json::Value;
use tracing::{debug, warn};

use crate::http::HttpRequest;
use crate::llm::Completion;

/// Message returned to the user when the model's reply is unusable.
pub const UNKNOWN_ERROR: &str = "An unknown error occurred";

/// Result of request synthesis.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    Success(HttpRequest),
    /// User-facing message: either the model's own refusal, verbatim, or
    /// `UNKNOWN_ERROR`.
    Failure(String),
}

pub struct RequestSynthesizer<'a, C> {
    completion: &'a C,
}

impl<'a, C: Completion> RequestSynthesizer<'a, C> {
    pub fn new(completion: &'a C) -> Self {
        Self { completion }
    }

    pub fn synthesize(&self, query: &str, system_prompt: &str) -> SynthesisOutcome {
        match self.completion.complete(system_prompt, query) {
            Ok(reply) => {
                debug!(%reply, "request builder reply");
                interpret_reply(&reply)
            }
            Err(err) => {
                warn!(error = %err, "completion request failed");
                unknown_error()
            }
        }
    }
}

/// Interpret the model's raw reply.
///
/// Code fences are stripped first. A non-empty string `"error"` field is a
/// refusal and is passed through unchanged; anything else must be a valid
/// `HttpRequest`.
pub fn interpret_reply(reply: &str) -> SynthesisOutcome {
    let stripped = strip_code_fences(reply);
    if stripped.is_empty() {
        warn!("request builder returned an empty reply");
        return unknown_error();
    }

    let value: Value = match serde_json::from_str(&stripped) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "request builder reply is not JSON");
            return unknown_error();
        }
    };
    let Value::Object(fields) = value else {
        warn!(reply = %stripped, "request builder reply is not a JSON object");
        return unknown_error();
    };

    match fields.get("error") {
        Some(Value::String(message)) if !message.is_empty() => {
            return SynthesisOutcome::Failure(message.clone());
        }
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(other) => {
            warn!(error = %other, "request builder returned a non-string error");
            return unknown_error();
        }
    }

    match serde_json::from_value::<HttpRequest>(Value::Object(fields)) {
        Ok(request) => SynthesisOutcome::Success(request),
        Err(err) => {
            warn!(error = %err, "request builder reply does not match the request schema");
            unknown_error()
        }
    }
}

/// Remove every ```` ```json ```` and ```` ``` ```` marker and trim.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

fn unknown_error() -> SynthesisOutcome {
    SynthesisOutcome::Failure(UNKNOWN_ERROR.to_string())
}
