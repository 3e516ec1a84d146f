//! Configuration for the external collaborators and the router.

use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_LLM_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_LLM_MODEL: &str = "deepseek-chat";
pub const DEFAULT_EMBED_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Configuration for the chat completion endpoint.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Bearer token sent with every completion request.
    pub api_key: String,

    /// Base URL of an OpenAI-compatible API; `/chat/completions` is appended.
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ChatConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: None,
        }
    }

    /// Read `DEEPSEEK_API_KEY` (required), `ASKAPI_LLM_URL` and
    /// `ASKAPI_LLM_MODEL` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = required(&lookup, "DEEPSEEK_API_KEY")?;
        let base_url = lookup("ASKAPI_LLM_URL").unwrap_or_else(|| DEFAULT_LLM_URL.to_string());
        let model = lookup("ASKAPI_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
        Ok(Self::new(api_key, base_url, model))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Base URL; `/embeddings` is appended.
    pub base_url: String,
    pub model: String,
    /// Optional bearer token. Self-hosted embedding servers usually need none.
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

impl EncoderConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: None,
        }
    }

    /// Read `ASKAPI_EMBED_URL` (required), `ASKAPI_EMBED_MODEL` and
    /// `ASKAPI_EMBED_KEY` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = required(&lookup, "ASKAPI_EMBED_URL")?;
        let model = lookup("ASKAPI_EMBED_MODEL").unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string());
        Ok(Self {
            api_key: lookup("ASKAPI_EMBED_KEY").filter(|key| !key.is_empty()),
            ..Self::new(base_url, model)
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Tuning for nearest-utterance routing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterConfig {
    /// How many nearest utterances vote for a route.
    pub top_k: usize,

    /// Minimum similarity the winning route's best utterance must reach.
    /// `None` uses the encoder's own default.
    pub threshold: Option<f32>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: None,
        }
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::MissingEnv(name.to_string()))
}
