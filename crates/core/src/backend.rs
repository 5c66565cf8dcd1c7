//! Backend trait — the abstraction over the upstream text-generation service.
//!
//! A Backend knows how to turn a prompt (or a chat transcript) into generated
//! text, and how to answer a cheap liveness probe. It holds no health state of
//! its own: gating, timeouts and bookkeeping belong to the supervisor that
//! owns it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::BackendError;
use crate::message::ChatMessage;

/// Fully resolved generation parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// The model identifier the backend should use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Nucleus-sampling threshold
    pub top_p: f32,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

/// Per-call overrides. Unset fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl GenerationOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Resolve these overrides against a set of defaults.
    pub fn resolve(&self, defaults: &GenerationParams) -> GenerationParams {
        GenerationParams {
            model: defaults.model.clone(),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            stop: if self.stop.is_empty() {
                defaults.stop.clone()
            } else {
                self.stop.clone()
            },
        }
    }
}

/// The core Backend trait.
///
/// The supervisor calls `complete()` / `chat()` through its admission queue
/// and `health_check()` from its probe loop; implementations only perform the
/// network exchange.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A human-readable name for this backend (e.g. "llama-server").
    fn name(&self) -> &str;

    /// Prompt in, generated text out.
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, BackendError>;

    /// Ordered role/content messages in, generated text out.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> std::result::Result<String, BackendError>;

    /// Liveness probe — does the backend report itself healthy?
    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        Ok(true)
    }
}
