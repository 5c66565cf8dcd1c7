//! HTTP backend for OpenAI-compatible generation servers.
//!
//! Works with: llama.cpp `llama-server`, vLLM, Ollama's OpenAI shim, and any
//! server exposing:
//! - `POST /v1/completions` (prompt in, `choices[0].text` out)
//! - `POST /v1/chat/completions` (messages in, `choices[0].message.content` out)
//! - `GET /health` (2xx = healthy)

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolwright_core::backend::{Backend, GenerationParams};
use toolwright_core::error::BackendError;
use toolwright_core::message::ChatMessage;
use tracing::{debug, warn};

/// A backend reached over HTTP.
pub struct HttpBackend {
    name: String,
    base_url: String,
    probe_timeout: Duration,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new HTTP backend rooted at `base_url` (e.g. `http://127.0.0.1:8080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "llama-server".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            probe_timeout: Duration::from_secs(5),
            client,
        }
    }

    /// Override the liveness probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(params: &GenerationParams) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "stream": false,
        });

        if !params.stop.is_empty() {
            body["stop"] = serde_json::json!(params.stop);
        }

        body
    }

    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<T, BackendError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Backend returned error");
            return Err(BackendError::Api {
                status_code: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, BackendError> {
        let mut body = Self::request_body(params);
        body["prompt"] = serde_json::json!(prompt);

        debug!(backend = %self.name, model = %params.model, "Sending completion request");

        let api_response: CompletionResponse = self.post("/v1/completions", &body).await?;
        Ok(api_response.first_text())
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> std::result::Result<String, BackendError> {
        let mut body = Self::request_body(params);
        body["messages"] = serde_json::json!(Self::to_api_messages(messages));

        debug!(
            backend = %self.name,
            model = %params.model,
            messages = messages.len(),
            "Sending chat completion request"
        );

        let api_response: ChatResponse = self.post("/v1/chat/completions", &body).await?;
        Ok(api_response.first_content())
    }

    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: Option<String>,
}

impl CompletionResponse {
    fn first_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ApiMessage>,
}

impl ChatResponse {
    fn first_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default()
    }
}
