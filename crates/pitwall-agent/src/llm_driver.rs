//! [`LlmDriver`] – OpenAI-compatible chat-completion client.
//!
//! Talks to any server exposing `/v1/chat/completions` with bearer-token
//! auth: the OpenAI API itself (`https://api.openai.com`) or a compatible
//! gateway. One request, one response: no retries, no streaming, and no
//! timeout beyond `reqwest`'s defaults.
//!
//! # Example
//!
//! ```rust,no_run
//! use pitwall_agent::llm_driver::{ChatMessage, CompletionBackend, CompletionRequest, LlmDriver, Role};
//!
//! # async fn run() -> Result<(), pitwall_agent::LlmError> {
//! let driver = LlmDriver::new("https://api.openai.com", "sk-...");
//! let messages = vec![
//!     ChatMessage { role: Role::System, content: "You are a racing coach.".into() },
//!     ChatMessage { role: Role::User, content: "How do I take Copse?".into() },
//! ];
//! let reply = driver
//!     .complete(&CompletionRequest { model: "gpt-4", messages: &messages, temperature: 0.7, max_tokens: 500 })
//!     .await?;
//! # Ok(()) }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from LLM driver operations.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response from the model server could not be parsed.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Everything one completion call needs.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Anything that turns a conversation into a reply.
///
/// [`LlmDriver`] is the production implementation; tests plug in stubs.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

/// Assistant replies may carry `content: null` (e.g. refusals).
#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

fn first_reply(response: ChatResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::BadResponse("empty choices array".into()))?
        .message
        .content
        .ok_or_else(|| LlmError::BadResponse("reply has no content".into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmDriver
// ─────────────────────────────────────────────────────────────────────────────

/// An async client for an OpenAI-compatible chat-completions endpoint.
///
/// Construct once and reuse; the inner `reqwest::Client` pools connections.
pub struct LlmDriver {
    base_url: String,
    api_key: Zeroizing<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmDriver")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl LlmDriver {
    /// Create a new driver pointing at `base_url` (e.g. `"https://api.openai.com"`).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: Zeroizing::new(api_key.into()),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionBackend for LlmDriver {
    /// Send the conversation and return the assistant's reply text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the request fails or the server answers
    /// with a non-2xx status, or [`LlmError::BadResponse`] if the response
    /// shape is unexpected.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response: ChatResponse = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.as_str())
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        first_reply(response)
    }
}
