//! [`InsightAgent`] – natural-language analysis of racing snapshots.
//!
//! The agent turns a [`RacingInfo`] into a prompt, sends it with the recent
//! conversation to a [`CompletionBackend`], and records the exchange.
//!
//! # Conversation history
//!
//! History is append-only and owned by the agent: each successful call adds
//! the user prompt and then the assistant reply, nothing is ever removed or
//! edited. Only the last [`AgentConfig::context_window`] entries are sent
//! with a request, which bounds request size without touching the stored
//! history. A failed call leaves the history exactly as it was.
//!
//! # Example
//!
//! ```rust,no_run
//! use pitwall_agent::{AgentConfig, InsightAgent};
//! use pitwall_types::RacingInfo;
//!
//! # async fn run() -> Result<(), pitwall_types::PitwallError> {
//! let mut agent = InsightAgent::new(AgentConfig::from_env("gpt-4"))?;
//! let analysis = agent.analyze_situation(&RacingInfo::default()).await?;
//! println!("{analysis}");
//! # Ok(()) }
//! ```

use pitwall_types::{PitwallError, RacingInfo};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::llm_driver::{ChatMessage, CompletionBackend, CompletionRequest, LlmDriver};
use crate::prompt;

/// Environment variable holding the API credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`InsightAgent`].
#[derive(Clone)]
pub struct AgentConfig {
    /// Model identifier, e.g. `"gpt-4"`.
    pub model: String,
    /// API credential; absent or blank fails construction.
    pub api_key: Option<Zeroizing<String>>,
    /// Base URL of the OpenAI-compatible server.
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Number of most recent history entries sent with each request.
    pub context_window: usize,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.map(Zeroizing::new),
            ..Self::default()
        }
    }

    /// Build a config for `model` with the credential read from
    /// `OPENAI_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Self {
        Self::new(model, std::env::var(API_KEY_VAR).ok())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
            max_tokens: 500,
            context_window: 5,
        }
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model", &self.model)
            .field(
                "api_key",
                if self.api_key.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("context_window", &self.context_window)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// InsightAgent
// ─────────────────────────────────────────────────────────────────────────────

/// LLM-backed racing analyst with a linear conversation history.
pub struct InsightAgent {
    config: AgentConfig,
    backend: Box<dyn CompletionBackend>,
    history: Vec<ChatMessage>,
}

impl InsightAgent {
    /// Construct an agent that talks to `config.base_url` through an
    /// [`LlmDriver`].
    ///
    /// # Errors
    ///
    /// Returns [`PitwallError::MissingCredential`] when the API key is absent
    /// or blank.
    pub fn new(config: AgentConfig) -> Result<Self, PitwallError> {
        let key = require_key(&config)?;
        let driver = LlmDriver::new(&config.base_url, key);
        Ok(Self::build(config, Box::new(driver)))
    }

    /// Construct an agent over any [`CompletionBackend`].
    ///
    /// The credential check still applies.
    pub fn with_backend(
        config: AgentConfig,
        backend: impl CompletionBackend + 'static,
    ) -> Result<Self, PitwallError> {
        require_key(&config)?;
        Ok(Self::build(config, Box::new(backend)))
    }

    fn build(config: AgentConfig, backend: Box<dyn CompletionBackend>) -> Self {
        Self {
            config,
            backend,
            history: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// The full conversation so far, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Ask the model for an overall analysis of `info`.
    ///
    /// # Errors
    ///
    /// Returns [`PitwallError::Completion`] when the LLM call fails.
    #[instrument(skip_all, fields(model = %self.config.model))]
    pub async fn analyze_situation(&mut self, info: &RacingInfo) -> Result<String, PitwallError> {
        let prompt = prompt::analysis_prompt(info);
        self.exchange(prompt).await
    }

    /// Ask a free-form question about `info`.
    ///
    /// # Errors
    ///
    /// Returns [`PitwallError::Completion`] when the LLM call fails.
    #[instrument(skip_all, fields(model = %self.config.model))]
    pub async fn ask_question(
        &mut self,
        question: &str,
        info: &RacingInfo,
    ) -> Result<String, PitwallError> {
        let prompt = prompt::question_prompt(question, info);
        self.exchange(prompt).await
    }

    /// System prompt, the recent history window, then the new user prompt.
    fn request_messages(&self, prompt: &str) -> Vec<ChatMessage> {
        let window_start = self.history.len().saturating_sub(self.config.context_window);
        let mut messages = Vec::with_capacity(self.history.len() - window_start + 2);
        messages.push(ChatMessage::system(prompt::SYSTEM_PROMPT));
        messages.extend_from_slice(&self.history[window_start..]);
        messages.push(ChatMessage::user(prompt));
        messages
    }

    async fn exchange(&mut self, prompt: String) -> Result<String, PitwallError> {
        let messages = self.request_messages(&prompt);
        let request = CompletionRequest {
            model: &self.config.model,
            messages: &messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        debug!(messages = messages.len(), "sending completion request");

        let reply = self
            .backend
            .complete(&request)
            .await
            .map_err(|e| PitwallError::Completion(e.to_string()))?;

        self.history.push(ChatMessage::user(prompt));
        self.history.push(ChatMessage::assistant(reply.clone()));
        debug!(history = self.history.len(), "exchange recorded");
        Ok(reply)
    }
}

fn require_key(config: &AgentConfig) -> Result<&str, PitwallError> {
    config
        .api_key
        .as_deref()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .ok_or(PitwallError::MissingCredential {
            variable: API_KEY_VAR,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_driver::{LlmError, Role};
    use async_trait::async_trait;
    use pitwall_types::TrackInfo;
    use std::sync::{Arc, Mutex};

    /// Replies with the last user message and records every request.
    #[derive(Default, Clone)]
    struct EchoBackend {
        seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    }

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(request.messages.to_vec());
            let last = request.messages.last().unwrap();
            assert_eq!(last.role, Role::User);
            Ok(last.content.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String, LlmError> {
            Err(LlmError::BadResponse("rate limited".into()))
        }
    }

    fn config() -> AgentConfig {
        AgentConfig::new("gpt-4", Some("sk-test-key-12345".into()))
    }

    fn silverstone() -> RacingInfo {
        RacingInfo {
            track: TrackInfo {
                name: Some("Silverstone".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn construction_without_credential_fails_for_every_model() {
        for model in ["gpt-4", "gpt-3.5-turbo", "gpt-4-turbo", "gpt-4o", ""] {
            for key in [None, Some(String::new()), Some("   ".to_string())] {
                let err = InsightAgent::new(AgentConfig::new(model, key.clone())).err();
                assert_eq!(
                    err,
                    Some(PitwallError::MissingCredential {
                        variable: "OPENAI_API_KEY"
                    }),
                    "model {model:?} key {key:?}"
                );
                assert!(
                    InsightAgent::with_backend(AgentConfig::new(model, key), EchoBackend::default())
                        .is_err()
                );
            }
        }
    }

    #[test]
    fn construction_with_credential_starts_with_empty_history() {
        let agent = InsightAgent::new(AgentConfig::new("gpt-3.5-turbo", Some("sk-x".into()))).unwrap();
        assert_eq!(agent.model(), "gpt-3.5-turbo");
        assert!(agent.history().is_empty());
    }

    #[test]
    fn config_defaults_follow_the_chat_defaults() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.model, "gpt-4");
        assert_eq!(cfg.max_tokens, 500);
        assert_eq!(cfg.context_window, 5);
        assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn config_debug_redacts_api_key() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("sk-test-key-12345"));
        assert!(debug.contains("<redacted>"));
        assert!(format!("{:?}", AgentConfig::default()).contains("<not set>"));
    }

    #[tokio::test]
    async fn analysis_prompt_carries_the_track_name() {
        let mut agent = InsightAgent::with_backend(config(), EchoBackend::default()).unwrap();
        let reply = agent.analyze_situation(&silverstone()).await.unwrap();
        assert!(reply.contains("Silverstone"));
    }

    #[tokio::test]
    async fn question_is_sent_with_the_snapshot() {
        let mut agent = InsightAgent::with_backend(config(), EchoBackend::default()).unwrap();
        let reply = agent
            .ask_question("Where can I overtake?", &silverstone())
            .await
            .unwrap();
        assert!(reply.contains("Query: Where can I overtake?"));
        assert!(reply.contains("Silverstone"));
    }

    #[tokio::test]
    async fn each_call_appends_one_exchange_in_order() {
        let mut agent = InsightAgent::with_backend(config(), EchoBackend::default()).unwrap();
        let info = silverstone();

        for n in 1..=4 {
            if n % 2 == 0 {
                agent.ask_question(&format!("question {n}"), &info).await.unwrap();
            } else {
                agent.analyze_situation(&info).await.unwrap();
            }
            assert_eq!(agent.history().len(), 2 * n);
        }

        let roles: Vec<Role> = agent.history().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant].repeat(4),
            "history must alternate user/assistant"
        );
        assert!(agent.history()[2].content.contains("Query: question 2"));
        assert!(agent.history()[6].content.contains("Query: question 4"));
    }

    #[tokio::test]
    async fn request_window_is_bounded_but_history_is_not() {
        let backend = EchoBackend::default();
        let seen = backend.seen.clone();
        let mut cfg = config();
        cfg.context_window = 3;
        let mut agent = InsightAgent::with_backend(cfg, backend).unwrap();
        let info = silverstone();

        for _ in 0..5 {
            agent.analyze_situation(&info).await.unwrap();
        }

        let seen = seen.lock().unwrap();
        // system + min(history, 3) + new prompt
        let sizes: Vec<usize> = seen.iter().map(Vec::len).collect();
        assert_eq!(sizes, [2, 4, 5, 5, 5]);
        assert!(seen.iter().all(|req| req[0].role == Role::System));
        assert_eq!(agent.history().len(), 10);
    }

    #[tokio::test]
    async fn completion_failure_propagates_and_leaves_history_alone() {
        let mut agent = InsightAgent::with_backend(config(), FailingBackend).unwrap();
        let err = agent.analyze_situation(&silverstone()).await.unwrap_err();
        assert!(matches!(err, PitwallError::Completion(ref m) if m.contains("rate limited")));
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn live_snapshot_flows_from_provider_to_prompt() {
        use pitwall_telemetry::{SimConnector, SnapshotProvider};

        let mut provider = SnapshotProvider::new(SimConnector::demo());
        let mut agent = InsightAgent::with_backend(config(), EchoBackend::default()).unwrap();
        let reply = {
            let mut session = provider.session().await;
            assert!(session.is_live());
            let info = session.racing_info().await;
            agent.analyze_situation(&info).await.unwrap()
        };
        assert!(reply.contains("Silverstone Circuit"));
        assert!(reply.contains("  - lap: 12"));
        assert!(!provider.is_connected());
    }
}
