//! `pitwall-agent` – the insight agent.
//!
//! Formats racing snapshots into prompts, sends them to an OpenAI-compatible
//! chat-completion API, and keeps the resulting conversation.
//!
//! # Modules
//!
//! - [`insight`] – [`InsightAgent`][insight::InsightAgent]: construction-time
//!   credential check, `analyze_situation` / `ask_question`, and the
//!   append-only conversation history.
//! - [`llm_driver`] – [`LlmDriver`][llm_driver::LlmDriver], an async HTTP
//!   client for `/v1/chat/completions`, behind the
//!   [`CompletionBackend`][llm_driver::CompletionBackend] trait.
//! - [`prompt`] – deterministic prompt assembly from
//!   [`RacingInfo`][pitwall_types::RacingInfo].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod insight;
pub mod llm_driver;
pub mod prompt;
pub mod telemetry;

pub use insight::{API_KEY_VAR, AgentConfig, DEFAULT_BASE_URL, InsightAgent};
pub use llm_driver::{ChatMessage, CompletionBackend, CompletionRequest, LlmDriver, LlmError, Role};
pub use telemetry::{TracerProviderGuard, init_tracing};
