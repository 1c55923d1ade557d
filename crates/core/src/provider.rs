//! Provider traits — the abstractions over the LLM and STT backends.
//!
//! A [`Provider`] knows how to send an ordered list of prompt entries to a
//! chat-completion API and return one generated text. A [`Transcriber`]
//! turns raw audio bytes into text. Implementations live in
//! `careline-providers`; tests use in-process mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Role;
use crate::error::ProviderError;

/// Role of one entry in an LLM request.
///
/// Superset of the persisted [`Role`]: system entries carry instructions and
/// assembled context but are never stored as conversation turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => PromptRole::User,
            Role::Assistant => PromptRole::Assistant,
        }
    }
}

/// One (role, content) entry in an LLM request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: PromptRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: PromptRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: PromptRole::Assistant, content: content.into() }
    }
}

/// Configuration for a single chat-completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g. "gpt-4").
    pub model: String,

    /// Ordered prompt entries.
    pub messages: Vec<PromptMessage>,

    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,

    /// Cap on generated tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated text.
    pub content: String,

    /// Which model actually responded (may differ from requested).
    pub model: String,

    /// Token usage statistics, when the provider reports them.
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The chat-completion trait.
///
/// The orchestrator calls `complete()` without knowing which backend is in
/// use — pure polymorphism. No retries are attempted at this layer; a
/// failure surfaces as a terminal error for the unit of work.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g. "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError>;
}

/// The speech-to-text trait.
///
/// Callers are responsible for validating the audio format and size before
/// invoking it; the implementation only moves bytes.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio bytes. `filename` carries the extension the
    /// upstream API uses to sniff the container format.
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        language: &str,
    ) -> std::result::Result<String, ProviderError>;
}
