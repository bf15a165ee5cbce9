//! Provider trait: the capability every text-generation backend exposes.
//!
//! A Provider knows how to send a message sequence to one external service
//! and get text back. Failures come back as a [`ProviderError`] whose
//! [`kind`](ProviderError::kind) tells the retry layer whether another
//! attempt can help.
//!
//! Implementations: OpenAI-compatible endpoints and Anthropic's native API
//! (see `helix-providers`), plus scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// A single outbound request to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini", "claude-3-5-haiku-latest")
    pub model: String,

    /// The conversation messages, oldest first
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum response size, taken from the backend descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// The prompt is the content of the final message.
    pub fn prompt(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }

    /// A request is well-formed when it ends in a non-blank prompt.
    pub fn is_well_formed(&self) -> bool {
        self.prompt().is_some_and(|p| !p.trim().is_empty())
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The orchestrator iterates an ordered list of these and never branches on
/// the backend name.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn send(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;
}
