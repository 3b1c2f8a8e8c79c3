//! Provider trait: the abstraction over the hosted model endpoint.
//!
//! A Provider knows how to send a short exchange to an LLM and get the
//! complete reply back. Stage agents never talk HTTP themselves.
//!
//! Implementations: OpenAI-compatible endpoints (Groq, OpenAI, vLLM, ...),
//! the retry wrapper, and scripted providers in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "meta-llama/Llama-Guard-4-12B")
    pub model: String,

    /// The exchange messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.1
}

impl ProviderRequest {
    /// A system + user exchange, the shape every stage agent sends.
    pub fn chat(
        model: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: default_temperature(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Insert an extra system message after the existing system messages.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let at = self
            .messages
            .iter()
            .position(|m| m.role != crate::message::Role::System)
            .unwrap_or(self.messages.len());
        self.messages.insert(at, Message::system(context));
        self
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
/// The model client calls `complete()` without knowing which backend is in
/// use, so tests can substitute a scripted provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "groq").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn chat_request_shape() {
        let req = ProviderRequest::chat("guard", "classify", "hello").with_max_tokens(128);
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].role, Role::User);
        assert_eq!(req.max_tokens, Some(128));
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn context_goes_after_system_prompt() {
        let req = ProviderRequest::chat("m", "system prompt", "user text")
            .with_context("Customer ID: 42");
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[0].content, "system prompt");
        assert_eq!(req.messages[1].role, Role::System);
        assert_eq!(req.messages[1].content, "Customer ID: 42");
        assert_eq!(req.messages[2].role, Role::User);
    }

    #[test]
    fn request_serialization_skips_empty_fields() {
        let req = ProviderRequest::chat("m", "s", "u");
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("max_tokens"));
        assert!(!json.contains("stop"));
    }
}
