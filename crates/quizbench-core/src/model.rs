use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::message::Message;

/// Options controlling a ChatModel invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallOptions {
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Stop sequences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

/// Result of a chat model generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    /// The generated message.
    pub message: Message,
}

/// Trait for chat language models.
///
/// Implementations handle API communication, request formatting, and response
/// parsing for a specific provider. `generate_constrained` is the structural
/// guarantee the few-shot stage relies on: the returned token is always a
/// member of the allowed set, so callers never parse free-form text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a response for the given messages.
    async fn generate(&self, messages: &[Message], options: &CallOptions) -> Result<ChatResult>;

    /// Generate exactly one token drawn from `allowed`.
    ///
    /// Implementations must reject an empty allowed set and must never return
    /// a token outside it.
    async fn generate_constrained(
        &self,
        messages: &[Message],
        allowed: &[String],
    ) -> Result<String>;

    /// Return the model name/identifier.
    fn model_name(&self) -> &str;
}

/// Shared guard for constrained generation: an empty alphabet is a caller bug
/// surfaced as an invalid-response error rather than undefined behavior.
pub fn check_allowed_tokens(allowed: &[String]) -> Result<()> {
    if allowed.is_empty() {
        return Err(ModelError::InvalidResponse("empty allowed token set".into()).into());
    }
    Ok(())
}
