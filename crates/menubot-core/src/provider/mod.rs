//! LLM provider trait.
//!
//! Defines the `LlmProvider` trait the conversational fallback talks to.
//! The `openai` module provides an OpenAI-compatible implementation that
//! covers OpenAI itself, OpenRouter, DeepSeek, Groq and local vLLM servers.

pub mod openai;
pub mod types;

use async_trait::async_trait;
use types::{ChatMessage, LlmResponse};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages` - System instruction followed by the conversation history
    /// * `model` - Model identifier override (None = use default)
    /// * `max_tokens` - Maximum response tokens
    /// * `temperature` - Sampling temperature
    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> anyhow::Result<LlmResponse>;

    /// Get the default model identifier.
    fn default_model(&self) -> &str;
}
