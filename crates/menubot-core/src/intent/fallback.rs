//! Conversational fallback for messages no intent recognizes.
//!
//! Every call appends the user's turn to the session history, sends the
//! fixed system instruction plus the whole history to the provider and, on
//! success, appends the assistant's reply. A failed call leaves only the
//! user's turn behind and yields a canned apology.

use tracing::{debug, error};

use crate::config::AssistantConfig;
use crate::provider::types::{ChatMessage, Role};
use crate::provider::LlmProvider;
use crate::session::SessionStore;

/// Reply used whenever the provider call fails.
pub const APOLOGY_MESSAGE: &str = "Lo siento, algo salió mal al procesar tu solicitud.";

pub struct ConversationFallback {
    provider: Box<dyn LlmProvider>,
    system: ChatMessage,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ConversationFallback {
    /// Build the bridge; the system instruction is assembled once here.
    pub fn new(provider: Box<dyn LlmProvider>, config: &AssistantConfig) -> Self {
        Self {
            provider,
            system: ChatMessage::system(&config.system_instruction()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Answer `text` for the session, recording both turns on success.
    pub async fn respond(&self, sessions: &SessionStore, session_key: &str, text: &str) -> String {
        sessions.append(session_key, Role::User, text).await;

        let mut messages = Vec::with_capacity(1 + sessions.history_len(session_key).await);
        messages.push(self.system.clone());
        messages.extend(sessions.history(session_key).await);

        debug!(
            session = session_key,
            msg_count = messages.len(),
            "Forwarding message to conversational model"
        );

        let result = self
            .provider
            .chat(&messages, Some(&self.model), self.max_tokens, self.temperature)
            .await;

        match result {
            Ok(response) => match response.content.as_deref().map(str::trim) {
                Some(reply) if !reply.is_empty() => {
                    sessions.append(session_key, Role::Assistant, reply).await;
                    reply.to_string()
                }
                _ => {
                    error!(
                        session = session_key,
                        finish_reason = %response.finish_reason,
                        "Conversational model returned no content"
                    );
                    APOLOGY_MESSAGE.to_string()
                }
            },
            Err(e) => {
                error!(session = session_key, error = %e, "Error generating response");
                APOLOGY_MESSAGE.to_string()
            }
        }
    }
}
