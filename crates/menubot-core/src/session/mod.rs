//! Per-session state: conversation history and greeting artifacts.
//!
//! A session is created the first time something is recorded for its key
//! and removed when the user exits the chat. Keys are `channel:chat_id`.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use tokio::sync::Mutex;
use tracing::debug;

use crate::provider::types::{ChatMessage, Role};

/// Build the session key for a chat on a channel.
pub fn session_key(channel: &str, chat_id: &str) -> String {
    format!("{}:{}", channel, chat_id)
}

/// One conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub key: String,
    pub history: Vec<SessionMessage>,
    /// Transport message id of the greeting shown by `/start`, if any.
    pub greeting: Option<String>,
    pub created_at: DateTime<Local>,
}

/// A single history entry.
#[derive(Debug, Clone)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
}

impl Session {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            history: Vec::new(),
            greeting: None,
            created_at: Local::now(),
        }
    }

    fn push(&mut self, role: Role, content: &str) {
        self.history.push(SessionMessage {
            role,
            content: content.to_string(),
        });
    }

    /// History in the `{role, content}` shape the provider expects.
    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.history
            .iter()
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

/// Process-wide registry of live sessions.
///
/// The lock is only held for the duration of a single operation; callers
/// never keep it across network I/O.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a history entry, creating the session if needed.
    pub async fn append(&self, key: &str, role: Role, content: &str) {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(session = key, "Created session");
                Session::new(key)
            })
            .push(role, content);
    }

    /// Snapshot of a session's history (empty if the session does not exist).
    pub async fn history(&self, key: &str) -> Vec<ChatMessage> {
        self.sessions
            .lock()
            .await
            .get(key)
            .map(Session::chat_history)
            .unwrap_or_default()
    }

    /// Number of history entries for a session.
    pub async fn history_len(&self, key: &str) -> usize {
        self.sessions
            .lock()
            .await
            .get(key)
            .map_or(0, |s| s.history.len())
    }

    /// Record the greeting message shown to a session.
    ///
    /// Returns the previously registered greeting, if any, so the caller
    /// can remove it from the chat.
    pub async fn register_greeting(&self, key: &str, message_id: &str) -> Option<String> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(key.to_string())
            .or_insert_with(|| Session::new(key))
            .greeting
            .replace(message_id.to_string())
    }

    /// Remove a session entirely, returning what it held.
    pub async fn end(&self, key: &str) -> Option<Session> {
        let removed = self.sessions.lock().await.remove(key);
        if let Some(session) = &removed {
            let lasted = Local::now().signed_duration_since(session.created_at);
            debug!(
                session = key,
                messages = session.history.len(),
                seconds = lasted.num_seconds(),
                "Ended session"
            );
        }
        removed
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.sessions.lock().await.contains_key(key)
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_creates_session_and_preserves_order() {
        let store = SessionStore::new();
        assert!(!store.contains("telegram:1").await);

        store.append("telegram:1", Role::User, "hola").await;
        store.append("telegram:1", Role::Assistant, "¡Hola! ¿Qué deseas?").await;

        let history = store.history("telegram:1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatMessage::user("hola"));
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        store.append("telegram:1", Role::User, "uno").await;
        store.append("telegram:2", Role::User, "dos").await;

        assert_eq!(store.history_len("telegram:1").await, 1);
        assert_eq!(store.history("telegram:2").await[0].content, "dos");
        assert!(store.history("telegram:3").await.is_empty());
    }

    #[tokio::test]
    async fn test_register_greeting_returns_previous() {
        let store = SessionStore::new();
        assert_eq!(store.register_greeting("cli:direct", "10").await, None);
        assert_eq!(
            store.register_greeting("cli:direct", "11").await.as_deref(),
            Some("10")
        );
        let ended = store.end("cli:direct").await.unwrap();
        assert_eq!(ended.greeting.as_deref(), Some("11"));
    }

    #[tokio::test]
    async fn test_end_removes_session() {
        let store = SessionStore::new();
        store.append("telegram:1", Role::User, "hola").await;
        store.register_greeting("telegram:1", "42").await;

        let ended = store.end("telegram:1").await.unwrap();
        assert_eq!(ended.greeting.as_deref(), Some("42"));
        assert!(ended.created_at <= Local::now());
        assert_eq!(ended.history.len(), 1);
        assert!(store.is_empty().await);
        assert!(store.end("telegram:1").await.is_none());
    }

    #[test]
    fn test_session_key() {
        assert_eq!(session_key("telegram", "123"), "telegram:123");
    }
}
