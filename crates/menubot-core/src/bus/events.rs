//! Message bus event types.
//!
//! Defines the messages that flow between chat channels and the router.

/// An inbound message from a chat channel.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Source channel identifier (e.g., "telegram", "cli").
    pub channel: String,
    /// Chat/conversation identifier within the channel.
    pub chat_id: String,
    /// User identifier.
    pub user_id: String,
    /// Message text content.
    pub content: String,
}

impl InboundMessage {
    /// Create a simple CLI inbound message.
    pub fn cli(content: &str) -> Self {
        Self {
            channel: "cli".into(),
            chat_id: "direct".into(),
            user_id: "user".into(),
            content: content.into(),
        }
    }

    /// Key of the session this message belongs to.
    pub fn session_key(&self) -> String {
        crate::session::session_key(&self.channel, &self.chat_id)
    }
}

/// An outbound instruction for a chat channel.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Send a text message.
    Reply {
        channel: String,
        chat_id: String,
        content: String,
    },
    /// Delete a message the channel sent earlier (e.g. the greeting).
    Delete {
        channel: String,
        chat_id: String,
        message_id: String,
    },
}

impl OutboundMessage {
    pub fn reply(channel: impl Into<String>, chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Reply {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
        }
    }

    pub fn delete(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self::Delete {
            channel: channel.into(),
            chat_id: chat_id.into(),
            message_id: message_id.into(),
        }
    }

    /// Extract the channel name regardless of variant.
    pub fn channel(&self) -> &str {
        match self {
            Self::Reply { channel, .. } | Self::Delete { channel, .. } => channel,
        }
    }

    /// Extract the chat_id regardless of variant.
    pub fn chat_id(&self) -> &str {
        match self {
            Self::Reply { chat_id, .. } | Self::Delete { chat_id, .. } => chat_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_variant() {
        let msg = OutboundMessage::reply("telegram", "chat123", "¡Hola!");
        assert_eq!(msg.channel(), "telegram");
        assert_eq!(msg.chat_id(), "chat123");
        assert!(matches!(msg, OutboundMessage::Reply { .. }));
    }

    #[test]
    fn test_delete_variant() {
        let msg = OutboundMessage::delete("telegram", "chat123", "55");
        assert_eq!(msg.chat_id(), "chat123");
        assert!(matches!(msg, OutboundMessage::Delete { ref message_id, .. } if message_id == "55"));
    }

    #[test]
    fn test_inbound_session_key() {
        assert_eq!(InboundMessage::cli("hola").session_key(), "cli:direct");
    }
}
