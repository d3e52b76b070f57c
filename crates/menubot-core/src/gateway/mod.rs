//! Gateway: chat transports and the bridge that feeds them to the router.

pub mod bridge;
pub mod channels;
pub mod utils;

use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::events::OutboundMessage;
use crate::bus::MessageBus;

pub use bridge::RouterBridge;

/// Outbound side of one chat, as seen by the router.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message to the chat.
    async fn reply(&self, text: &str) -> anyhow::Result<()>;

    /// Remove a previously sent message from the chat.
    async fn delete(&self, message_id: &str) -> anyhow::Result<()>;
}

/// Transport that publishes to the message bus for a channel to deliver.
pub struct BusTransport {
    bus: Arc<MessageBus>,
    channel: String,
    chat_id: String,
}

impl BusTransport {
    pub fn new(bus: Arc<MessageBus>, channel: &str, chat_id: &str) -> Self {
        Self {
            bus,
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl Transport for BusTransport {
    async fn reply(&self, text: &str) -> anyhow::Result<()> {
        self.bus
            .publish_outbound(OutboundMessage::reply(&self.channel, &self.chat_id, text))
            .await
    }

    async fn delete(&self, message_id: &str) -> anyhow::Result<()> {
        self.bus
            .publish_outbound(OutboundMessage::delete(&self.channel, &self.chat_id, message_id))
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Transport that keeps everything it is asked to do.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        replies: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
        fail_deletes: AtomicBool,
    }

    impl RecordingTransport {
        pub(crate) fn replies(&self) -> Vec<String> {
            self.replies.lock().unwrap().clone()
        }

        pub(crate) fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }

        pub(crate) fn fail_deletes(&self) {
            self.fail_deletes.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn reply(&self, text: &str) -> anyhow::Result<()> {
            self.replies.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn delete(&self, message_id: &str) -> anyhow::Result<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                anyhow::bail!("message to delete not found");
            }
            self.deleted.lock().unwrap().push(message_id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_bus_transport_publishes_reply_and_delete() {
        let (bus, mut receivers) = MessageBus::new(8);
        let transport = BusTransport::new(Arc::new(bus), "telegram", "42");

        transport.reply("hola").await.unwrap();
        transport.delete("7").await.unwrap();

        match receivers.outbound_rx.recv().await.unwrap() {
            OutboundMessage::Reply { chat_id, content, .. } => {
                assert_eq!(chat_id, "42");
                assert_eq!(content, "hola");
            }
            other => panic!("expected reply, got {other:?}"),
        }
        assert!(matches!(
            receivers.outbound_rx.recv().await.unwrap(),
            OutboundMessage::Delete { message_id, .. } if message_id == "7"
        ));
    }
}
