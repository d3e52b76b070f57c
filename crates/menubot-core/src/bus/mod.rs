//! Async message bus between chat channels and the router.
//!
//! Channels push inbound messages; the router bridge consumes them.
//! Replies and deletions flow back through the outbound channel to the
//! subscriber registered for each chat channel.
//!
//! Subscribers live in a shared `Arc<RwLock>` map so the outbound
//! dispatch loop runs without holding the bus itself.

pub mod events;

use anyhow::Context;
use events::{InboundMessage, OutboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error};

/// Time allowed for one subscriber to handle one outbound message.
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback type for outbound message subscribers.
type OutboundCallback =
    Box<dyn Fn(OutboundMessage) -> futures::future::BoxFuture<'static, ()> + Send + Sync>;

/// Subscriber map shared between the bus and the dispatch loop.
pub type SubscriberMap = Arc<RwLock<HashMap<String, Vec<OutboundCallback>>>>;

pub struct MessageBus {
    inbound_tx: mpsc::Sender<InboundMessage>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    subscribers: SubscriberMap,
}

pub struct MessageBusReceivers {
    pub inbound_rx: mpsc::Receiver<InboundMessage>,
    pub outbound_rx: mpsc::Receiver<OutboundMessage>,
}

impl MessageBus {
    /// Create a new message bus with the given channel capacity.
    pub fn new(capacity: usize) -> (Self, MessageBusReceivers) {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);

        (
            Self {
                inbound_tx,
                outbound_tx,
                subscribers: Arc::new(RwLock::new(HashMap::new())),
            },
            MessageBusReceivers {
                inbound_rx,
                outbound_rx,
            },
        )
    }

    /// Get a cloneable sender for publishing inbound messages.
    pub fn inbound_sender(&self) -> mpsc::Sender<InboundMessage> {
        self.inbound_tx.clone()
    }

    /// Publish an outbound message.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> anyhow::Result<()> {
        self.outbound_tx
            .send(msg)
            .await
            .context("Outbound channel closed")
    }

    /// Get a clone of the subscriber map for use in dispatch or registration.
    pub fn subscribers(&self) -> SubscriberMap {
        Arc::clone(&self.subscribers)
    }

    /// Subscribe to outbound messages for a specific channel.
    pub async fn subscribe_outbound<F, Fut>(&self, channel: &str, callback: F)
    where
        F: Fn(OutboundMessage) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let boxed: OutboundCallback = Box::new(move |msg| Box::pin(callback(msg)));
        let mut subs = self.subscribers.write().await;
        subs.entry(channel.to_string()).or_default().push(boxed);
    }
}

/// Dispatch outbound messages to subscribers.
///
/// Holds only the shared subscriber map; run it via `tokio::spawn`.
pub async fn dispatch_outbound(
    subscribers: SubscriberMap,
    mut outbound_rx: mpsc::Receiver<OutboundMessage>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        let subs = subscribers.read().await;
        if let Some(callbacks) = subs.get(msg.channel()) {
            for callback in callbacks {
                let fut = callback(msg.clone());
                if let Err(e) = tokio::time::timeout(DISPATCH_TIMEOUT, fut).await {
                    error!(channel = msg.channel(), "Outbound dispatch timed out: {}", e);
                }
            }
        } else {
            debug!(channel = msg.channel(), "No subscribers for outbound message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inbound_send_receive() {
        let (bus, mut receivers) = MessageBus::new(16);
        let tx = bus.inbound_sender();

        tx.send(InboundMessage::cli("ver menú")).await.unwrap();

        let msg = receivers.inbound_rx.recv().await.unwrap();
        assert_eq!(msg.content, "ver menú");
        assert_eq!(msg.channel, "cli");
    }

    #[tokio::test]
    async fn test_outbound_dispatch_to_subscriber() {
        let (bus, receivers) = MessageBus::new(16);

        let received = Arc::new(RwLock::new(Vec::<OutboundMessage>::new()));
        let received_clone = Arc::clone(&received);

        bus.subscribe_outbound("telegram", move |msg| {
            let captured = Arc::clone(&received_clone);
            async move {
                captured.write().await.push(msg);
            }
        })
        .await;

        let dispatch_handle = tokio::spawn(dispatch_outbound(bus.subscribers(), receivers.outbound_rx));

        bus.publish_outbound(OutboundMessage::reply("telegram", "chat1", "¡Hola!"))
            .await
            .unwrap();
        bus.publish_outbound(OutboundMessage::delete("telegram", "chat1", "12"))
            .await
            .unwrap();
        // Not subscribed: dropped.
        bus.publish_outbound(OutboundMessage::reply("discord", "chat1", "ignored"))
            .await
            .unwrap();

        drop(bus); // closes the outbound channel, so dispatch finishes
        dispatch_handle.await.unwrap();

        let msgs = received.read().await;
        assert_eq!(msgs.len(), 2);
        assert!(matches!(&msgs[0], OutboundMessage::Reply { content, .. } if content == "¡Hola!"));
        assert!(matches!(&msgs[1], OutboundMessage::Delete { message_id, .. } if message_id == "12"));
    }

    #[tokio::test]
    async fn test_publish_after_receiver_dropped_fails() {
        let (bus, receivers) = MessageBus::new(1);
        drop(receivers);
        assert!(bus
            .publish_outbound(OutboundMessage::reply("cli", "direct", "hola"))
            .await
            .is_err());
    }
}
