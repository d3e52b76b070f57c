//! Reply sink handed to intent handlers.

use async_trait::async_trait;
use tracing::error;

use crate::gateway::Transport;

/// Where a handler writes its answer.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Send one reply. Delivery failures are logged, never returned.
    async fn send(&self, text: &str);
}

/// Adapts a chat [`Transport`] to a [`ReplySink`]; built per dispatch.
pub struct TransportReply<'a> {
    transport: &'a dyn Transport,
}

impl<'a> TransportReply<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ReplySink for TransportReply<'_> {
    async fn send(&self, text: &str) {
        if let Err(e) = self.transport.reply(text).await {
            error!(error = %e, "Failed to deliver reply");
        }
    }
}
