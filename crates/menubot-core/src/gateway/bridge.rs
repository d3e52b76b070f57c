use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::BusTransport;
use crate::bus::events::InboundMessage;
use crate::bus::MessageBus;
use crate::intent::Router;

/// How long a session worker waits for another message before exiting.
const WORKER_IDLE: Duration = Duration::from_secs(300);

struct SessionWorker {
    tx: mpsc::UnboundedSender<InboundMessage>,
    handle: JoinHandle<()>,
}

/// Feeds inbound bus messages to the [`Router`].
///
/// Each session key gets one worker task that routes its messages in
/// arrival order; different chats are routed concurrently. Replies land
/// back on the bus for the originating channel and chat.
pub struct RouterBridge {
    bus: Arc<MessageBus>,
    router: Arc<Router>,
    cancel: CancellationToken,
    idle: Duration,
    workers: HashMap<String, SessionWorker>,
}

impl RouterBridge {
    pub fn new(bus: Arc<MessageBus>, router: Arc<Router>, cancel: CancellationToken) -> Self {
        Self {
            bus,
            router,
            cancel,
            idle: WORKER_IDLE,
            workers: HashMap::new(),
        }
    }

    /// Run until the inbound channel closes or the token is cancelled.
    ///
    /// Queued messages of every session are still routed after the loop
    /// stops; their workers exit once drained.
    pub async fn run(mut self, mut inbound_rx: mpsc::Receiver<InboundMessage>) -> anyhow::Result<()> {
        info!("Router bridge started, waiting for inbound messages...");

        loop {
            let msg = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Router bridge cancelled");
                    break;
                }
                msg = inbound_rx.recv() => match msg {
                    Some(msg) => msg,
                    None => {
                        info!("Router bridge shutting down (bus closed)");
                        break;
                    }
                },
            };

            debug!(
                channel = msg.channel,
                chat_id = msg.chat_id,
                user_id = msg.user_id,
                "Bridge received message"
            );

            self.dispatch(msg);
        }

        Ok(())
    }

    /// Hand a message to its session's worker, starting one if needed.
    fn dispatch(&mut self, msg: InboundMessage) {
        self.workers.retain(|_, w| !w.handle.is_finished());

        let key = msg.session_key();
        let msg = match self.workers.get(&key) {
            Some(worker) => match worker.tx.send(msg) {
                Ok(()) => return,
                // Worker went idle and closed its queue.
                Err(mpsc::error::SendError(msg)) => msg,
            },
            None => msg,
        };

        // A closing worker may still be draining; the new one waits for it.
        let previous = self.workers.remove(&key).map(|w| w.handle);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(session_worker(
            Arc::clone(&self.bus),
            Arc::clone(&self.router),
            key.clone(),
            rx,
            previous,
            self.idle,
        ));
        if tx.send(msg).is_err() {
            debug!(session = %key, "Session worker exited before first message");
        }
        self.workers.insert(key, SessionWorker { tx, handle });
    }
}

async fn session_worker(
    bus: Arc<MessageBus>,
    router: Arc<Router>,
    session_key: String,
    mut rx: mpsc::UnboundedReceiver<InboundMessage>,
    previous: Option<JoinHandle<()>>,
    idle: Duration,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }
    debug!(session = %session_key, "Session worker started");

    loop {
        let msg = match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(_) => {
                // Refuse new messages, then finish whatever already queued.
                rx.close();
                while let Some(msg) = rx.recv().await {
                    route_one(&bus, &router, &session_key, msg).await;
                }
                break;
            }
        };
        route_one(&bus, &router, &session_key, msg).await;
    }

    debug!(session = %session_key, "Session worker stopped");
}

async fn route_one(bus: &Arc<MessageBus>, router: &Router, session_key: &str, msg: InboundMessage) {
    let transport = BusTransport::new(Arc::clone(bus), &msg.channel, &msg.chat_id);
    router.route(session_key, &msg.content, &transport).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::events::OutboundMessage;
    use crate::config::AssistantConfig;
    use crate::intent::fallback::tests::ScriptedProvider;
    use crate::intent::router::FAREWELL_MESSAGE;
    use crate::intent::{ConversationFallback, HandlerId, IntentArgs, IntentCatalog, IntentHandlers, ReplySink};
    use crate::provider::types::{ChatMessage, LlmResponse, Role, Usage};
    use crate::provider::LlmProvider;
    use crate::session::SessionStore;
    use async_trait::async_trait;

    struct EchoHandlers;

    #[async_trait]
    impl IntentHandlers for EchoHandlers {
        async fn handle(
            &self,
            handler: HandlerId,
            _args: &IntentArgs,
            reply: &dyn ReplySink,
        ) -> anyhow::Result<()> {
            reply.send(&handler.to_string()).await;
            Ok(())
        }
    }

    /// Answers `r-<last user message>` after a per-message delay.
    struct SlowProvider {
        delays: Vec<(&'static str, u64)>,
    }

    #[async_trait]
    impl LlmProvider for SlowProvider {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _model: Option<&str>,
            _max_tokens: u32,
            _temperature: f32,
        ) -> anyhow::Result<LlmResponse> {
            let last = messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let delay = self
                .delays
                .iter()
                .find(|(text, _)| *text == last)
                .map_or(0, |(_, ms)| *ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(LlmResponse {
                content: Some(format!("r-{last}")),
                finish_reason: "stop".into(),
                usage: Usage::default(),
            })
        }

        fn default_model(&self) -> &str {
            "slow"
        }
    }

    fn router_with(provider: Box<dyn LlmProvider>) -> Arc<Router> {
        let fallback = ConversationFallback::new(provider, &AssistantConfig::default());
        Arc::new(Router::new(
            IntentCatalog::new().unwrap(),
            Box::new(EchoHandlers),
            fallback,
            Arc::new(SessionStore::new()),
        ))
    }

    fn router() -> Arc<Router> {
        router_with(Box::new(ScriptedProvider::replying("¡Buenas!")))
    }

    fn slow_router(delays: Vec<(&'static str, u64)>) -> Arc<Router> {
        router_with(Box::new(SlowProvider { delays }))
    }

    fn telegram(chat_id: &str, content: &str) -> InboundMessage {
        InboundMessage {
            channel: "telegram".into(),
            chat_id: chat_id.into(),
            user_id: "1".into(),
            content: content.into(),
        }
    }

    async fn next_reply(rx: &mut mpsc::Receiver<OutboundMessage>) -> (String, String) {
        match rx.recv().await.unwrap() {
            OutboundMessage::Reply { chat_id, content, .. } => (chat_id, content),
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bridge_routes_and_publishes_reply() {
        let (bus, mut receivers) = MessageBus::new(8);
        let bus = Arc::new(bus);
        let inbound = bus.inbound_sender();
        let cancel = CancellationToken::new();

        let bridge = RouterBridge::new(Arc::clone(&bus), router(), cancel.clone());
        let handle = tokio::spawn(bridge.run(receivers.inbound_rx));

        inbound
            .send(InboundMessage {
                channel: "telegram".into(),
                chat_id: "42".into(),
                user_id: "1".into(),
                content: "ver menú".into(),
            })
            .await
            .unwrap();

        match receivers.outbound_rx.recv().await.unwrap() {
            OutboundMessage::Reply { channel, chat_id, content } => {
                assert_eq!(channel, "telegram");
                assert_eq!(chat_id, "42");
                assert_eq!(content, "show_categories");
            }
            other => panic!("expected reply, got {other:?}"),
        }

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bridge_stops_when_inbound_closes() {
        let (bus, receivers) = MessageBus::new(8);
        let bus = Arc::new(bus);
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        drop(receivers.inbound_rx);

        let bridge = RouterBridge::new(bus, router(), CancellationToken::new());
        bridge.run(rx).await.unwrap();
    }

    #[tokio::test]
    async fn test_same_session_is_routed_in_order() {
        let (bus, mut receivers) = MessageBus::new(8);
        let bus = Arc::new(bus);
        let inbound = bus.inbound_sender();
        let router = slow_router(vec![("primero", 200), ("gracias", 10)]);
        let cancel = CancellationToken::new();

        let bridge = RouterBridge::new(Arc::clone(&bus), Arc::clone(&router), cancel.clone());
        let handle = tokio::spawn(bridge.run(receivers.inbound_rx));

        inbound.send(telegram("1", "primero")).await.unwrap();
        inbound.send(telegram("1", "gracias")).await.unwrap();

        assert_eq!(next_reply(&mut receivers.outbound_rx).await.1, "r-primero");
        assert_eq!(next_reply(&mut receivers.outbound_rx).await.1, "r-gracias");
        assert_eq!(
            router.sessions().history("telegram:1").await,
            vec![
                ChatMessage::user("primero"),
                ChatMessage::assistant("r-primero"),
                ChatMessage::user("gracias"),
                ChatMessage::assistant("r-gracias"),
            ]
        );

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_exit_waits_for_pending_reply() {
        let (bus, mut receivers) = MessageBus::new(8);
        let bus = Arc::new(bus);
        let inbound = bus.inbound_sender();
        let router = slow_router(vec![("hola", 200)]);
        let cancel = CancellationToken::new();

        let bridge = RouterBridge::new(Arc::clone(&bus), Arc::clone(&router), cancel.clone());
        let handle = tokio::spawn(bridge.run(receivers.inbound_rx));

        inbound.send(telegram("1", "hola")).await.unwrap();
        inbound.send(telegram("1", "salir")).await.unwrap();

        assert_eq!(next_reply(&mut receivers.outbound_rx).await.1, "r-hola");
        assert_eq!(next_reply(&mut receivers.outbound_rx).await.1, FAREWELL_MESSAGE);
        assert!(!router.sessions().contains("telegram:1").await);
        assert!(router.sessions().is_empty().await);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_slow_chat_does_not_block_others() {
        let (bus, mut receivers) = MessageBus::new(8);
        let bus = Arc::new(bus);
        let inbound = bus.inbound_sender();
        let router = slow_router(vec![("primero", 300)]);
        let cancel = CancellationToken::new();

        let bridge = RouterBridge::new(Arc::clone(&bus), router, cancel.clone());
        let handle = tokio::spawn(bridge.run(receivers.inbound_rx));

        inbound.send(telegram("1", "primero")).await.unwrap();
        inbound.send(telegram("2", "gracias")).await.unwrap();

        assert_eq!(
            next_reply(&mut receivers.outbound_rx).await,
            ("2".to_string(), "r-gracias".to_string())
        );
        assert_eq!(
            next_reply(&mut receivers.outbound_rx).await,
            ("1".to_string(), "r-primero".to_string())
        );

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_idle_worker_is_replaced() {
        let (bus, mut receivers) = MessageBus::new(8);
        let bus = Arc::new(bus);
        let inbound = bus.inbound_sender();
        let router = slow_router(Vec::new());
        let cancel = CancellationToken::new();

        let mut bridge = RouterBridge::new(Arc::clone(&bus), Arc::clone(&router), cancel.clone());
        bridge.idle = Duration::from_millis(20);
        let handle = tokio::spawn(bridge.run(receivers.inbound_rx));

        inbound.send(telegram("1", "primero")).await.unwrap();
        assert_eq!(next_reply(&mut receivers.outbound_rx).await.1, "r-primero");

        tokio::time::sleep(Duration::from_millis(100)).await;

        inbound.send(telegram("1", "gracias")).await.unwrap();
        assert_eq!(next_reply(&mut receivers.outbound_rx).await.1, "r-gracias");
        assert_eq!(router.sessions().history_len("telegram:1").await, 4);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
