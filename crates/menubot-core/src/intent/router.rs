//! Message router: exit check, ordered intent dispatch, fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::fallback::ConversationFallback;
use super::matcher::{self, MatchResult};
use super::patterns::{Classification, Extraction, HandlerId, IntentCatalog};
use super::reply::{ReplySink, TransportReply};
use crate::gateway::Transport;
use crate::session::SessionStore;

pub const FAREWELL_MESSAGE: &str = "Gracias por preferirnos. ¡Hasta pronto 👋! Recuerda que para volver a ingresar \
     puedes presionar el botón de abajo para ejecutar el comando /start.👈";

pub const INVALID_QUANTITY_MESSAGE: &str = "Por favor, proporciona una cantidad válida.";

pub const HANDLER_ERROR_MESSAGE: &str =
    "Lo siento, no pude consultar el menú en este momento. Inténtalo de nuevo más tarde.";

/// Arguments extracted from a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentArgs {
    None,
    Name(String),
    QuantityAndName { quantity: i64, name: String },
}

/// Catalog queries bound to intents.
#[async_trait]
pub trait IntentHandlers: Send + Sync {
    /// Answer `handler` for the extracted arguments through `reply`.
    async fn handle(
        &self,
        handler: HandlerId,
        args: &IntentArgs,
        reply: &dyn ReplySink,
    ) -> anyhow::Result<()>;
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterOutcome {
    /// The user left the chat; the session was torn down.
    Exited,
    /// An intent matched and its handler ran.
    Handled { intent: &'static str },
    /// The quantity capture did not parse; routing stopped.
    InvalidQuantity { raw: String },
    /// No intent matched; the conversational model answered.
    Fallback { reply: String },
}

/// Turn a match into handler arguments.
///
/// The only failure is an unparsable quantity, returned as the raw capture.
pub fn extract_args(extraction: Extraction, m: &MatchResult) -> Result<IntentArgs, String> {
    let capture = |i: usize| m.captures.get(i).map(String::as_str).unwrap_or_default();
    match extraction {
        Extraction::Flag => Ok(IntentArgs::None),
        Extraction::Name | Extraction::StockLookup | Extraction::PriceLookup => {
            Ok(IntentArgs::Name(matcher::clean_name(capture(0))))
        }
        Extraction::QuantityAndName => {
            let raw = capture(0).trim();
            let quantity = raw.parse::<i64>().map_err(|_| raw.to_string())?;
            Ok(IntentArgs::QuantityAndName {
                quantity,
                name: matcher::clean_name(capture(1)),
            })
        }
    }
}

pub struct Router {
    catalog: IntentCatalog,
    handlers: Box<dyn IntentHandlers>,
    fallback: ConversationFallback,
    sessions: Arc<SessionStore>,
}

impl Router {
    pub fn new(
        catalog: IntentCatalog,
        handlers: Box<dyn IntentHandlers>,
        fallback: ConversationFallback,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            catalog,
            handlers,
            fallback,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Route one inbound message for `session_key`, replying through `transport`.
    pub async fn route(
        &self,
        session_key: &str,
        text: &str,
        transport: &dyn Transport,
    ) -> RouterOutcome {
        let normalized = matcher::normalize(text);
        info!(session = session_key, message = %normalized, "Received message");

        let reply = TransportReply::new(transport);

        match self.catalog.classify(&normalized) {
            Classification::Exit => {
                self.exit(session_key, transport).await;
                RouterOutcome::Exited
            }
            Classification::Intent(intent, m) => {
                debug!(intent = intent.name, pattern = %m.pattern, "Pattern matched");

                let args = match extract_args(intent.extraction, &m) {
                    Ok(args) => args,
                    Err(raw) => {
                        warn!(intent = intent.name, quantity = %raw, "Invalid quantity extracted");
                        reply.send(INVALID_QUANTITY_MESSAGE).await;
                        return RouterOutcome::InvalidQuantity { raw };
                    }
                };

                info!(
                    intent = intent.name,
                    handler = %intent.handler,
                    args = ?args,
                    "Handling intent"
                );

                if let Err(e) = self.handlers.handle(intent.handler, &args, &reply).await {
                    error!(intent = intent.name, error = %e, "Intent handler failed");
                    reply.send(HANDLER_ERROR_MESSAGE).await;
                }

                RouterOutcome::Handled {
                    intent: intent.name,
                }
            }
            Classification::NoMatch => {
                let answer = self
                    .fallback
                    .respond(&self.sessions, session_key, &normalized)
                    .await;
                reply.send(&answer).await;
                RouterOutcome::Fallback { reply: answer }
            }
        }
    }

    /// Close the session: drop its state, remove the greeting, say goodbye.
    pub async fn exit(&self, session_key: &str, transport: &dyn Transport) {
        let greeting = self
            .sessions
            .end(session_key)
            .await
            .and_then(|session| session.greeting);

        if let Some(message_id) = greeting {
            if let Err(e) = transport.delete(&message_id).await {
                warn!(session = session_key, error = %e, "Failed to delete greeting message");
            }
        }

        info!(session = session_key, "Session closed by user");
        TransportReply::new(transport).send(FAREWELL_MESSAGE).await;
    }
}
