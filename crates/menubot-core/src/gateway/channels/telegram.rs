use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use tracing::{debug, error, info, warn};

use crate::bus::events::{InboundMessage, OutboundMessage};
use crate::bus::MessageBus;
use crate::gateway::utils::chunk_message;
use crate::session::{session_key, SessionStore};

/// Maximum Telegram message length.
const TELEGRAM_MAX_LEN: usize = 4096;

const CHANNEL: &str = "telegram";

pub const GREETING_MESSAGE: &str = "¡Hola! 👋 Soy el asistente del restaurante. Puedo mostrarte la carta, \
     recomendarte platos, decirte precios y revisar si hay stock. ¿En qué te ayudo?";

/// Inline buttons under the greeting: (label, text routed when pressed).
const GREETING_BUTTONS: &[(&str, &str)] = &[
    ("📋 Ver menú", "ver menú"),
    ("⭐ Producto más vendido", "producto más vendido"),
    ("🥤 Bebida recomendada", "bebida recomendada"),
    ("👋 Salir", "salir"),
];

fn greeting_keyboard() -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = GREETING_BUTTONS
        .iter()
        .map(|(label, data)| vec![InlineKeyboardButton::callback(*label, *data)])
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn is_allowed(allow_from: &[String], user_id: &str) -> bool {
    allow_from.is_empty() || allow_from.iter().any(|id| id == user_id)
}

fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    // Group chats address commands as `/start@botname`.
    command == "/start" || command.starts_with("/start@")
}

pub struct TelegramTransport {
    token: String,
    bus: Arc<MessageBus>,
    sessions: Arc<SessionStore>,
    allow_from: Vec<String>,
}

impl TelegramTransport {
    pub fn new(
        token: String,
        bus: Arc<MessageBus>,
        sessions: Arc<SessionStore>,
        allow_from: Vec<String>,
    ) -> Self {
        Self {
            token,
            bus,
            sessions,
            allow_from,
        }
    }

    pub async fn run(self) -> Result<()> {
        let bot = Bot::new(&self.token);

        info!("Telegram transport started");

        if let Err(e) = bot.delete_webhook().drop_pending_updates(true).send().await {
            warn!("Failed to delete webhook (normal on first startup): {}", e);
        }

        // Subscribe to outbound messages FIRST (before dispatcher starts)
        {
            let bot_out = bot.clone();
            self.bus
                .subscribe_outbound(CHANNEL, move |msg| {
                    let bot_out = bot_out.clone();
                    async move { deliver(&bot_out, msg).await }
                })
                .await;
        }

        let bus = Arc::clone(&self.bus);
        let sessions = Arc::clone(&self.sessions);
        let allow_from = self.allow_from.clone();

        let message_handler = Update::filter_message().endpoint(
            |bot: Bot,
             msg: Message,
             bus: Arc<MessageBus>,
             sessions: Arc<SessionStore>,
             allow_from: Vec<String>| async move {
                let user_id = msg
                    .from
                    .as_ref()
                    .map(|u| u.id.to_string())
                    .unwrap_or_else(|| "unknown".to_owned());

                // Enforce allowFrom ACL
                if !is_allowed(&allow_from, &user_id) {
                    warn!(
                        user_id = user_id,
                        chat_id = msg.chat.id.to_string(),
                        "Rejected message from user not in allowFrom list"
                    );
                    return respond(());
                }

                let Some(text) = msg.text() else {
                    return respond(());
                };

                if is_start_command(text) {
                    send_greeting(&bot, msg.chat.id, &sessions).await;
                    return respond(());
                }

                let inbound = InboundMessage {
                    channel: CHANNEL.to_owned(),
                    chat_id: msg.chat.id.to_string(),
                    user_id,
                    content: text.to_owned(),
                };

                if let Err(e) = bus.inbound_sender().send(inbound).await {
                    error!("Failed to send inbound message to bus: {}", e);
                }
                respond(())
            },
        );

        let callback_handler = Update::filter_callback_query().endpoint(
            |bot: Bot, q: CallbackQuery, bus: Arc<MessageBus>, allow_from: Vec<String>| async move {
                let user_id = q.from.id.to_string();

                // Enforce allowFrom ACL
                if !is_allowed(&allow_from, &user_id) {
                    warn!(user_id, "Rejected callback query from unauthorized user");
                    return respond(());
                }

                if let (Some(data), Some(msg)) = (q.data, q.message) {
                    info!(user_id, data, "Received callback query");

                    // Treat the button data as an inbound message
                    let inbound = InboundMessage {
                        channel: CHANNEL.to_owned(),
                        chat_id: msg.chat().id.to_string(),
                        user_id: user_id.clone(),
                        content: data,
                    };

                    if let Err(e) = bus.inbound_sender().send(inbound).await {
                        error!("Failed to send callback inbound to bus: {}", e);
                    }

                    // Acknowledge the callback query to remove the spinner
                    if let Err(e) = bot.answer_callback_query(q.id).await {
                        debug!("Failed to answer callback query: {}", e);
                    }
                }
                respond(())
            },
        );

        let handler = dptree::entry()
            .branch(message_handler)
            .branch(callback_handler);

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![bus, sessions, allow_from])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

/// Send the greeting with its buttons and remember it as the session's
/// greeting, removing the one sent by an earlier `/start`.
async fn send_greeting(bot: &Bot, chat_id: ChatId, sessions: &SessionStore) {
    let sent = match bot
        .send_message(chat_id, GREETING_MESSAGE)
        .reply_markup(greeting_keyboard())
        .await
    {
        Ok(sent) => sent,
        Err(e) => {
            error!(chat_id = chat_id.to_string(), "Failed to send greeting: {}", e);
            return;
        }
    };

    let key = session_key(CHANNEL, &chat_id.to_string());
    let previous = sessions
        .register_greeting(&key, &sent.id.0.to_string())
        .await;

    if let Some(previous) = previous.and_then(|id| id.parse::<i32>().ok()) {
        if let Err(e) = bot.delete_message(chat_id, MessageId(previous)).await {
            debug!(session = key, "Failed to delete previous greeting: {}", e);
        }
    }
}

/// Deliver one outbound instruction through the Bot API.
async fn deliver(bot: &Bot, msg: OutboundMessage) {
    let Ok(id) = msg.chat_id().parse::<i64>() else {
        warn!(chat_id = msg.chat_id(), "Outbound message for non-numeric Telegram chat");
        return;
    };

    match msg {
        OutboundMessage::Reply { content, .. } => {
            for chunk in chunk_message(&content, TELEGRAM_MAX_LEN) {
                if let Err(e) = bot.send_message(ChatId(id), chunk).await {
                    error!("Failed to send Telegram message: {}", e);
                }
            }
        }
        OutboundMessage::Delete { message_id, .. } => match message_id.parse::<i32>() {
            Ok(message_id) => {
                if let Err(e) = bot.delete_message(ChatId(id), MessageId(message_id)).await {
                    warn!("Failed to delete Telegram message: {}", e);
                }
            }
            Err(_) => warn!(message_id, "Invalid Telegram message id"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_greeting_keyboard_routes_button_text() {
        let keyboard = greeting_keyboard();
        assert_eq!(keyboard.inline_keyboard.len(), GREETING_BUTTONS.len());

        let data: Vec<String> = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(data, vec!["ver menú", "producto más vendido", "bebida recomendada", "salir"]);
    }

    #[test]
    fn test_allow_from() {
        assert!(is_allowed(&[], "123"));
        assert!(is_allowed(&["123".to_string()], "123"));
        assert!(!is_allowed(&["123".to_string()], "456"));
    }

    #[test]
    fn test_start_command() {
        assert!(is_start_command("/start"));
        assert!(is_start_command("/start@menubot"));
        assert!(is_start_command("/start hola"));
        assert!(!is_start_command("/started"));
        assert!(!is_start_command("start"));
    }
}
