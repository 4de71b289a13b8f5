//! Telegram Bot API transport.
//!
//! Long-polls `getUpdates` for text messages and delivers [`Reply`] screens
//! with `sendMessage` / `sendPhoto`.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use reqwest::Client;
use rpg_shared::{Keyboard, Reply};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::game::{Game, InboundMessage, Outgoing};

/// Seconds a `getUpdates` call may hang waiting for messages
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll
const RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram api error: {description}")]
    Api { description: String },
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

impl Update {
    /// The text message carried by this update, if any
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let text = message.text?;
        let user_id = message.from.map(|user| user.id).unwrap_or(message.chat.id);
        Some(InboundMessage {
            user_id,
            chat_id: message.chat.id,
            text,
        })
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
enum ReplyMarkup {
    Keyboard {
        keyboard: Vec<Vec<KeyboardButton>>,
        resize_keyboard: bool,
    },
    Remove {
        remove_keyboard: bool,
    },
}

#[derive(Debug, Serialize, PartialEq)]
struct KeyboardButton {
    text: String,
}

impl From<&Keyboard> for ReplyMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        match keyboard {
            Keyboard::Buttons(rows) => ReplyMarkup::Keyboard {
                keyboard: rows
                    .iter()
                    .map(|row| row.iter().map(|label| KeyboardButton { text: label.clone() }).collect())
                    .collect(),
                resize_keyboard: true,
            },
            Keyboard::Remove => ReplyMarkup::Remove { remove_keyboard: true },
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

#[derive(Debug, Serialize)]
struct SendPhoto<'a> {
    chat_id: i64,
    photo: &'a str,
    caption: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

// =============================================================================
// Client
// =============================================================================

/// Client for the Telegram Bot API
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &impl Serialize) -> Result<T, TransportError> {
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TransportError::Api {
                description: response.description.unwrap_or_else(|| format!("{} failed", method)),
            }),
        }
    }

    /// Long poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    /// Switch to polling, optionally discarding updates that queued up while offline
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), TransportError> {
        self.call::<bool>(
            "deleteWebhook",
            &serde_json::json!({ "drop_pending_updates": drop_pending_updates }),
        )
        .await
        .map(|_| ())
    }

    /// Deliver one screen. A photo Telegram refuses is resent as plain text.
    pub async fn send(&self, chat_id: i64, reply: &Reply) -> Result<(), TransportError> {
        let reply_markup = reply.keyboard().map(ReplyMarkup::from);
        match reply {
            Reply::Text { text, .. } => self.send_message(chat_id, text, reply_markup).await,
            Reply::Photo { image, caption, .. } => {
                let body = SendPhoto {
                    chat_id,
                    photo: image,
                    caption,
                    reply_markup,
                };
                match self.call::<serde_json::Value>("sendPhoto", &body).await {
                    Ok(_) => Ok(()),
                    Err(TransportError::Api { description }) => {
                        warn!("sendPhoto to {} refused ({}), falling back to text", chat_id, description);
                        let reply_markup = reply.keyboard().map(ReplyMarkup::from);
                        self.send_message(chat_id, caption, reply_markup).await
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn send_message(&self, chat_id: i64, text: &str, reply_markup: Option<ReplyMarkup>) -> Result<(), TransportError> {
        let body = SendMessage {
            chat_id,
            text,
            reply_markup,
        };
        self.call::<serde_json::Value>("sendMessage", &body).await.map(|_| ())
    }
}

// =============================================================================
// Loops
// =============================================================================

/// Poll forever, handing every text message to the game on its own task
pub async fn run_polling(client: TelegramClient, game: Arc<Game>) {
    let mut offset = 0;
    info!("Polling Telegram for updates");

    loop {
        let updates = match client.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.into_inbound() else {
                continue;
            };
            debug!("Message from {}: {}", message.user_id, message.text);
            let game = game.clone();
            tokio::spawn(async move {
                game.handle_message(message).await;
            });
        }
    }
}

/// Drain the outbox until every sender is gone
pub async fn run_outbox(client: TelegramClient, mut outbox: mpsc::UnboundedReceiver<Outgoing>) {
    while let Some(Outgoing { chat_id, reply }) = outbox.recv().await {
        if let Err(e) = client.send(chat_id, &reply).await {
            error!("Failed to deliver reply to chat {}: {}", chat_id, e);
        }
    }
    info!("Outbox closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_into_inbound() {
        let updates: Vec<Update> = serde_json::from_value(json!([
            {"update_id": 7, "message": {"chat": {"id": 100}, "from": {"id": 5}, "text": "/start"}},
            {"update_id": 8, "message": {"chat": {"id": 100}, "from": {"id": 5}}},
            {"update_id": 9}
        ]))
        .unwrap();

        let inbound: Vec<InboundMessage> = updates.into_iter().filter_map(Update::into_inbound).collect();
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].user_id, 5);
        assert_eq!(inbound[0].chat_id, 100);
        assert_eq!(inbound[0].text, "/start");
    }

    #[test]
    fn test_reply_markup_json() {
        let keyboard = Keyboard::grid(["a", "b", "c"], 2);
        assert_eq!(
            serde_json::to_value(ReplyMarkup::from(&keyboard)).unwrap(),
            json!({
                "keyboard": [[{"text": "a"}, {"text": "b"}], [{"text": "c"}]],
                "resize_keyboard": true
            })
        );
        assert_eq!(
            serde_json::to_value(ReplyMarkup::from(&Keyboard::Remove)).unwrap(),
            json!({"remove_keyboard": true})
        );
    }

    #[test]
    fn test_send_message_omits_missing_markup() {
        let body = SendMessage {
            chat_id: 1,
            text: "hi",
            reply_markup: None,
        };
        assert_eq!(serde_json::to_value(body).unwrap(), json!({"chat_id": 1, "text": "hi"}));
    }
}
