//! Telegram Bot channel: long polling for commands and button presses,
//! Markdown messages with inline keyboards for notifications.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::Stream;
use lessonbell_core::config::TelegramSettings;
use lessonbell_core::error::{LessonBellError, Result};
use lessonbell_core::traits::Channel;
use lessonbell_core::types::{IncomingKind, IncomingMessage, InlineButton, OutgoingMessage};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    #[serde(default = "default_long_poll")]
    pub long_poll_timeout: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_poll_interval() -> u64 {
    1
}
fn default_long_poll() -> u64 {
    30
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

impl From<&TelegramSettings> for TelegramConfig {
    fn from(settings: &TelegramSettings) -> Self {
        Self {
            bot_token: settings.bot_token.clone(),
            poll_interval: settings.poll_interval,
            long_poll_timeout: default_long_poll(),
            api_base: default_api_base(),
        }
    }
}

/// Telegram Bot channel. Cheap to clone; clones share the HTTP client.
#[derive(Clone)]
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| LessonBellError::Channel(format!("Telegram {method} failed: {e}")))?;

        let body: TelegramApiResponse<T> = response.json().await.map_err(|e| {
            LessonBellError::Channel(format!("Invalid Telegram {method} response: {e}"))
        })?;
        body.into_result(method)
    }

    /// Get updates after `offset` using long polling.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.config.long_poll_timeout,
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &body).await
    }

    /// Send a Markdown message, with an inline keyboard when buttons are given.
    pub async fn send_message(&self, chat_id: i64, text: &str, buttons: &[InlineButton]) -> Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(markup) = reply_markup(buttons) {
            body["reply_markup"] = markup;
        }
        self.call::<serde_json::Value>("sendMessage", &body).await?;
        Ok(())
    }

    /// Answer a callback query so the client stops its loading spinner.
    pub async fn answer_callback_query(&self, query_id: &str, text: Option<&str>) -> Result<()> {
        let mut body = serde_json::json!({ "callback_query_id": query_id });
        if let Some(text) = text {
            body["text"] = text.into();
        }
        self.call::<bool>("answerCallbackQuery", &body).await?;
        Ok(())
    }

    /// Drop the inline keyboard of a sent message.
    pub async fn clear_reply_markup(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "reply_markup": { "inline_keyboard": [] },
        });
        self.call::<serde_json::Value>("editMessageReplyMarkup", &body)
            .await?;
        Ok(())
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Start the polling loop. Returns a stream of incoming messages and
    /// button presses. The loop ends when the stream is dropped.
    pub fn start_polling(&self) -> TelegramPollingStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let channel = self.clone();

        tokio::spawn(async move {
            let mut offset = 0;
            tracing::info!("Telegram polling loop started");

            loop {
                match channel.get_updates(offset).await {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            if let Some(msg) = update.to_incoming()
                                && tx.send(msg).is_err()
                            {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    }
                }
                if tx.is_closed() {
                    tracing::info!("Telegram polling stopped (receiver dropped)");
                    return;
                }

                tokio::time::sleep(tokio::time::Duration::from_secs(
                    channel.config.poll_interval,
                ))
                .await;
            }
        });

        TelegramPollingStream { rx }
    }
}

fn parse_chat_id(thread_id: &str) -> Result<i64> {
    thread_id
        .parse()
        .map_err(|_| LessonBellError::Channel(format!("Invalid chat_id '{thread_id}'")))
}

/// One-button-per-row inline keyboard, or `None` for no buttons.
fn reply_markup(buttons: &[InlineButton]) -> Option<serde_json::Value> {
    if buttons.is_empty() {
        return None;
    }
    let rows: Vec<serde_json::Value> = buttons
        .iter()
        .map(|b| serde_json::json!([{ "text": b.label, "callback_data": b.data }]))
        .collect();
    Some(serde_json::json!({ "inline_keyboard": rows }))
}

/// Stream of incoming Telegram updates from polling.
pub struct TelegramPollingStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<IncomingMessage>,
}

impl Stream for TelegramPollingStream {
    type Item = IncomingMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        let chat_id = parse_chat_id(&message.thread_id)?;
        self.send_message(chat_id, &message.content, &message.buttons)
            .await
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result<()> {
        self.answer_callback_query(query_id, text).await
    }

    async fn clear_buttons(&self, thread_id: &str, message_id: i64) -> Result<()> {
        self.clear_reply_markup(parse_chat_id(thread_id)?, message_id)
            .await
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TelegramApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if !self.ok {
            return Err(LessonBellError::Channel(format!(
                "Telegram API error in {method}: {}",
                self.description.unwrap_or_default()
            )));
        }
        self.result
            .ok_or_else(|| LessonBellError::Channel(format!("Empty Telegram {method} result")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub message: Option<TelegramMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl TelegramUser {
    fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

impl TelegramUpdate {
    /// Convert to a LessonBell IncomingMessage. Bot senders and updates
    /// without text or callback data are skipped.
    pub fn to_incoming(&self) -> Option<IncomingMessage> {
        if let Some(query) = &self.callback_query {
            return callback_to_incoming(query);
        }
        let msg = self.message.as_ref()?;
        let text = msg.text.as_ref()?;
        let from = msg.from.as_ref()?;
        if from.is_bot {
            return None;
        }

        Some(IncomingMessage {
            channel: "telegram".into(),
            thread_id: msg.chat.id.to_string(),
            sender_id: from.id.to_string(),
            sender_name: Some(from.display_name()),
            content: text.clone(),
            kind: IncomingKind::Text,
            timestamp: Utc
                .timestamp_opt(msg.date, 0)
                .single()
                .unwrap_or_else(Utc::now),
        })
    }
}

fn callback_to_incoming(query: &TelegramCallbackQuery) -> Option<IncomingMessage> {
    let data = query.data.as_ref()?;
    if query.from.is_bot {
        return None;
    }
    // Presses on messages too old for Telegram to include still come from the user's chat.
    let thread_id = query
        .message
        .as_ref()
        .map(|m| m.chat.id)
        .unwrap_or(query.from.id);

    Some(IncomingMessage {
        channel: "telegram".into(),
        thread_id: thread_id.to_string(),
        sender_id: query.from.id.to_string(),
        sender_name: Some(query.from.display_name()),
        content: data.clone(),
        kind: IncomingKind::Callback {
            query_id: query.id.clone(),
            message_id: query.message.as_ref().map(|m| m.message_id),
        },
        timestamp: Utc::now(),
    })
}
