use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::Recipient;
use teloxide::RequestError;
use tracing::{debug, info};

use common::config::required_env;
use common::{DeliveryError, Error, MessageSink, Result};

/// Delivers messages to one Telegram chat or channel through the Bot API.
pub struct TelegramSink {
    bot: Bot,
    chat: Recipient,
}

impl TelegramSink {
    pub fn new(token: impl Into<String>, chat: Recipient) -> Self {
        Self {
            bot: Bot::new(token),
            chat,
        }
    }

    /// Build from `TELEGRAM_TOKEN` and `TELEGRAM_CHAT_ID`.
    pub fn from_env() -> Result<Self> {
        let token = required_env("TELEGRAM_TOKEN")?;
        let chat = parse_chat(&required_env("TELEGRAM_CHAT_ID")?)?;
        info!(chat = ?chat, "Telegram delivery configured");
        Ok(Self::new(token, chat))
    }
}

/// A numeric chat id, or a public channel as `@username`.
pub fn parse_chat(raw: &str) -> Result<Recipient> {
    let raw = raw.trim();
    if raw.len() > 1 && raw.starts_with('@') {
        return Ok(Recipient::ChannelUsername(raw.to_string()));
    }
    raw.parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| {
            Error::Config(format!(
                "TELEGRAM_CHAT_ID must be a numeric id or @channel, got '{raw}'"
            ))
        })
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, text: &str) -> std::result::Result<(), DeliveryError> {
        self.bot
            .send_message(self.chat.clone(), text)
            .disable_web_page_preview(true)
            .await
            .map_err(classify)?;
        debug!(chat = ?self.chat, "Message delivered");
        Ok(())
    }
}

/// API refusals (bad token, unknown chat, bad request) are `Rejected`;
/// everything on the transport side is `Unreachable`.
fn classify(e: RequestError) -> DeliveryError {
    match e {
        RequestError::Api(api) => DeliveryError::Rejected(api.to_string()),
        moved @ RequestError::MigrateToChatId(_) => DeliveryError::Rejected(moved.to_string()),
        other => DeliveryError::Unreachable(other.to_string()),
    }
}

/// Prints messages to stdout instead of delivering them. Used for dry runs.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl MessageSink for ConsoleSink {
    async fn send(&self, text: &str) -> std::result::Result<(), DeliveryError> {
        println!("{text}\n");
        Ok(())
    }
}
