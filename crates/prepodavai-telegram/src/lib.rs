// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram delivery channel for the PrepodavAI pipeline.
//!
//! Implements [`DeliveryChannel`] for the Telegram Bot API via teloxide. The
//! adapter is outbound only: results are pushed to the user's private chat.
//! [`initdata`] verifies Mini App launch parameters for the gateway.

pub mod errors;
pub mod initdata;

use async_trait::async_trait;
use prepodavai_config::model::TelegramConfig;
use prepodavai_core::{
    AdapterType, DeliveryChannel, DocumentSource, HealthStatus, MessageId, PluginAdapter,
    PrepodavaiError,
};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile};
use tracing::debug;

pub use errors::classify;
pub use initdata::{InitData, InitDataError, TelegramUser, sign_init_data, verify_init_data};

/// Telegram caption limit for photos and documents.
pub const MAX_CAPTION_LENGTH: usize = 1024;

fn parse_url(url: &str) -> Result<url::Url, PrepodavaiError> {
    url::Url::parse(url).map_err(|e| PrepodavaiError::DeliveryPermanent {
        message: format!("invalid media url {url:?}: {e}"),
    })
}

fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() <= MAX_CAPTION_LENGTH {
        return caption.to_string();
    }
    let mut cut: String = caption.chars().take(MAX_CAPTION_LENGTH - 1).collect();
    cut.push('…');
    cut
}

/// Telegram channel adapter implementing [`DeliveryChannel`].
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, PrepodavaiError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            PrepodavaiError::Config("telegram.bot_token is required for Telegram delivery".into())
        })?;

        if token.is_empty() {
            return Err(PrepodavaiError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        Ok(Self {
            bot: Bot::new(token),
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, PrepodavaiError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), PrepodavaiError> {
        debug!("Telegram channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send_photo(
        &self,
        chat_id: i64,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, PrepodavaiError> {
        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::url(parse_url(url)?));
        if let Some(caption) = caption {
            request = request.caption(truncate_caption(caption));
        }
        let sent = request.await.map_err(classify)?;
        debug!(chat_id, message_id = sent.id.0, "photo sent");
        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn send_document(
        &self,
        chat_id: i64,
        document: DocumentSource,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, PrepodavaiError> {
        let file = match document {
            DocumentSource::Bytes(bytes) => InputFile::memory(bytes),
            DocumentSource::Url(url) => InputFile::url(parse_url(&url)?),
        }
        .file_name(filename.to_string());

        let mut request = self.bot.send_document(ChatId(chat_id), file);
        if let Some(caption) = caption {
            request = request.caption(truncate_caption(caption));
        }
        let sent = request.await.map_err(classify)?;
        debug!(chat_id, message_id = sent.id.0, filename, "document sent");
        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageId, PrepodavaiError> {
        let sent = self
            .bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(classify)?;
        Ok(MessageId(sent.id.0.to_string()))
    }
}
