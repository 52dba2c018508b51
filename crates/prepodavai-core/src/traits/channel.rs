// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery channel trait for pushing finished results to a chat.

use async_trait::async_trait;

use crate::error::PrepodavaiError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{DocumentSource, MessageId};

/// Outbound-only chat channel.
///
/// Implementations classify failures: [`PrepodavaiError::DeliveryTransient`]
/// for anything worth retrying, [`PrepodavaiError::DeliveryPermanent`] when
/// the chat can never be reached.
#[async_trait]
pub trait DeliveryChannel: PluginAdapter {
    /// Maximum length of a single text message.
    fn max_message_length(&self) -> usize {
        4096
    }

    /// Sends a photo by URL.
    async fn send_photo(
        &self,
        chat_id: i64,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, PrepodavaiError>;

    /// Sends a document, either uploaded from memory or fetched by URL.
    async fn send_document(
        &self,
        chat_id: i64,
        document: DocumentSource,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, PrepodavaiError>;

    /// Sends a plain text message.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageId, PrepodavaiError>;
}
