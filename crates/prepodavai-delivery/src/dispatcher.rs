// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of completed requests to the user's chat.
//!
//! A request is sent at most once: the `sent_to_telegram` flag is checked
//! before sending and set with a guarded update afterwards, and calls for the
//! same request within this process are serialized by a per-request lock.
//! Multi-part deliveries (photo sets, split text) record each part as it is
//! sent, so a retry after a transient failure resumes instead of resending.

use std::sync::Arc;

use dashmap::DashMap;
use prepodavai_core::{
    DeliveryChannel, DocumentRenderer, DocumentSource, GenerationOutput, GenerationRequest,
    GenerationStatus, PrepodavaiError, RenderInput, TextFormat,
};
use prepodavai_storage::Database;
use prepodavai_storage::queries::{generations, users};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::split::split_message;

/// Maximum photos sent for one photo set.
pub const MAX_PHOTOS: usize = 10;

/// Result of a `deliver` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Sent now, in `messages` channel messages.
    Sent { messages: usize },
    /// The flag was already set; nothing was sent.
    AlreadySent,
    /// The request is not completed.
    NotReady,
    /// Deliberately not sent. The flag is set unless no channel is configured.
    Skipped { reason: String },
}

pub struct DeliveryDispatcher {
    db: Database,
    channel: Option<Arc<dyn DeliveryChannel>>,
    renderer: Option<Arc<dyn DocumentRenderer>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DeliveryDispatcher {
    pub fn new(
        db: Database,
        channel: Option<Arc<dyn DeliveryChannel>>,
        renderer: Option<Arc<dyn DocumentRenderer>>,
    ) -> Self {
        Self {
            db,
            channel,
            renderer,
            locks: DashMap::new(),
        }
    }

    /// Deliver the result of `request_id` if it has not been delivered yet.
    ///
    /// Transient channel failures are returned as errors with the flag left
    /// unset, so the caller can retry.
    pub async fn deliver(&self, request_id: &str) -> Result<DeliveryOutcome, PrepodavaiError> {
        let lock = self
            .locks
            .entry(request_id.to_string())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().await;
            self.deliver_locked(request_id).await
        };
        drop(lock);
        self.locks
            .remove_if(request_id, |_, m| Arc::strong_count(m) == 1);
        result
    }

    async fn deliver_locked(&self, request_id: &str) -> Result<DeliveryOutcome, PrepodavaiError> {
        let id = request_id.to_string();
        let (req, chat_id) = self
            .db
            .read(move |conn| {
                let req = generations::get(conn, &id)?
                    .ok_or_else(|| PrepodavaiError::not_found("generation request", id.clone()))?;
                let chat = users::chat_id(conn, &req.user_id)?;
                Ok((req, chat))
            })
            .await?;

        if req.sent_to_telegram {
            debug!(request_id, "already delivered");
            return Ok(DeliveryOutcome::AlreadySent);
        }
        if req.status != GenerationStatus::Completed {
            return Ok(DeliveryOutcome::NotReady);
        }
        let Some(result) = req.result.clone() else {
            return Ok(DeliveryOutcome::NotReady);
        };
        let Some(channel) = self.channel.clone() else {
            return Ok(DeliveryOutcome::Skipped {
                reason: "no delivery channel configured".into(),
            });
        };
        let Some(chat_id) = chat_id else {
            self.mark_sent(request_id).await?;
            info!(request_id, user_id = %req.user_id, "user has no chat, delivery skipped");
            prepodavai_prometheus::record_delivery(kind(&result), "skipped");
            return Ok(DeliveryOutcome::Skipped {
                reason: "user has no chat address".into(),
            });
        };

        match self.send(channel.as_ref(), chat_id, &req, &result).await {
            Ok(messages) => {
                self.mark_sent(request_id).await?;
                prepodavai_prometheus::record_delivery(kind(&result), "sent");
                info!(request_id, chat_id, messages, "result delivered");
                Ok(DeliveryOutcome::Sent { messages })
            }
            Err(PrepodavaiError::DeliveryPermanent { message }) => {
                self.mark_sent(request_id).await?;
                prepodavai_prometheus::record_delivery(kind(&result), "permanent_failure");
                warn!(request_id, chat_id, reason = %message, "delivery impossible, giving up");
                Ok(DeliveryOutcome::Skipped { reason: message })
            }
            Err(e) => {
                prepodavai_prometheus::record_delivery(kind(&result), "transient_failure");
                warn!(request_id, chat_id, error = %e, "delivery failed, will retry");
                Err(e)
            }
        }
    }

    async fn mark_sent(&self, request_id: &str) -> Result<(), PrepodavaiError> {
        let id = request_id.to_string();
        let changed = self
            .db
            .write(move |tx| generations::mark_sent(tx, &id))
            .await?;
        if changed == 0 {
            debug!(request_id, "delivery flag was already set");
        }
        Ok(())
    }

    async fn record_part(&self, request_id: &str, parts: usize) -> Result<(), PrepodavaiError> {
        let id = request_id.to_string();
        let parts = u32::try_from(parts).unwrap_or(u32::MAX);
        self.db
            .write(move |tx| generations::record_delivered_parts(tx, &id, parts))
            .await?;
        Ok(())
    }

    async fn send(
        &self,
        channel: &dyn DeliveryChannel,
        chat_id: i64,
        req: &GenerationRequest,
        result: &GenerationOutput,
    ) -> Result<usize, PrepodavaiError> {
        let caption = caption_for(req);
        match result {
            GenerationOutput::Image { url } => {
                channel.send_photo(chat_id, url, Some(&caption)).await?;
                Ok(1)
            }
            GenerationOutput::PhotoSet { urls } => {
                if urls.len() > MAX_PHOTOS {
                    debug!(request_id = %req.id, total = urls.len(), "photo set truncated");
                }
                let resume = req.delivered_parts as usize;
                if resume > 0 {
                    debug!(request_id = %req.id, resume, "resuming photo set");
                }
                let mut sent = 0;
                for (i, url) in urls.iter().take(MAX_PHOTOS).enumerate().skip(resume) {
                    let caption = (i == 0).then_some(caption.as_str());
                    channel.send_photo(chat_id, url, caption).await?;
                    self.record_part(&req.id, i + 1).await?;
                    sent += 1;
                }
                Ok(sent)
            }
            GenerationOutput::Presentation { url, filename } => {
                let filename = filename
                    .clone()
                    .unwrap_or_else(|| format!("{}.pptx", req.generation_type));
                channel
                    .send_document(
                        chat_id,
                        DocumentSource::Url(url.clone()),
                        &filename,
                        Some(&caption),
                    )
                    .await?;
                Ok(1)
            }
            GenerationOutput::Text { .. } | GenerationOutput::Html { .. } => {
                self.send_text(channel, chat_id, req, result, &caption).await
            }
        }
    }

    /// Render text results to PDF; fall back to plain messages if rendering fails.
    ///
    /// Once some plain-text chunks went out, a retry continues with the
    /// remaining chunks and does not try the PDF again.
    async fn send_text(
        &self,
        channel: &dyn DeliveryChannel,
        chat_id: i64,
        req: &GenerationRequest,
        result: &GenerationOutput,
        caption: &str,
    ) -> Result<usize, PrepodavaiError> {
        let resume = req.delivered_parts as usize;
        if let Some(renderer) = self.renderer.as_ref().filter(|_| resume == 0) {
            let input = match result {
                GenerationOutput::Html { content } => RenderInput::Html(content.clone()),
                GenerationOutput::Text {
                    content,
                    format: TextFormat::Plain | TextFormat::Markdown,
                } => RenderInput::Text(content.clone()),
                other => RenderInput::Text(other.plain_text()),
            };
            let stem = format!("{}-{}", req.generation_type, short_id(&req.id));
            match renderer.render_to_document(input, &stem).await {
                Ok(doc) => {
                    channel
                        .send_document(
                            chat_id,
                            DocumentSource::Bytes(doc.bytes),
                            &doc.filename,
                            Some(caption),
                        )
                        .await?;
                    return Ok(1);
                }
                Err(e) => {
                    warn!(request_id = %req.id, error = %e, "rendering failed, sending plain text");
                }
            }
        }

        let text = result.plain_text();
        let text = if text.trim().is_empty() {
            format!("{caption}: (empty result)")
        } else {
            text
        };
        let chunks = split_message(&text, channel.max_message_length());
        if resume > 0 {
            debug!(request_id = %req.id, resume, total = chunks.len(), "resuming text delivery");
        }
        let mut sent = 0;
        for (i, chunk) in chunks.iter().enumerate().skip(resume) {
            channel.send_message(chat_id, chunk).await?;
            if chunks.len() > 1 {
                self.record_part(&req.id, i + 1).await?;
            }
            sent += 1;
        }
        Ok(sent)
    }
}

fn kind(output: &GenerationOutput) -> &'static str {
    match output {
        GenerationOutput::Text { .. } => "text",
        GenerationOutput::Html { .. } => "html",
        GenerationOutput::Image { .. } => "image",
        GenerationOutput::PhotoSet { .. } => "photo_set",
        GenerationOutput::Presentation { .. } => "presentation",
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn caption_for(req: &GenerationRequest) -> String {
    let label = req.generation_type.to_string().replace('_', " ");
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_and_captions() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(kind(&GenerationOutput::text("x")), "text");
    }
}
