// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock delivery channel for deterministic testing.
//!
//! `MockChannel` implements `DeliveryChannel`, captures every successful send
//! for assertion, and can be scripted to fail the next sends.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use prepodavai_core::{
    AdapterType, DeliveryChannel, DocumentSource, HealthStatus, MessageId, PluginAdapter,
    PrepodavaiError,
};

/// One captured send.
#[derive(Debug, Clone, PartialEq)]
pub enum SentItem {
    Photo {
        chat_id: i64,
        url: String,
        caption: Option<String>,
    },
    Document {
        chat_id: i64,
        source: DocumentSource,
        filename: String,
        caption: Option<String>,
    },
    Message {
        chat_id: i64,
        text: String,
    },
}

impl SentItem {
    pub fn chat_id(&self) -> i64 {
        match self {
            SentItem::Photo { chat_id, .. }
            | SentItem::Document { chat_id, .. }
            | SentItem::Message { chat_id, .. } => *chat_id,
        }
    }
}

/// A scripted failure for the next send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transient,
    Permanent,
}

/// A mock chat channel for testing.
pub struct MockChannel {
    sent: Arc<Mutex<Vec<SentItem>>>,
    failures: Arc<Mutex<VecDeque<Failure>>>,
    scheduled: Arc<Mutex<HashMap<usize, Failure>>>,
    attempts: AtomicUsize,
    max_message_length: usize,
}

impl MockChannel {
    /// Create a new mock channel that accepts every send.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            scheduled: Arc::new(Mutex::new(HashMap::new())),
            attempts: AtomicUsize::new(0),
            max_message_length: 4096,
        }
    }

    /// Use a smaller message limit to exercise splitting.
    pub fn with_max_message_length(mut self, limit: usize) -> Self {
        self.max_message_length = limit;
        self
    }

    /// Fail the next send with `failure`. Failures queue up in order.
    pub async fn fail_next(&self, failure: Failure) {
        self.failures.lock().await.push_back(failure);
    }

    /// Fail the `attempt`-th send (1-based, counted over the channel's life).
    pub async fn fail_attempt(&self, attempt: usize, failure: Failure) {
        self.scheduled.lock().await.insert(attempt, failure);
    }

    /// All successfully sent items.
    pub async fn sent(&self) -> Vec<SentItem> {
        self.sent.lock().await.clone()
    }

    /// Count of successful sends.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Count of send attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn record(&self, item: SentItem) -> Result<MessageId, PrepodavaiError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let scheduled = self.scheduled.lock().await.remove(&attempt);
        let failure = match scheduled {
            Some(failure) => Some(failure),
            None => self.failures.lock().await.pop_front(),
        };
        match failure {
            Some(Failure::Transient) => Err(PrepodavaiError::transient("mock: network unreachable")),
            Some(Failure::Permanent) => Err(PrepodavaiError::DeliveryPermanent {
                message: "mock: bot was blocked by the user".into(),
            }),
            None => {
                let mut sent = self.sent.lock().await;
                sent.push(item);
                Ok(MessageId(format!("mock-msg-{}", sent.len())))
            }
        }
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, PrepodavaiError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PrepodavaiError> {
        Ok(())
    }
}

#[async_trait]
impl DeliveryChannel for MockChannel {
    fn max_message_length(&self) -> usize {
        self.max_message_length
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, PrepodavaiError> {
        self.record(SentItem::Photo {
            chat_id,
            url: url.to_string(),
            caption: caption.map(str::to_string),
        })
        .await
    }

    async fn send_document(
        &self,
        chat_id: i64,
        document: DocumentSource,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, PrepodavaiError> {
        self.record(SentItem::Document {
            chat_id,
            source: document,
            filename: filename.to_string(),
            caption: caption.map(str::to_string),
        })
        .await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageId, PrepodavaiError> {
        self.record(SentItem::Message {
            chat_id,
            text: text.to_string(),
        })
        .await
    }
}
