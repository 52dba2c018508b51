// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generation provider for deterministic testing.
//!
//! `MockProvider` implements `GenerationProvider` with scripted replies,
//! enabling fast, CI-runnable tests without a real model behind them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use prepodavai_core::{
    AdapterType, GenerationJob, GenerationOutput, GenerationProvider, HealthStatus,
    PluginAdapter, PrepodavaiError,
};

/// A scripted provider reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Output(GenerationOutput),
    Error(String),
    /// Sleep before producing the inner reply.
    Delayed(Duration, Box<Reply>),
}

/// A mock provider that returns scripted replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty, a text
/// result echoing the job type is returned.
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a new mock provider with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock provider pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            calls: AtomicUsize::new(0),
        }
    }

    /// Add a reply to the end of the queue.
    pub async fn push(&self, reply: Reply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, PrepodavaiError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PrepodavaiError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate(&self, job: &GenerationJob) -> Result<GenerationOutput, PrepodavaiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().await.pop_front();
        let mut reply = match next {
            Some(reply) => reply,
            None => {
                return Ok(GenerationOutput::text(format!(
                    "mock {} result",
                    job.generation_type
                )));
            }
        };
        loop {
            match reply {
                Reply::Output(output) => return Ok(output),
                Reply::Error(message) => return Err(PrepodavaiError::provider(message)),
                Reply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}
