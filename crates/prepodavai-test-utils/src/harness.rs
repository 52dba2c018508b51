// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` assembles the whole pipeline (ledger, orchestrator, queue,
//! worker pool, dispatcher) over a temp SQLite database with mock provider,
//! channel and renderer. `submit()` plus `run_workers()` drive a request from
//! acceptance to delivery.

use std::sync::Arc;
use std::time::Duration;

use prepodavai_config::model::QueueConfig;
use prepodavai_core::{
    DeliveryChannel, DocumentRenderer, GenerationProvider, GenerationRequest, GenerationType,
    PrepodavaiError,
};
use prepodavai_credits::{CostTable, CreditLedger, grant_in};
use prepodavai_delivery::DeliveryDispatcher;
use prepodavai_generation::{GenerationStore, Orchestrator, Submission};
use prepodavai_storage::Database;
use prepodavai_storage::queries::{subscriptions, users};
use prepodavai_worker::{GenerationJobHandler, JobQueue, WorkerPool};

use crate::mock_channel::MockChannel;
use crate::mock_provider::{MockProvider, Reply};
use crate::mock_renderer::{MockRenderer, RenderMode};

/// Telegram id of the harness user; private chats share the user id.
pub const TEST_CHAT_ID: i64 = 4242;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    balance: i64,
    costs: Vec<(GenerationType, i64)>,
    with_chat: bool,
    with_renderer: bool,
    render_mode: RenderMode,
    replies: Vec<Reply>,
    queue: QueueConfig,
    provider_timeout: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            balance: 10,
            costs: Vec::new(),
            with_chat: true,
            with_renderer: true,
            render_mode: RenderMode::Succeed,
            replies: Vec::new(),
            queue: QueueConfig {
                max_attempts: 3,
                backoff_base_ms: 0,
                backoff_max_secs: 0,
                ..QueueConfig::default()
            },
            provider_timeout: Duration::from_secs(30),
        }
    }

    /// Starting spendable balance of the test user.
    pub fn with_balance(mut self, credits: i64) -> Self {
        self.balance = credits;
        self
    }

    /// Price an operation.
    pub fn with_cost(mut self, generation_type: GenerationType, credits: i64) -> Self {
        self.costs.push((generation_type, credits));
        self
    }

    /// Create the test user without a chat address.
    pub fn without_chat(mut self) -> Self {
        self.with_chat = false;
        self
    }

    /// Leave the dispatcher without a renderer.
    pub fn without_renderer(mut self) -> Self {
        self.with_renderer = false;
        self
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    /// Script the mock provider.
    pub fn with_replies(mut self, replies: Vec<Reply>) -> Self {
        self.replies = replies;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.queue.max_attempts = attempts;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, PrepodavaiError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| PrepodavaiError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let user_id = "teacher-1".to_string();
        let (uid, balance, with_chat) = (user_id.clone(), self.balance, self.with_chat);
        db.write(move |tx| {
            if with_chat {
                users::upsert_telegram(tx, &uid, TEST_CHAT_ID, TEST_CHAT_ID, Some("teacher"))?;
            } else {
                users::insert(tx, &uid)?;
            }
            if balance > 0 {
                grant_in(tx, &uid, balance, "test grant")?;
            } else {
                subscriptions::insert(tx, &format!("sub-{uid}"), &uid)?;
            }
            Ok(())
        })
        .await?;

        let costs = CostTable::new(db.clone());
        for (generation_type, credits) in self.costs {
            costs.set_cost(generation_type, credits).await?;
        }

        let provider = Arc::new(MockProvider::with_replies(self.replies));
        let channel = Arc::new(MockChannel::new());
        let renderer = Arc::new(MockRenderer::new(self.render_mode));

        let dispatcher = Arc::new(DeliveryDispatcher::new(
            db.clone(),
            Some(channel.clone() as Arc<dyn DeliveryChannel>),
            self.with_renderer
                .then(|| renderer.clone() as Arc<dyn DocumentRenderer>),
        ));
        let store = GenerationStore::new(db.clone());
        let queue = JobQueue::new(db.clone(), self.queue.clone());
        let handler = Arc::new(GenerationJobHandler::new(
            store.clone(),
            provider.clone() as Arc<dyn GenerationProvider>,
            dispatcher.clone(),
            self.provider_timeout,
        ));
        let pool = WorkerPool::new(queue.clone(), handler);

        Ok(TestHarness {
            ledger: CreditLedger::new(db.clone()),
            costs,
            orchestrator: Orchestrator::new(db.clone(), self.queue.max_attempts),
            store,
            queue,
            pool,
            dispatcher,
            provider,
            channel,
            renderer,
            user_id,
            db,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete pipeline with mock adapters and temp storage.
pub struct TestHarness {
    pub db: Database,
    pub ledger: CreditLedger,
    pub costs: CostTable,
    pub orchestrator: Orchestrator,
    pub store: GenerationStore,
    pub queue: JobQueue,
    pub pool: WorkerPool,
    pub dispatcher: Arc<DeliveryDispatcher>,
    pub provider: Arc<MockProvider>,
    pub channel: Arc<MockChannel>,
    pub renderer: Arc<MockRenderer>,
    /// The seeded user.
    pub user_id: String,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Submit a request for the seeded user.
    pub async fn submit(
        &self,
        generation_type: GenerationType,
        params: serde_json::Value,
    ) -> Result<Submission, PrepodavaiError> {
        self.orchestrator
            .submit(&self.user_id, generation_type, params)
            .await
    }

    /// Run queued jobs until none is runnable.
    pub async fn run_workers(&self) -> Result<usize, PrepodavaiError> {
        self.pool.run_until_idle().await
    }

    /// Spendable balance of the seeded user.
    pub async fn balance(&self) -> Result<i64, PrepodavaiError> {
        Ok(self.ledger.balance(&self.user_id).await?.spendable())
    }

    pub async fn request(&self, id: &str) -> Result<GenerationRequest, PrepodavaiError> {
        self.store.get(id).await
    }
}
