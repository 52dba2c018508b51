// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job handlers.
//!
//! A handler must be idempotent: the queue is at-least-once, so the same job
//! can run again after a crash or a retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use prepodavai_core::{
    GenerationJob, GenerationProvider, GenerationRequest, GenerationStatus, PrepodavaiError,
};
use prepodavai_delivery::DeliveryDispatcher;
use prepodavai_generation::GenerationStore;
use prepodavai_storage::JobEntry;
use tracing::{debug, info, warn};

/// Processes one claimed job. An `Err` sends the job back to the queue.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &JobEntry) -> Result<(), PrepodavaiError>;
}

/// Runs the provider for pending requests and delivers completed ones.
pub struct GenerationJobHandler {
    store: GenerationStore,
    provider: Arc<dyn GenerationProvider>,
    dispatcher: Arc<DeliveryDispatcher>,
    provider_timeout: Duration,
}

impl GenerationJobHandler {
    pub fn new(
        store: GenerationStore,
        provider: Arc<dyn GenerationProvider>,
        dispatcher: Arc<DeliveryDispatcher>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            dispatcher,
            provider_timeout,
        }
    }

    /// Run the provider and record the outcome. Returns the request when it
    /// completed and should be delivered.
    async fn generate(
        &self,
        req: &GenerationRequest,
    ) -> Result<Option<GenerationRequest>, PrepodavaiError> {
        let job = GenerationJob::from(req);
        let started = Instant::now();
        let result = tokio::time::timeout(self.provider_timeout, self.provider.generate(&job)).await;
        prepodavai_prometheus::record_provider_latency(started.elapsed().as_secs_f64());

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(request_id = %req.id, error = %e, "provider failed");
                return self.fail(req, &e).await;
            }
            Err(_) => {
                let e = PrepodavaiError::Timeout {
                    duration: self.provider_timeout,
                };
                warn!(request_id = %req.id, timeout = ?self.provider_timeout, "provider timed out");
                return self.fail(req, &e).await;
            }
        };

        match self.store.mark_completed(&req.id, output).await {
            Ok(done) => {
                info!(request_id = %req.id, generation_type = %req.generation_type, "generation completed");
                Ok(Some(done))
            }
            Err(e @ PrepodavaiError::Validation(_)) => {
                warn!(request_id = %req.id, error = %e, "provider returned an unusable result");
                self.fail(req, &e).await
            }
            Err(PrepodavaiError::InvalidTransition { from, .. }) => {
                // Failed meanwhile, e.g. by the stale-request sweeper.
                debug!(request_id = %req.id, status = %from, "request left pending during generation");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn fail(
        &self,
        req: &GenerationRequest,
        error: &PrepodavaiError,
    ) -> Result<Option<GenerationRequest>, PrepodavaiError> {
        match self.store.mark_failed(&req.id, &error.to_string()).await {
            Ok(_) | Err(PrepodavaiError::InvalidTransition { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl JobHandler for GenerationJobHandler {
    async fn handle(&self, job: &JobEntry) -> Result<(), PrepodavaiError> {
        let req = self.store.get(&job.generation_request_id).await?;
        let req = match req.status {
            GenerationStatus::Pending => match self.generate(&req).await? {
                Some(done) => done,
                None => return Ok(()),
            },
            GenerationStatus::Completed => {
                debug!(job_id = job.id, request_id = %req.id, "already generated, delivering only");
                req
            }
            GenerationStatus::Failed => {
                debug!(job_id = job.id, request_id = %req.id, "request already failed");
                return Ok(());
            }
        };

        let outcome = self.dispatcher.deliver(&req.id).await?;
        debug!(job_id = job.id, request_id = %req.id, ?outcome, "delivery finished");
        Ok(())
    }
}
