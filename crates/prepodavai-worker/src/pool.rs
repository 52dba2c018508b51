// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded worker pool draining the job queue.

use std::sync::Arc;
use std::time::Duration;

use prepodavai_core::PrepodavaiError;
use prepodavai_storage::JobEntry;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::handler::JobHandler;
use crate::queue::{FailOutcome, JobQueue};

/// Run `handler` on a claimed job and settle it in the queue.
///
/// Retryable errors go back to the queue with backoff; anything else
/// dead-letters the job immediately.
pub async fn process(queue: &JobQueue, handler: &dyn JobHandler, job: JobEntry) {
    let job_id = job.id;
    match handler.handle(&job).await {
        Ok(()) => {
            if let Err(e) = queue.ack(job_id).await {
                error!(job_id, error = %e, "failed to ack job");
            }
        }
        Err(e) if e.is_retryable() => match queue.fail(&job, &e).await {
            Ok(FailOutcome::Retrying { available_at }) => {
                debug!(job_id, %available_at, "job rescheduled");
            }
            Ok(FailOutcome::DeadLettered) => {}
            Err(settle) => error!(job_id, error = %settle, "failed to reschedule job"),
        },
        Err(e) => {
            warn!(job_id, error = %e, "job failed with a non-retryable error");
            if let Err(settle) = queue.dead_letter(job_id, &e.to_string()).await {
                error!(job_id, error = %settle, "failed to dead-letter job");
            }
        }
    }
}

pub struct WorkerPool {
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    permits: Arc<Semaphore>,
    concurrency: usize,
    poll_interval: Duration,
    grace: Duration,
}

impl WorkerPool {
    pub fn new(queue: JobQueue, handler: Arc<dyn JobHandler>) -> Self {
        let config = queue.config().clone();
        let concurrency = config.worker_concurrency.max(1);
        Self {
            queue,
            handler,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            grace: Duration::from_secs(config.shutdown_grace_secs),
        }
    }

    /// Claim and process jobs until `cancel` fires, then wait up to the
    /// shutdown grace period for in-flight jobs.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), PrepodavaiError> {
        info!(concurrency = self.concurrency, "worker pool running");
        let mut tasks = JoinSet::new();

        loop {
            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = done {
                    error!(error = %e, "worker task panicked");
                }
            }

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = self.permits.clone().acquire_owned() => permit
                    .map_err(|e| PrepodavaiError::Internal(format!("worker semaphore closed: {e}")))?,
            };

            match self.queue.claim().await {
                Ok(Some(job)) => {
                    let queue = self.queue.clone();
                    let handler = Arc::clone(&self.handler);
                    tasks.spawn(async move {
                        let _permit = permit;
                        process(&queue, handler.as_ref(), job).await;
                    });
                    continue;
                }
                Ok(None) => drop(permit),
                Err(e) => {
                    drop(permit);
                    error!(error = %e, "failed to claim job");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(in_flight = tasks.len(), "worker pool stopping");
        let drained = tokio::time::timeout(self.grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                "shutdown grace elapsed, abandoning in-flight jobs to lease expiry"
            );
            tasks.abort_all();
        }
        info!("worker pool stopped");
        Ok(())
    }

    /// Process runnable jobs one by one until none is left. Returns how many ran.
    pub async fn run_until_idle(&self) -> Result<usize, PrepodavaiError> {
        let mut processed = 0;
        while let Some(job) = self.queue.claim().await? {
            process(&self.queue, self.handler.as_ref(), job).await;
            processed += 1;
        }
        Ok(processed)
    }
}
