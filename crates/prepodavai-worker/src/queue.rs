// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable at-least-once job queue over the `jobs` table.
//!
//! A claim leases the job until `now + lease_secs`. A failed attempt goes back
//! to pending with exponential backoff; after `max_attempts` the job is
//! dead-lettered and its request failed and refunded in the same transaction.

use chrono::{DateTime, Utc};
use prepodavai_config::model::QueueConfig;
use prepodavai_core::PrepodavaiError;
use prepodavai_credits::RefundOutcome;
use prepodavai_generation::fail_pending_in;
use prepodavai_storage::queries::jobs;
use prepodavai_storage::{Database, JobEntry, QueueStats, timestamp};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::backoff::backoff_delay;

/// Error recorded on a request whose job was dead-lettered.
pub const PROCESSING_FAILED: &str = "processing failed";

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    Retrying { available_at: String },
    DeadLettered,
}

/// Dead-letter `job` and fail its request if it is still pending.
///
/// Returns the refund, or `None` when the job was already dead or the request
/// had already left `pending`.
pub fn dead_letter_in(
    conn: &Connection,
    job: &JobEntry,
    error: &str,
) -> Result<Option<RefundOutcome>, PrepodavaiError> {
    if jobs::dead_letter(conn, job.id, error)? == 0 {
        return Ok(None);
    }
    fail_pending_in(conn, &job.generation_request_id, PROCESSING_FAILED)
}

#[derive(Clone)]
pub struct JobQueue {
    db: Database,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(db: Database, config: QueueConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue the job for `request_id`, or return the existing one.
    pub async fn enqueue(&self, request_id: &str) -> Result<JobEntry, PrepodavaiError> {
        let id = request_id.to_string();
        let max_attempts = self.config.max_attempts;
        self.db
            .write(move |tx| jobs::insert_or_get(tx, &id, max_attempts))
            .await
    }

    /// Claim the next runnable job, if any.
    pub async fn claim(&self) -> Result<Option<JobEntry>, PrepodavaiError> {
        self.claim_at(Utc::now()).await
    }

    /// Claim as of `now`. A reclaimed job whose attempts are already spent
    /// (its worker died on the last attempt) is dead-lettered instead.
    pub async fn claim_at(&self, now: DateTime<Utc>) -> Result<Option<JobEntry>, PrepodavaiError> {
        let lease = chrono::Duration::seconds(self.config.lease_secs as i64);
        let now_ts = timestamp(now);
        let until = timestamp(now + lease);
        let (job, exhausted) = self
            .db
            .write(move |tx| {
                let mut exhausted = Vec::new();
                loop {
                    let Some(job) = jobs::claim_next(tx, &now_ts, &until)? else {
                        return Ok((None, exhausted));
                    };
                    if job.attempts <= job.max_attempts {
                        return Ok((Some(job), exhausted));
                    }
                    let error = PrepodavaiError::QueueExhausted {
                        job_id: job.id,
                        attempts: job.max_attempts,
                    };
                    let refund = dead_letter_in(tx, &job, &error.to_string())?;
                    exhausted.push((job.id, refund));
                }
            })
            .await?;

        for (job_id, refund) in exhausted {
            prepodavai_prometheus::record_job_attempt("dead");
            note_refund(&refund);
            warn!(job_id, ?refund, "abandoned job exhausted its attempts, dead-lettered");
        }
        if let Some(job) = &job {
            debug!(job_id = job.id, request_id = %job.generation_request_id, attempt = job.attempts, "job claimed");
        }
        Ok(job)
    }

    /// Mark a job done.
    pub async fn ack(&self, job_id: i64) -> Result<(), PrepodavaiError> {
        self.db.write(move |tx| jobs::complete(tx, job_id)).await?;
        prepodavai_prometheus::record_job_attempt("ok");
        Ok(())
    }

    /// Record a failed attempt: retry with backoff, or dead-letter when spent.
    pub async fn fail(
        &self,
        job: &JobEntry,
        error: &PrepodavaiError,
    ) -> Result<FailOutcome, PrepodavaiError> {
        self.fail_at(job, error, Utc::now()).await
    }

    pub async fn fail_at(
        &self,
        job: &JobEntry,
        error: &PrepodavaiError,
        now: DateTime<Utc>,
    ) -> Result<FailOutcome, PrepodavaiError> {
        if job.attempts >= job.max_attempts {
            let exhausted = PrepodavaiError::QueueExhausted {
                job_id: job.id,
                attempts: job.attempts,
            };
            let refund = self
                .dead_letter_entry(job.clone(), format!("{exhausted}: {error}"))
                .await?;
            warn!(
                job_id = job.id,
                request_id = %job.generation_request_id,
                attempts = job.attempts,
                error = %error,
                ?refund,
                "job dead-lettered"
            );
            return Ok(FailOutcome::DeadLettered);
        }

        let delay = backoff_delay(
            job.attempts,
            self.config.backoff_base_ms,
            self.config.backoff_max_secs,
        );
        let available_at = timestamp(
            now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::seconds(1)),
        );
        let (id, at, message) = (job.id, available_at.clone(), error.to_string());
        self.db
            .write(move |tx| jobs::reschedule(tx, id, &at, &message))
            .await?;
        prepodavai_prometheus::record_job_attempt("retry");
        info!(
            job_id = job.id,
            request_id = %job.generation_request_id,
            attempt = job.attempts,
            retry_in_ms = delay.as_millis() as u64,
            error = %error,
            "job attempt failed, retrying"
        );
        Ok(FailOutcome::Retrying { available_at })
    }

    /// Dead-letter a job now, failing and refunding its request if pending.
    pub async fn dead_letter(
        &self,
        job_id: i64,
        error: &str,
    ) -> Result<Option<RefundOutcome>, PrepodavaiError> {
        let job = self
            .db
            .read(move |conn| jobs::get(conn, job_id))
            .await?
            .ok_or_else(|| PrepodavaiError::not_found("job", job_id.to_string()))?;
        self.dead_letter_entry(job, error.to_string()).await
    }

    async fn dead_letter_entry(
        &self,
        job: JobEntry,
        error: String,
    ) -> Result<Option<RefundOutcome>, PrepodavaiError> {
        let refund = self
            .db
            .write(move |tx| dead_letter_in(tx, &job, &error))
            .await?;
        prepodavai_prometheus::record_job_attempt("dead");
        note_refund(&refund);
        Ok(refund)
    }

    /// Return jobs whose lease expired to pending.
    pub async fn reclaim_expired_leases(&self) -> Result<usize, PrepodavaiError> {
        let now = timestamp(Utc::now());
        let released = self
            .db
            .write(move |tx| jobs::reclaim_expired(tx, &now))
            .await?;
        if released > 0 {
            info!(released, "reclaimed jobs with expired leases");
        }
        Ok(released)
    }

    pub async fn dead_letters(&self, limit: i64) -> Result<Vec<JobEntry>, PrepodavaiError> {
        self.db.read(move |conn| jobs::list_dead(conn, limit)).await
    }

    pub async fn stats(&self) -> Result<QueueStats, PrepodavaiError> {
        let stats = self.db.read(jobs::stats).await?;
        prepodavai_prometheus::set_queue_depth(stats.pending, stats.dead);
        Ok(stats)
    }

    pub async fn get_by_request(&self, request_id: &str) -> Result<Option<JobEntry>, PrepodavaiError> {
        let id = request_id.to_string();
        self.db
            .read(move |conn| jobs::get_by_request(conn, &id))
            .await
    }
}

fn note_refund(refund: &Option<RefundOutcome>) {
    if matches!(refund, Some(RefundOutcome::Refunded { .. })) {
        prepodavai_prometheus::record_refund();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prepodavai_core::{GenerationStatus, GenerationType};
    use prepodavai_credits::{CostTable, CreditLedger};
    use prepodavai_generation::{GenerationStore, Orchestrator};
    use prepodavai_storage::JobStatus;
    use serde_json::json;

    fn config() -> QueueConfig {
        QueueConfig {
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_max_secs: 60,
            lease_secs: 300,
            ..QueueConfig::default()
        }
    }

    async fn submitted() -> (JobQueue, CreditLedger, GenerationStore, String) {
        let db = Database::open_in_memory().await.unwrap();
        let ledger = CreditLedger::new(db.clone());
        ledger.grant("u1", 10, "test").await.unwrap();
        CostTable::new(db.clone())
            .set_cost(GenerationType::Quiz, 4)
            .await
            .unwrap();
        let submission = Orchestrator::new(db.clone(), 3)
            .submit(
                "u1",
                GenerationType::Quiz,
                json!({"subject": "Biology", "topic": "Cells"}),
            )
            .await
            .unwrap();
        (
            JobQueue::new(db.clone(), config()),
            ledger,
            GenerationStore::new(db),
            submission.request_id,
        )
    }

    #[tokio::test]
    async fn enqueue_returns_existing_job() {
        let (queue, _, _, request_id) = submitted().await;
        let first = queue.enqueue(&request_id).await.unwrap();
        let again = queue.enqueue(&request_id).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(queue.stats().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn failed_attempt_is_retried_after_backoff() {
        let (queue, _, _, _) = submitted().await;
        let now = Utc::now();
        let job = queue.claim_at(now).await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);

        let outcome = queue
            .fail_at(&job, &PrepodavaiError::transient("flaky"), now)
            .await
            .unwrap();
        assert!(matches!(outcome, FailOutcome::Retrying { .. }));

        // Not runnable until the backoff elapses.
        assert!(queue.claim_at(now).await.unwrap().is_none());
        let retried = queue
            .claim_at(now + chrono::Duration::seconds(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(retried.attempts, 2);
        assert_eq!(retried.last_error.as_deref(), Some("transient delivery error: flaky"));
    }

    #[tokio::test]
    async fn exhausted_job_is_dead_lettered_and_refunded() {
        let (queue, ledger, store, request_id) = submitted().await;
        assert_eq!(ledger.balance("u1").await.unwrap().spendable(), 6);

        let mut now = Utc::now();
        for attempt in 1..=3 {
            let job = queue.claim_at(now).await.unwrap().unwrap();
            assert_eq!(job.attempts, attempt);
            queue
                .fail_at(&job, &PrepodavaiError::transient("down"), now)
                .await
                .unwrap();
            now += chrono::Duration::seconds(120);
        }

        let stats = queue.stats().await.unwrap();
        assert_eq!((stats.pending, stats.dead), (0, 1));
        let dead = queue.dead_letters(10).await.unwrap();
        assert_eq!(dead[0].status, JobStatus::Dead);

        let req = store.get(&request_id).await.unwrap();
        assert_eq!(req.status, GenerationStatus::Failed);
        assert_eq!(req.error.as_deref(), Some(PROCESSING_FAILED));
        assert_eq!(ledger.balance("u1").await.unwrap().spendable(), 10);
    }

    #[tokio::test]
    async fn abandoned_last_attempt_is_dead_lettered_on_reclaim() {
        let (queue, ledger, _, _) = submitted().await;
        let mut now = Utc::now();
        for _ in 0..3 {
            queue.claim_at(now).await.unwrap().unwrap();
            // Worker dies; the lease runs out.
            now += chrono::Duration::seconds(301);
        }
        assert!(queue.claim_at(now).await.unwrap().is_none());
        assert_eq!(queue.stats().await.unwrap().dead, 1);
        assert_eq!(ledger.balance("u1").await.unwrap().spendable(), 10);
    }

    #[tokio::test]
    async fn dead_letter_leaves_completed_request_alone() {
        let (queue, ledger, store, request_id) = submitted().await;
        let job = queue.claim().await.unwrap().unwrap();
        store
            .mark_completed(&request_id, prepodavai_core::GenerationOutput::text("done"))
            .await
            .unwrap();

        let refund = queue.dead_letter(job.id, "delivery exhausted").await.unwrap();
        assert!(refund.is_none());
        assert_eq!(
            store.get(&request_id).await.unwrap().status,
            GenerationStatus::Completed
        );
        assert_eq!(ledger.balance("u1").await.unwrap().spendable(), 6);
        assert!(queue.dead_letter(job.id, "again").await.unwrap().is_none());
    }
}
