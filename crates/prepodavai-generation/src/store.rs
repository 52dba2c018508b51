// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation request lifecycle records.
//!
//! Status only moves `pending -> completed` or `pending -> failed`. Failing a
//! request refunds its charge in the same transaction.

use chrono::{DateTime, Utc};
use prepodavai_core::{
    GenerationOutput, GenerationRequest, GenerationStatus, GenerationType, PrepodavaiError,
};
use prepodavai_credits::{RefundOutcome, refund_in};
use prepodavai_storage::queries::generations;
use prepodavai_storage::{Database, timestamp};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::params;

fn load(conn: &Connection, id: &str) -> Result<GenerationRequest, PrepodavaiError> {
    generations::get(conn, id)?.ok_or_else(|| PrepodavaiError::not_found("generation request", id))
}

fn transition_error(req: &GenerationRequest, to: GenerationStatus) -> PrepodavaiError {
    PrepodavaiError::InvalidTransition {
        id: req.id.clone(),
        from: req.status.to_string(),
        to: to.to_string(),
    }
}

/// Validate params and insert a pending request. Returns the stored row.
pub fn create_in(
    conn: &Connection,
    id: &str,
    user_id: &str,
    generation_type: GenerationType,
    input_params: serde_json::Value,
    credit_cost: i64,
) -> Result<GenerationRequest, PrepodavaiError> {
    let normalized = params::parse(generation_type, input_params)?.to_value()?;
    generations::insert(
        conn,
        id,
        user_id,
        generation_type.as_ref(),
        &normalized,
        credit_cost,
    )?;
    load(conn, id)
}

/// Store `result` on a pending request.
pub fn complete_in(
    conn: &Connection,
    id: &str,
    result: &GenerationOutput,
) -> Result<GenerationRequest, PrepodavaiError> {
    let req = load(conn, id)?;
    if !req.status.can_transition_to(GenerationStatus::Completed) {
        return Err(transition_error(&req, GenerationStatus::Completed));
    }
    if !req.generation_type.accepts(result) {
        return Err(PrepodavaiError::Validation(format!(
            "{} cannot produce this kind of result",
            req.generation_type
        )));
    }
    if generations::complete(conn, id, result)? == 0 {
        return Err(transition_error(&req, GenerationStatus::Completed));
    }
    load(conn, id)
}

/// Fail a pending request and refund it. `None` when it is no longer pending.
pub fn fail_pending_in(
    conn: &Connection,
    id: &str,
    error: &str,
) -> Result<Option<RefundOutcome>, PrepodavaiError> {
    if generations::fail(conn, id, error)? == 0 {
        return Ok(None);
    }
    refund_in(conn, id).map(Some)
}

/// Fail a request that must still be pending, refunding it.
pub fn fail_in(
    conn: &Connection,
    id: &str,
    error: &str,
) -> Result<(GenerationRequest, RefundOutcome), PrepodavaiError> {
    let req = load(conn, id)?;
    let Some(refund) = fail_pending_in(conn, id, error)? else {
        return Err(transition_error(&req, GenerationStatus::Failed));
    };
    Ok((load(conn, id)?, refund))
}

/// Async access to generation requests.
#[derive(Clone)]
pub struct GenerationStore {
    db: Database,
}

impl GenerationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a pending request with a fresh id. No credits are touched here;
    /// use the orchestrator to reserve and enqueue together.
    pub async fn create(
        &self,
        user_id: &str,
        generation_type: GenerationType,
        input_params: serde_json::Value,
        credit_cost: i64,
    ) -> Result<GenerationRequest, PrepodavaiError> {
        let id = uuid::Uuid::new_v4().to_string();
        let user_id = user_id.to_string();
        self.db
            .write(move |tx| {
                create_in(tx, &id, &user_id, generation_type, input_params, credit_cost)
            })
            .await
    }

    pub async fn mark_completed(
        &self,
        id: &str,
        result: GenerationOutput,
    ) -> Result<GenerationRequest, PrepodavaiError> {
        let owned = id.to_string();
        let req = self
            .db
            .write(move |tx| complete_in(tx, &owned, &result))
            .await?;
        prepodavai_prometheus::record_finished(req.generation_type.as_ref(), "completed");
        debug!(request_id = id, "generation completed");
        Ok(req)
    }

    /// Fail the request and refund its charge atomically.
    pub async fn mark_failed(
        &self,
        id: &str,
        error: &str,
    ) -> Result<(GenerationRequest, RefundOutcome), PrepodavaiError> {
        let owned = id.to_string();
        let message = error.to_string();
        let (req, refund) = self
            .db
            .write(move |tx| fail_in(tx, &owned, &message))
            .await?;
        prepodavai_prometheus::record_finished(req.generation_type.as_ref(), "failed");
        if matches!(refund, RefundOutcome::Refunded { .. }) {
            prepodavai_prometheus::record_refund();
        }
        info!(request_id = id, error, ?refund, "generation failed");
        Ok((req, refund))
    }

    pub async fn get(&self, id: &str) -> Result<GenerationRequest, PrepodavaiError> {
        let id = id.to_string();
        self.db.read(move |conn| load(conn, &id)).await
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<GenerationRequest>, PrepodavaiError> {
        let user_id = user_id.to_string();
        self.db
            .read(move |conn| generations::list_for_user(conn, &user_id, limit))
            .await
    }

    /// Ids of pending requests created before `older_than` that no worker holds.
    pub async fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<String>, PrepodavaiError> {
        let cutoff = timestamp(older_than);
        self.db
            .read(move |conn| generations::list_stale_pending(conn, &cutoff, limit))
            .await
    }

    /// Set the delivery flag. Returns `false` when it was already set.
    pub async fn mark_sent(&self, id: &str) -> Result<bool, PrepodavaiError> {
        let id = id.to_string();
        self.db
            .write(move |tx| Ok(generations::mark_sent(tx, &id)? > 0))
            .await
    }
}
