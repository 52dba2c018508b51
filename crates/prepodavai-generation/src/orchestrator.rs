// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request submission and status polling.
//!
//! `submit` validates params before touching credits, then reserves, inserts
//! the request and enqueues its job in one transaction. The orchestrator never
//! runs generation itself.

use prepodavai_core::{GenerationOutput, GenerationStatus, GenerationType, PrepodavaiError};
use prepodavai_credits::{costs, reserve_in};
use prepodavai_storage::Database;
use prepodavai_storage::queries::{generations, jobs};
use serde::Serialize;
use tracing::{info, warn};

use crate::params;

/// An accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub request_id: String,
    pub job_id: i64,
    pub credit_cost: i64,
    pub new_balance: i64,
}

/// What a client sees when polling a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct Orchestrator {
    db: Database,
    max_attempts: u32,
}

impl Orchestrator {
    pub fn new(db: Database, max_attempts: u32) -> Self {
        Self { db, max_attempts }
    }

    /// Submit a request by route name, resolving the generation type first.
    pub async fn submit_named(
        &self,
        user_id: &str,
        type_name: &str,
        raw_params: serde_json::Value,
    ) -> Result<Submission, PrepodavaiError> {
        let generation_type = params::resolve_type(type_name)?;
        self.submit(user_id, generation_type, raw_params).await
    }

    pub async fn submit(
        &self,
        user_id: &str,
        generation_type: GenerationType,
        raw_params: serde_json::Value,
    ) -> Result<Submission, PrepodavaiError> {
        let normalized = params::parse(generation_type, raw_params)?.to_value()?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let user = user_id.to_string();
        let id = request_id.clone();
        let max_attempts = self.max_attempts;
        let result = self
            .db
            .write(move |tx| {
                let cost = costs::cost_in(tx, generation_type)?;
                let reserved = reserve_in(tx, &user, cost, Some(&id), generation_type.as_ref())?;
                generations::insert(tx, &id, &user, generation_type.as_ref(), &normalized, cost)?;
                let job = jobs::insert_or_get(tx, &id, max_attempts)?;
                Ok(Submission {
                    request_id: id,
                    job_id: job.id,
                    credit_cost: cost,
                    new_balance: reserved.new_balance,
                })
            })
            .await;

        match &result {
            Ok(submission) => {
                prepodavai_prometheus::record_reservation("ok");
                prepodavai_prometheus::record_submitted(generation_type.as_ref());
                info!(
                    request_id = %submission.request_id,
                    user_id,
                    generation_type = %generation_type,
                    cost = submission.credit_cost,
                    balance = submission.new_balance,
                    "generation accepted"
                );
            }
            Err(e) => {
                prepodavai_prometheus::record_reservation(e.error_code());
                warn!(user_id, generation_type = %generation_type, error = %e, "generation rejected");
            }
        }
        result
    }

    /// Read-only status poll. Requests of other users are reported as missing.
    pub async fn get_status(
        &self,
        request_id: &str,
        user_id: &str,
    ) -> Result<StatusView, PrepodavaiError> {
        let id = request_id.to_string();
        let req = self
            .db
            .read(move |conn| generations::get(conn, &id))
            .await?
            .filter(|req| req.user_id == user_id)
            .ok_or_else(|| PrepodavaiError::not_found("generation request", request_id))?;
        Ok(StatusView {
            status: req.status,
            result: req.result,
            error: req.error,
        })
    }
}
