// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-only row types.
//!
//! Types that cross crate boundaries (requests, subscriptions, ledger entries)
//! live in `prepodavai-core::types` and are re-exported here.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

pub use prepodavai_core::types::{
    CreditTransaction, GenerationRequest, GenerationStatus, Subscription, SubscriptionStatus,
    TransactionType,
};

/// A row of the `users` directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub telegram_user_id: Option<i64>,
    pub telegram_chat_id: Option<i64>,
    pub username: Option<String>,
    pub created_at: String,
}

/// A ledger entry plus how its amount was split across balance pools.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub transaction: CreditTransaction,
    /// Portion taken from (or returned to) `extra_credits`.
    pub extra_part: i64,
    /// Portion that pushed `credits_balance` below zero.
    pub overage_part: i64,
}

/// Price of one operation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCost {
    pub operation_type: String,
    pub credit_cost: i64,
    pub is_active: bool,
    pub updated_at: String,
}

/// Queue envelope status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Dead,
}

/// A row of the `jobs` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: i64,
    pub generation_request_id: String,
    pub status: JobStatus,
    /// Attempts started so far (incremented on every claim).
    pub attempts: u32,
    pub max_attempts: u32,
    pub available_at: String,
    pub locked_until: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Job counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub dead: i64,
}
