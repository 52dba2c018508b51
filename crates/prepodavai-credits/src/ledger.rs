// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit ledger over SQLite.
//!
//! Every balance mutation writes the subscription counters and appends a
//! `credit_transactions` row in the same transaction. The `*_in` functions
//! take a connection so callers can fold them into larger transactions
//! (request creation, mark-failed); the async methods wrap them in their own.

use prepodavai_core::{
    CreditTransaction, GenerationType, PrepodavaiError, Subscription, TransactionType,
};
use prepodavai_storage::Database;
use prepodavai_storage::queries::{subscriptions, transactions, users};
use prepodavai_storage::queries::transactions::NewTransaction;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::costs;
use crate::pricing::{plan_debit, plan_refund};

/// Result of a successful reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveOutcome {
    pub cost: i64,
    pub new_balance: i64,
    pub transaction: CreditTransaction,
}

/// Result of a refund attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    /// The charge was reversed now.
    Refunded { amount: i64, new_balance: i64 },
    /// A refund already exists; nothing changed.
    AlreadyRefunded { new_balance: i64 },
    /// The request was never charged; nothing changed.
    NotCharged,
}

impl RefundOutcome {
    pub fn new_balance(&self) -> Option<i64> {
        match self {
            RefundOutcome::Refunded { new_balance, .. }
            | RefundOutcome::AlreadyRefunded { new_balance } => Some(*new_balance),
            RefundOutcome::NotCharged => None,
        }
    }
}

/// Outcome of replaying a subscription's transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub entries: usize,
    pub replayed_balance: i64,
    pub current_spendable: i64,
    /// First transaction whose `balance_before`/`balance_after` does not line up.
    pub first_break: Option<i64>,
}

impl ChainReport {
    pub fn is_consistent(&self) -> bool {
        self.first_break.is_none() && self.replayed_balance == self.current_spendable
    }
}

fn subscription_for(conn: &Connection, user_id: &str) -> Result<Subscription, PrepodavaiError> {
    subscriptions::get_by_user(conn, user_id)?.ok_or_else(|| PrepodavaiError::NoSubscription {
        user_id: user_id.to_string(),
    })
}

/// Charge `cost` credits to `user_id`, optionally tied to a generation request.
pub fn reserve_in(
    conn: &Connection,
    user_id: &str,
    cost: i64,
    request_id: Option<&str>,
    description: &str,
) -> Result<ReserveOutcome, PrepodavaiError> {
    let sub = subscription_for(conn, user_id)?;
    let plan = plan_debit(&sub, cost)?;

    subscriptions::update_balances(conn, &sub.id, plan.after)?;
    let row = transactions::insert(
        conn,
        &NewTransaction {
            user_id,
            subscription_id: &sub.id,
            transaction_type: plan.transaction_type,
            amount: plan.amount,
            balance_before: plan.spendable_before(),
            balance_after: plan.spendable_after(),
            extra_part: plan.extra_part,
            overage_part: plan.overage_part,
            description,
            generation_request_id: request_id,
        },
    )?;

    if plan.overage_part > 0 {
        warn!(
            user_id,
            overage = plan.overage_part,
            balance = plan.after.credits_balance,
            "reservation went into overage"
        );
    }

    Ok(ReserveOutcome {
        cost,
        new_balance: plan.spendable_after(),
        transaction: row.transaction,
    })
}

/// Reverse the charge recorded for `request_id`, at most once.
pub fn refund_in(conn: &Connection, request_id: &str) -> Result<RefundOutcome, PrepodavaiError> {
    let Some(charge) = transactions::charge_for_request(conn, request_id)? else {
        return Ok(RefundOutcome::NotCharged);
    };
    let sub = subscriptions::get(conn, &charge.transaction.subscription_id)?.ok_or_else(|| {
        PrepodavaiError::not_found("subscription", charge.transaction.subscription_id.clone())
    })?;

    if transactions::refund_for_request(conn, request_id)?.is_some() {
        return Ok(RefundOutcome::AlreadyRefunded {
            new_balance: sub.spendable(),
        });
    }

    let amount = charge.transaction.amount;
    let after = plan_refund(
        subscriptions::Balances::from(&sub),
        amount,
        charge.extra_part,
        charge.overage_part,
    );
    subscriptions::update_balances(conn, &sub.id, after)?;
    let new_balance = after.credits_balance + after.extra_credits;
    transactions::insert(
        conn,
        &NewTransaction {
            user_id: &sub.user_id,
            subscription_id: &sub.id,
            transaction_type: TransactionType::Refund,
            amount,
            balance_before: sub.spendable(),
            balance_after: new_balance,
            extra_part: charge.extra_part,
            overage_part: charge.overage_part,
            description: "refund",
            generation_request_id: Some(request_id),
        },
    )?;

    Ok(RefundOutcome::Refunded {
        amount,
        new_balance,
    })
}

/// Add `amount` credits to the main balance, creating user and subscription if needed.
pub fn grant_in(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    description: &str,
) -> Result<i64, PrepodavaiError> {
    if amount <= 0 {
        return Err(PrepodavaiError::Validation(format!(
            "grant amount must be positive, got {amount}"
        )));
    }
    users::ensure(conn, user_id)?;
    let sub = match subscriptions::get_by_user(conn, user_id)? {
        Some(sub) => sub,
        None => subscriptions::insert(conn, &uuid::Uuid::new_v4().to_string(), user_id)?,
    };

    let mut after = subscriptions::Balances::from(&sub);
    after.credits_balance += amount;
    subscriptions::update_balances(conn, &sub.id, after)?;
    let new_balance = after.credits_balance + after.extra_credits;
    transactions::insert(
        conn,
        &NewTransaction {
            user_id,
            subscription_id: &sub.id,
            transaction_type: TransactionType::Grant,
            amount,
            balance_before: sub.spendable(),
            balance_after: new_balance,
            extra_part: 0,
            overage_part: 0,
            description,
            generation_request_id: None,
        },
    )?;
    Ok(new_balance)
}

/// Replay the transaction chain of `subscription_id` from a zero start.
pub fn verify_chain_in(
    conn: &Connection,
    subscription_id: &str,
) -> Result<ChainReport, PrepodavaiError> {
    let sub = subscriptions::get(conn, subscription_id)?
        .ok_or_else(|| PrepodavaiError::not_found("subscription", subscription_id))?;
    let rows = transactions::list_for_subscription(conn, subscription_id)?;

    let mut running = 0i64;
    let mut first_break = None;
    for row in &rows {
        let tx = &row.transaction;
        let expected_after = running + tx.transaction_type.signed(tx.amount);
        if first_break.is_none() && (tx.balance_before != running || tx.balance_after != expected_after) {
            first_break = Some(tx.id);
        }
        running = expected_after;
    }

    Ok(ChainReport {
        entries: rows.len(),
        replayed_balance: running,
        current_spendable: sub.spendable(),
        first_break,
    })
}

/// Async facade over the ledger functions, one transaction per call.
#[derive(Clone)]
pub struct CreditLedger {
    db: Database,
}

impl CreditLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Reserve the current price of `operation` for `user_id`.
    pub async fn reserve(
        &self,
        user_id: &str,
        operation: GenerationType,
    ) -> Result<ReserveOutcome, PrepodavaiError> {
        let user_id = user_id.to_string();
        let result = self
            .db
            .write(move |tx| {
                let cost = costs::cost_in(tx, operation)?;
                reserve_in(tx, &user_id, cost, None, operation.as_ref())
            })
            .await;
        record_reservation(&result);
        result
    }

    /// Reserve the price of `operation` and tie the charge to `request_id`.
    pub async fn reserve_for_request(
        &self,
        user_id: &str,
        operation: GenerationType,
        request_id: &str,
    ) -> Result<ReserveOutcome, PrepodavaiError> {
        let user_id = user_id.to_string();
        let request_id = request_id.to_string();
        let result = self
            .db
            .write(move |tx| {
                let cost = costs::cost_in(tx, operation)?;
                reserve_in(tx, &user_id, cost, Some(&request_id), operation.as_ref())
            })
            .await;
        record_reservation(&result);
        result
    }

    /// Refund the charge for `request_id`. Repeated calls are no-ops.
    pub async fn refund(&self, request_id: &str) -> Result<RefundOutcome, PrepodavaiError> {
        let id = request_id.to_string();
        let outcome = self.db.write(move |tx| refund_in(tx, &id)).await?;
        if let RefundOutcome::Refunded { amount, new_balance } = outcome {
            prepodavai_prometheus::record_refund();
            info!(request_id, amount, new_balance, "credits refunded");
        } else {
            debug!(request_id, ?outcome, "refund was a no-op");
        }
        Ok(outcome)
    }

    pub async fn grant(
        &self,
        user_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<i64, PrepodavaiError> {
        let user = user_id.to_string();
        let description = description.to_string();
        let new_balance = self
            .db
            .write(move |tx| grant_in(tx, &user, amount, &description))
            .await?;
        info!(user_id, amount, new_balance, "credits granted");
        Ok(new_balance)
    }

    /// Current subscription snapshot.
    pub async fn balance(&self, user_id: &str) -> Result<Subscription, PrepodavaiError> {
        let user_id = user_id.to_string();
        self.db.read(move |conn| subscription_for(conn, &user_id)).await
    }

    /// Most recent ledger entries, newest first.
    pub async fn history(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<CreditTransaction>, PrepodavaiError> {
        let user_id = user_id.to_string();
        self.db
            .read(move |conn| transactions::list_recent_for_user(conn, &user_id, limit))
            .await
    }

    pub async fn set_overage(
        &self,
        user_id: &str,
        allow: bool,
        cost_per_credit: Option<f64>,
    ) -> Result<(), PrepodavaiError> {
        let user_id = user_id.to_string();
        self.db
            .write(move |tx| {
                let sub = subscription_for(tx, &user_id)?;
                subscriptions::set_overage(tx, &sub.id, allow, cost_per_credit)
            })
            .await
    }

    /// Replay the user's history and compare it with the stored balance.
    pub async fn verify_chain(&self, user_id: &str) -> Result<ChainReport, PrepodavaiError> {
        let user_id = user_id.to_string();
        self.db
            .read(move |conn| {
                let sub = subscription_for(conn, &user_id)?;
                verify_chain_in(conn, &sub.id)
            })
            .await
    }
}

fn record_reservation(result: &Result<ReserveOutcome, PrepodavaiError>) {
    match result {
        Ok(_) => prepodavai_prometheus::record_reservation("ok"),
        Err(e) => prepodavai_prometheus::record_reservation(e.error_code()),
    }
}
