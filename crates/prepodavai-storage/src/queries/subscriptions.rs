// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription queries.
//!
//! Balance columns are only ever written by the credit ledger, together with a
//! `credit_transactions` row in the same transaction.

use prepodavai_core::PrepodavaiError;
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::sql_err;
use crate::models::{Subscription, SubscriptionStatus};
use crate::queries::parse_column;

const COLUMNS: &str = "id, user_id, credits_balance, extra_credits, credits_used, \
                       overage_credits_used, status, allow_overage, overage_cost_per_credit, \
                       created_at, updated_at";

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        credits_balance: row.get(2)?,
        extra_credits: row.get(3)?,
        credits_used: row.get(4)?,
        overage_credits_used: row.get(5)?,
        status: parse_column(row, 6)?,
        allow_overage: row.get(7)?,
        overage_cost_per_credit: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Subscription>, PrepodavaiError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM subscriptions WHERE id = ?1"),
        params![id],
        row_to_subscription,
    )
    .optional()
    .map_err(sql_err)
}

pub fn get_by_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<Subscription>, PrepodavaiError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM subscriptions WHERE user_id = ?1"),
        params![user_id],
        row_to_subscription,
    )
    .optional()
    .map_err(sql_err)
}

/// Create an empty active subscription for `user_id`.
pub fn insert(conn: &Connection, id: &str, user_id: &str) -> Result<Subscription, PrepodavaiError> {
    conn.execute(
        "INSERT INTO subscriptions (id, user_id) VALUES (?1, ?2)",
        params![id, user_id],
    )
    .map_err(sql_err)?;
    get(conn, id)?
        .ok_or_else(|| PrepodavaiError::Internal(format!("subscription {id} vanished after insert")))
}

/// Balance counters written back after a ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balances {
    pub credits_balance: i64,
    pub extra_credits: i64,
    pub credits_used: i64,
    pub overage_credits_used: i64,
}

impl From<&Subscription> for Balances {
    fn from(s: &Subscription) -> Self {
        Self {
            credits_balance: s.credits_balance,
            extra_credits: s.extra_credits,
            credits_used: s.credits_used,
            overage_credits_used: s.overage_credits_used,
        }
    }
}

pub fn update_balances(
    conn: &Connection,
    id: &str,
    balances: Balances,
) -> Result<(), PrepodavaiError> {
    let changed = conn
        .execute(
            "UPDATE subscriptions SET credits_balance = ?1, extra_credits = ?2,
             credits_used = ?3, overage_credits_used = ?4,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?5",
            params![
                balances.credits_balance,
                balances.extra_credits,
                balances.credits_used,
                balances.overage_credits_used,
                id
            ],
        )
        .map_err(sql_err)?;
    if changed == 0 {
        return Err(PrepodavaiError::not_found("subscription", id));
    }
    Ok(())
}

pub fn set_overage(
    conn: &Connection,
    id: &str,
    allow_overage: bool,
    cost_per_credit: Option<f64>,
) -> Result<(), PrepodavaiError> {
    conn.execute(
        "UPDATE subscriptions SET allow_overage = ?1, overage_cost_per_credit = ?2,
         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?3",
        params![allow_overage, cost_per_credit, id],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn set_status(
    conn: &Connection,
    id: &str,
    status: SubscriptionStatus,
) -> Result<(), PrepodavaiError> {
    conn.execute(
        "UPDATE subscriptions SET status = ?1,
         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?2",
        params![status.as_ref(), id],
    )
    .map_err(sql_err)?;
    Ok(())
}
