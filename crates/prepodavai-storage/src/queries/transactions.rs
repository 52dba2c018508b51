// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only credit transaction log.

use prepodavai_core::PrepodavaiError;
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::sql_err;
use crate::models::{CreditTransaction, LedgerRow, TransactionType};
use crate::queries::parse_column;

const COLUMNS: &str = "id, user_id, subscription_id, type, amount, balance_before, \
                       balance_after, description, generation_request_id, created_at, \
                       extra_part, overage_part";

fn row_to_ledger(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerRow> {
    Ok(LedgerRow {
        transaction: CreditTransaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            subscription_id: row.get(2)?,
            transaction_type: parse_column(row, 3)?,
            amount: row.get(4)?,
            balance_before: row.get(5)?,
            balance_after: row.get(6)?,
            description: row.get(7)?,
            generation_request_id: row.get(8)?,
            created_at: row.get(9)?,
        },
        extra_part: row.get(10)?,
        overage_part: row.get(11)?,
    })
}

/// A ledger entry about to be appended.
#[derive(Debug, Clone)]
pub struct NewTransaction<'a> {
    pub user_id: &'a str,
    pub subscription_id: &'a str,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub extra_part: i64,
    pub overage_part: i64,
    pub description: &'a str,
    pub generation_request_id: Option<&'a str>,
}

/// Append an entry and return it as stored.
pub fn insert(conn: &Connection, entry: &NewTransaction<'_>) -> Result<LedgerRow, PrepodavaiError> {
    conn.execute(
        "INSERT INTO credit_transactions (user_id, subscription_id, type, amount,
         balance_before, balance_after, extra_part, overage_part, description,
         generation_request_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            entry.user_id,
            entry.subscription_id,
            entry.transaction_type.as_ref(),
            entry.amount,
            entry.balance_before,
            entry.balance_after,
            entry.extra_part,
            entry.overage_part,
            entry.description,
            entry.generation_request_id,
        ],
    )
    .map_err(sql_err)?;
    let id = conn.last_insert_rowid();
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM credit_transactions WHERE id = ?1"),
        params![id],
        row_to_ledger,
    )
    .map_err(sql_err)
}

/// The charge (debit or overage) recorded against a generation request.
pub fn charge_for_request(
    conn: &Connection,
    request_id: &str,
) -> Result<Option<LedgerRow>, PrepodavaiError> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM credit_transactions
             WHERE generation_request_id = ?1 AND type IN ('debit', 'overage')"
        ),
        params![request_id],
        row_to_ledger,
    )
    .optional()
    .map_err(sql_err)
}

/// The refund recorded against a generation request, if any.
pub fn refund_for_request(
    conn: &Connection,
    request_id: &str,
) -> Result<Option<LedgerRow>, PrepodavaiError> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM credit_transactions
             WHERE generation_request_id = ?1 AND type = 'refund'"
        ),
        params![request_id],
        row_to_ledger,
    )
    .optional()
    .map_err(sql_err)
}

/// Every entry of a subscription, oldest first.
pub fn list_for_subscription(
    conn: &Connection,
    subscription_id: &str,
) -> Result<Vec<LedgerRow>, PrepodavaiError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM credit_transactions
             WHERE subscription_id = ?1 ORDER BY id ASC"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![subscription_id], row_to_ledger)
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Most recent entries of a user, newest first.
pub fn list_recent_for_user(
    conn: &Connection,
    user_id: &str,
    limit: i64,
) -> Result<Vec<CreditTransaction>, PrepodavaiError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM credit_transactions
             WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![user_id, limit], |row| {
            row_to_ledger(row).map(|l| l.transaction)
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}
