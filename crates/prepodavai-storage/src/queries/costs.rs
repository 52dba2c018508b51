// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit cost table queries.

use prepodavai_core::PrepodavaiError;
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::sql_err;
use crate::models::CreditCost;

fn row_to_cost(row: &rusqlite::Row<'_>) -> rusqlite::Result<CreditCost> {
    Ok(CreditCost {
        operation_type: row.get(0)?,
        credit_cost: row.get(1)?,
        is_active: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

pub fn get(conn: &Connection, operation_type: &str) -> Result<Option<CreditCost>, PrepodavaiError> {
    conn.query_row(
        "SELECT operation_type, credit_cost, is_active, updated_at
         FROM credit_costs WHERE operation_type = ?1",
        params![operation_type],
        row_to_cost,
    )
    .optional()
    .map_err(sql_err)
}

pub fn list(conn: &Connection) -> Result<Vec<CreditCost>, PrepodavaiError> {
    let mut stmt = conn
        .prepare(
            "SELECT operation_type, credit_cost, is_active, updated_at
             FROM credit_costs ORDER BY operation_type",
        )
        .map_err(sql_err)?;
    let rows = stmt.query_map([], row_to_cost).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Set the price of an operation, activating it.
pub fn upsert(conn: &Connection, operation_type: &str, credit_cost: i64) -> Result<(), PrepodavaiError> {
    conn.execute(
        "INSERT INTO credit_costs (operation_type, credit_cost, is_active) VALUES (?1, ?2, 1)
         ON CONFLICT(operation_type) DO UPDATE SET credit_cost = excluded.credit_cost,
         is_active = 1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        params![operation_type, credit_cost],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn set_active(
    conn: &Connection,
    operation_type: &str,
    active: bool,
) -> Result<bool, PrepodavaiError> {
    let changed = conn
        .execute(
            "UPDATE credit_costs SET is_active = ?1,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE operation_type = ?2",
            params![active, operation_type],
        )
        .map_err(sql_err)?;
    Ok(changed > 0)
}
