// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User directory queries.

use prepodavai_core::PrepodavaiError;
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::sql_err;
use crate::models::UserRow;

const COLUMNS: &str = "id, telegram_user_id, telegram_chat_id, username, created_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        telegram_user_id: row.get(1)?,
        telegram_chat_id: row.get(2)?,
        username: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Insert a user with no chat address.
pub fn insert(conn: &Connection, id: &str) -> Result<(), PrepodavaiError> {
    conn.execute("INSERT INTO users (id) VALUES (?1)", params![id])
        .map_err(sql_err)?;
    Ok(())
}

/// Insert a user unless one with this id exists.
pub fn ensure(conn: &Connection, id: &str) -> Result<bool, PrepodavaiError> {
    let changed = conn
        .execute("INSERT OR IGNORE INTO users (id) VALUES (?1)", params![id])
        .map_err(sql_err)?;
    Ok(changed > 0)
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<UserRow>, PrepodavaiError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        row_to_user,
    )
    .optional()
    .map_err(sql_err)
}

pub fn find_by_telegram_id(
    conn: &Connection,
    telegram_user_id: i64,
) -> Result<Option<UserRow>, PrepodavaiError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE telegram_user_id = ?1"),
        params![telegram_user_id],
        row_to_user,
    )
    .optional()
    .map_err(sql_err)
}

/// Find or create the user behind a Telegram account, refreshing chat and username.
///
/// Returns the row and whether it was newly created.
pub fn upsert_telegram(
    conn: &Connection,
    new_id: &str,
    telegram_user_id: i64,
    telegram_chat_id: i64,
    username: Option<&str>,
) -> Result<(UserRow, bool), PrepodavaiError> {
    if let Some(existing) = find_by_telegram_id(conn, telegram_user_id)? {
        conn.execute(
            "UPDATE users SET telegram_chat_id = ?1, username = COALESCE(?2, username)
             WHERE id = ?3",
            params![telegram_chat_id, username, existing.id],
        )
        .map_err(sql_err)?;
        let user = get(conn, &existing.id)?.unwrap_or(existing);
        return Ok((user, false));
    }

    conn.execute(
        "INSERT INTO users (id, telegram_user_id, telegram_chat_id, username)
         VALUES (?1, ?2, ?3, ?4)",
        params![new_id, telegram_user_id, telegram_chat_id, username],
    )
    .map_err(sql_err)?;
    let user = get(conn, new_id)?
        .ok_or_else(|| PrepodavaiError::Internal(format!("user {new_id} vanished after insert")))?;
    Ok((user, true))
}

/// Chat address used for result delivery, if the user has one.
pub fn chat_id(conn: &Connection, user_id: &str) -> Result<Option<i64>, PrepodavaiError> {
    let chat: Option<Option<i64>> = conn
        .query_row(
            "SELECT telegram_chat_id FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(sql_err)?;
    Ok(chat.flatten())
}
