// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation request queries.
//!
//! Status changes are guarded with `WHERE status = 'pending'` and the delivery
//! flag with `WHERE sent_to_telegram = 0`, so the check and the write are one
//! statement. Callers inspect the returned row count.

use prepodavai_core::{GenerationOutput, PrepodavaiError};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::sql_err;
use crate::models::GenerationRequest;
use crate::queries::{json_column, parse_column};

const COLUMNS: &str = "id, user_id, generation_type, input_params, status, result, error, \
                       credit_cost, sent_to_telegram, telegram_sent_at, created_at, updated_at, \
                       delivered_parts";

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<GenerationRequest> {
    let input_params: Option<serde_json::Value> = json_column(row, 3)?;
    Ok(GenerationRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        generation_type: parse_column(row, 2)?,
        input_params: input_params.unwrap_or(serde_json::Value::Null),
        status: parse_column(row, 4)?,
        result: json_column(row, 5)?,
        error: row.get(6)?,
        credit_cost: row.get(7)?,
        sent_to_telegram: row.get(8)?,
        telegram_sent_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        delivered_parts: row.get(12)?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, PrepodavaiError> {
    serde_json::to_string(value).map_err(|e| PrepodavaiError::Storage {
        source: Box::new(e),
    })
}

/// Insert a new pending request.
pub fn insert(
    conn: &Connection,
    id: &str,
    user_id: &str,
    generation_type: &str,
    input_params: &serde_json::Value,
    credit_cost: i64,
) -> Result<(), PrepodavaiError> {
    conn.execute(
        "INSERT INTO generation_requests (id, user_id, generation_type, input_params, credit_cost)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, generation_type, to_json(input_params)?, credit_cost],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<GenerationRequest>, PrepodavaiError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM generation_requests WHERE id = ?1"),
        params![id],
        row_to_request,
    )
    .optional()
    .map_err(sql_err)
}

/// Set `completed` with a result. Returns the number of rows changed (0 or 1).
pub fn complete(
    conn: &Connection,
    id: &str,
    result: &GenerationOutput,
) -> Result<usize, PrepodavaiError> {
    conn.execute(
        "UPDATE generation_requests SET status = 'completed', result = ?1,
         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?2 AND status = 'pending'",
        params![to_json(result)?, id],
    )
    .map_err(sql_err)
}

/// Set `failed` with an error message. Returns the number of rows changed (0 or 1).
pub fn fail(conn: &Connection, id: &str, error: &str) -> Result<usize, PrepodavaiError> {
    conn.execute(
        "UPDATE generation_requests SET status = 'failed', error = ?1,
         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?2 AND status = 'pending'",
        params![error, id],
    )
    .map_err(sql_err)
}

/// Set the delivery flag. Returns 0 when it was already set.
pub fn mark_sent(conn: &Connection, id: &str) -> Result<usize, PrepodavaiError> {
    conn.execute(
        "UPDATE generation_requests SET sent_to_telegram = 1,
         telegram_sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1 AND sent_to_telegram = 0",
        params![id],
    )
    .map_err(sql_err)
}

/// Record that the first `parts` parts of a multi-part delivery reached the
/// chat. Never moves backwards and never touches a delivered request.
pub fn record_delivered_parts(
    conn: &Connection,
    id: &str,
    parts: u32,
) -> Result<usize, PrepodavaiError> {
    conn.execute(
        "UPDATE generation_requests SET delivered_parts = ?2,
         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1 AND sent_to_telegram = 0 AND delivered_parts < ?2",
        params![id, parts],
    )
    .map_err(sql_err)
}

pub fn list_for_user(
    conn: &Connection,
    user_id: &str,
    limit: i64,
) -> Result<Vec<GenerationRequest>, PrepodavaiError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM generation_requests
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![user_id, limit], row_to_request)
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Pending requests created before `older_than` that no worker currently holds.
///
/// A request is held when its job is `processing` with an unexpired lease.
pub fn list_stale_pending(
    conn: &Connection,
    older_than: &str,
    limit: i64,
) -> Result<Vec<String>, PrepodavaiError> {
    let mut stmt = conn
        .prepare(
            "SELECT r.id FROM generation_requests r
             LEFT JOIN jobs j ON j.generation_request_id = r.id
             WHERE r.status = 'pending' AND r.created_at < ?1
               AND (j.id IS NULL
                    OR j.status != 'processing'
                    OR j.locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
             ORDER BY r.created_at ASC LIMIT ?2",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![older_than, limit], |row| row.get(0))
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<String>, _>>().map_err(sql_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::users;
    use prepodavai_core::{GenerationStatus, GenerationType};

    async fn seeded() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        db.write(|tx| {
            users::insert(tx, "u1")?;
            insert(
                tx,
                "r1",
                "u1",
                "quiz",
                &serde_json::json!({"topic": "fractions"}),
                2,
            )
        })
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn new_request_is_pending() {
        let db = seeded().await;
        let req = db.read(|conn| get(conn, "r1")).await.unwrap().unwrap();
        assert_eq!(req.status, GenerationStatus::Pending);
        assert_eq!(req.generation_type, GenerationType::Quiz);
        assert_eq!(req.input_params["topic"], "fractions");
        assert!(req.result.is_none());
        assert!(!req.sent_to_telegram);
    }

    #[tokio::test]
    async fn status_changes_only_from_pending() {
        let db = seeded().await;
        let (done, again, failed) = db
            .write(|tx| {
                let out = GenerationOutput::text("quiz body");
                Ok((complete(tx, "r1", &out)?, complete(tx, "r1", &out)?, fail(tx, "r1", "x")?))
            })
            .await
            .unwrap();
        assert_eq!((done, again, failed), (1, 0, 0));

        let req = db.read(|conn| get(conn, "r1")).await.unwrap().unwrap();
        assert_eq!(req.status, GenerationStatus::Completed);
        assert_eq!(req.result, Some(GenerationOutput::text("quiz body")));
        assert!(req.error.is_none());
    }

    #[tokio::test]
    async fn schema_rejects_completed_without_result() {
        let db = seeded().await;
        let result = db
            .write(|tx| {
                tx.execute(
                    "UPDATE generation_requests SET status = 'completed' WHERE id = 'r1'",
                    [],
                )
                .map_err(sql_err)
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mark_sent_only_once() {
        let db = seeded().await;
        let (a, b) = db
            .write(|tx| Ok((mark_sent(tx, "r1")?, mark_sent(tx, "r1")?)))
            .await
            .unwrap();
        assert_eq!((a, b), (1, 0));
        let req = db.read(|conn| get(conn, "r1")).await.unwrap().unwrap();
        assert!(req.sent_to_telegram);
        assert!(req.telegram_sent_at.is_some());
    }

    #[tokio::test]
    async fn delivered_parts_only_move_forward() {
        let db = seeded().await;
        let changes = db
            .write(|tx| {
                Ok((
                    record_delivered_parts(tx, "r1", 2)?,
                    record_delivered_parts(tx, "r1", 1)?,
                    record_delivered_parts(tx, "r1", 2)?,
                ))
            })
            .await
            .unwrap();
        assert_eq!(changes, (1, 0, 0));
        let req = db.read(|conn| get(conn, "r1")).await.unwrap().unwrap();
        assert_eq!(req.delivered_parts, 2);

        let after_sent = db
            .write(|tx| {
                mark_sent(tx, "r1")?;
                record_delivered_parts(tx, "r1", 3)
            })
            .await
            .unwrap();
        assert_eq!(after_sent, 0);
    }

    #[tokio::test]
    async fn stale_listing_skips_leased_jobs() {
        let db = seeded().await;
        db.write(|tx| {
            insert(tx, "r2", "u1", "quiz", &serde_json::json!({}), 2)?;
            tx.execute(
                "INSERT INTO jobs (generation_request_id, status, locked_until)
                 VALUES ('r2', 'processing', '2999-01-01T00:00:00.000Z')",
                [],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
        .unwrap();

        let stale = db
            .read(|conn| list_stale_pending(conn, "2999-01-01T00:00:00.000Z", 10))
            .await
            .unwrap();
        assert_eq!(stale, vec!["r1".to_string()]);

        let none = db
            .read(|conn| list_stale_pending(conn, "2000-01-01T00:00:00.000Z", 10))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
