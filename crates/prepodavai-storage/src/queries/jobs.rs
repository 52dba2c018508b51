// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job queue rows. Retry policy lives in the worker; this module only moves rows.

use prepodavai_core::PrepodavaiError;
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::sql_err;
use crate::models::{JobEntry, QueueStats};
use crate::queries::parse_column;

const COLUMNS: &str = "id, generation_request_id, status, attempts, max_attempts, \
                       available_at, locked_until, last_error, created_at, updated_at";

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobEntry> {
    Ok(JobEntry {
        id: row.get(0)?,
        generation_request_id: row.get(1)?,
        status: parse_column(row, 2)?,
        attempts: row.get(3)?,
        max_attempts: row.get(4)?,
        available_at: row.get(5)?,
        locked_until: row.get(6)?,
        last_error: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<JobEntry>, PrepodavaiError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM jobs WHERE id = ?1"),
        params![id],
        row_to_job,
    )
    .optional()
    .map_err(sql_err)
}

pub fn get_by_request(
    conn: &Connection,
    request_id: &str,
) -> Result<Option<JobEntry>, PrepodavaiError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM jobs WHERE generation_request_id = ?1"),
        params![request_id],
        row_to_job,
    )
    .optional()
    .map_err(sql_err)
}

/// Insert the job for `request_id`, or return the existing one.
pub fn insert_or_get(
    conn: &Connection,
    request_id: &str,
    max_attempts: u32,
) -> Result<JobEntry, PrepodavaiError> {
    conn.execute(
        "INSERT INTO jobs (generation_request_id, max_attempts) VALUES (?1, ?2)
         ON CONFLICT(generation_request_id) DO NOTHING",
        params![request_id, max_attempts],
    )
    .map_err(sql_err)?;
    get_by_request(conn, request_id)?.ok_or_else(|| {
        PrepodavaiError::Internal(format!("job for {request_id} vanished after insert"))
    })
}

/// Claim the next runnable job and lease it until `locked_until`.
///
/// Runnable means pending with `available_at` in the past, or processing with
/// an expired lease (its worker died). Must run inside a transaction so the
/// select and the lease update are atomic.
pub fn claim_next(
    conn: &Connection,
    now: &str,
    locked_until: &str,
) -> Result<Option<JobEntry>, PrepodavaiError> {
    let candidate: Option<i64> = conn
        .query_row(
            "SELECT id FROM jobs
             WHERE (status = 'pending' AND available_at <= ?1)
                OR (status = 'processing' AND locked_until < ?1)
             ORDER BY available_at ASC, id ASC
             LIMIT 1",
            params![now],
            |row| row.get(0),
        )
        .optional()
        .map_err(sql_err)?;

    let Some(id) = candidate else {
        return Ok(None);
    };

    conn.execute(
        "UPDATE jobs SET status = 'processing', attempts = attempts + 1,
         locked_until = ?1, updated_at = ?2
         WHERE id = ?3",
        params![locked_until, now, id],
    )
    .map_err(sql_err)?;
    get(conn, id)
}

pub fn complete(conn: &Connection, id: i64) -> Result<(), PrepodavaiError> {
    conn.execute(
        "UPDATE jobs SET status = 'completed', locked_until = NULL,
         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1",
        params![id],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Release the lease and make the job runnable again at `available_at`.
pub fn reschedule(
    conn: &Connection,
    id: i64,
    available_at: &str,
    error: &str,
) -> Result<(), PrepodavaiError> {
    conn.execute(
        "UPDATE jobs SET status = 'pending', available_at = ?1, last_error = ?2,
         locked_until = NULL, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?3",
        params![available_at, error, id],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Park the job for good. Returns 0 if it was already dead.
pub fn dead_letter(conn: &Connection, id: i64, error: &str) -> Result<usize, PrepodavaiError> {
    conn.execute(
        "UPDATE jobs SET status = 'dead', last_error = ?1, locked_until = NULL,
         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?2 AND status != 'dead'",
        params![error, id],
    )
    .map_err(sql_err)
}

/// Return jobs with expired leases to pending. Returns how many were released.
pub fn reclaim_expired(conn: &Connection, now: &str) -> Result<usize, PrepodavaiError> {
    conn.execute(
        "UPDATE jobs SET status = 'pending', locked_until = NULL, available_at = ?1,
         last_error = COALESCE(last_error, 'lease expired'), updated_at = ?1
         WHERE status = 'processing' AND locked_until < ?1",
        params![now],
    )
    .map_err(sql_err)
}

pub fn list_dead(conn: &Connection, limit: i64) -> Result<Vec<JobEntry>, PrepodavaiError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM jobs WHERE status = 'dead' ORDER BY updated_at DESC LIMIT ?1"
        ))
        .map_err(sql_err)?;
    let rows = stmt.query_map(params![limit], row_to_job).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

pub fn stats(conn: &Connection) -> Result<QueueStats, PrepodavaiError> {
    let mut stmt = conn
        .prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(sql_err)?;

    let mut stats = QueueStats::default();
    for row in rows {
        let (status, count) = row.map_err(sql_err)?;
        match status.as_str() {
            "pending" => stats.pending = count,
            "processing" => stats.processing = count,
            "completed" => stats.completed = count,
            "dead" => stats.dead = count,
            _ => {}
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::models::JobStatus;
    use crate::queries::{generations, users};

    const T0: &str = "2026-01-01T00:00:00.000Z";
    const T1: &str = "2026-01-01T00:05:00.000Z";
    const T2: &str = "2026-01-01T00:10:00.000Z";

    async fn seeded(requests: &'static [&'static str]) -> Database {
        let db = Database::open_in_memory().await.unwrap();
        db.write(move |tx| {
            users::insert(tx, "u1")?;
            for id in requests {
                generations::insert(tx, id, "u1", "quiz", &serde_json::json!({}), 1)?;
                tx.execute(
                    "INSERT INTO jobs (generation_request_id, available_at) VALUES (?1, ?2)",
                    params![id, T0],
                )
                .map_err(sql_err)?;
            }
            Ok(())
        })
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_per_request() {
        let db = seeded(&[]).await;
        let (a, b) = db
            .write(|tx| {
                generations::insert(tx, "r1", "u1", "quiz", &serde_json::json!({}), 1)?;
                Ok((insert_or_get(tx, "r1", 3)?, insert_or_get(tx, "r1", 5)?))
            })
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.max_attempts, 3);
        assert_eq!(a.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn claim_leases_and_counts_attempts() {
        let db = seeded(&["r1"]).await;
        let claimed = db
            .write(|tx| claim_next(tx, T0, T1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.status, JobStatus::Processing);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.locked_until.as_deref(), Some(T1));

        // Lease still held at T0: nothing runnable.
        assert!(db.write(|tx| claim_next(tx, T0, T1)).await.unwrap().is_none());

        // Lease expired at T2: the same job is reclaimed.
        let again = db
            .write(|tx| claim_next(tx, T2, "2026-01-01T00:15:00.000Z"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.id, claimed.id);
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn reschedule_delays_next_claim() {
        let db = seeded(&["r1"]).await;
        let job = db.write(|tx| claim_next(tx, T0, T1)).await.unwrap().unwrap();
        db.write(move |tx| reschedule(tx, job.id, T2, "boom"))
            .await
            .unwrap();

        assert!(db.write(|tx| claim_next(tx, T1, T2)).await.unwrap().is_none());
        let retried = db
            .write(|tx| claim_next(tx, T2, "2026-01-01T00:15:00.000Z"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(retried.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn dead_jobs_are_listed_and_never_claimed() {
        let db = seeded(&["r1", "r2"]).await;
        let job = db.write(|tx| claim_next(tx, T0, T1)).await.unwrap().unwrap();
        let (first, second) = db
            .write(move |tx| Ok((dead_letter(tx, job.id, "exhausted")?, dead_letter(tx, job.id, "x")?)))
            .await
            .unwrap();
        assert_eq!((first, second), (1, 0));

        let dead = db.read(|conn| list_dead(conn, 10)).await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].last_error.as_deref(), Some("exhausted"));

        let next = db.write(|tx| claim_next(tx, T2, T2)).await.unwrap().unwrap();
        assert_eq!(next.generation_request_id, "r2");

        let stats = db.read(stats).await.unwrap();
        assert_eq!(stats.dead, 1);
        assert_eq!(stats.processing, 1);
    }

    #[tokio::test]
    async fn reclaim_expired_releases_only_stale_leases() {
        let db = seeded(&["r1", "r2"]).await;
        db.write(|tx| {
            claim_next(tx, T0, T1)?;
            claim_next(tx, T0, T2)?;
            Ok(())
        })
        .await
        .unwrap();

        let released = db
            .write(|tx| reclaim_expired(tx, "2026-01-01T00:06:00.000Z"))
            .await
            .unwrap();
        assert_eq!(released, 1);
        let stats = db.read(stats).await.unwrap();
        assert_eq!((stats.pending, stats.processing), (1, 1));
    }
}
