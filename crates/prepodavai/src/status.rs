// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `prepodavai status` command implementation.
//!
//! Reads a generation request and its job straight from the database.

use prepodavai_config::PrepodavaiConfig;
use prepodavai_core::{GenerationRequest, PrepodavaiError};
use prepodavai_generation::GenerationStore;
use prepodavai_storage::{Database, JobEntry};
use prepodavai_worker::JobQueue;
use serde::Serialize;

use crate::serve::open_database;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub request: GenerationRequest,
    pub job: Option<JobEntry>,
}

pub async fn lookup(
    db: &Database,
    config: &PrepodavaiConfig,
    request_id: &str,
) -> Result<StatusReport, PrepodavaiError> {
    let request = GenerationStore::new(db.clone()).get(request_id).await?;
    let job = JobQueue::new(db.clone(), config.queue.clone())
        .get_by_request(request_id)
        .await?;
    Ok(StatusReport { request, job })
}

fn render_text(report: &StatusReport) -> String {
    let req = &report.request;
    let mut out = vec![
        format!("  request   {}", req.id),
        format!("  type      {}", req.generation_type),
        format!("  user      {}", req.user_id),
        format!("  status    {}", req.status),
        format!("  cost      {} credits", req.credit_cost),
        format!(
            "  delivered {}",
            if req.sent_to_telegram { "yes" } else { "no" }
        ),
    ];
    if let Some(error) = &req.error {
        out.push(format!("  error     {error}"));
    }
    if let Some(job) = &report.job {
        out.push(format!(
            "  job       #{} {} ({}/{} attempts)",
            job.id, job.status, job.attempts, job.max_attempts
        ));
        if let Some(last) = &job.last_error {
            out.push(format!("  last err  {last}"));
        }
    }
    out.join("\n")
}

/// Runs the `prepodavai status` command.
pub async fn run_status(
    config: &PrepodavaiConfig,
    request_id: &str,
    json: bool,
) -> Result<(), PrepodavaiError> {
    let db = open_database(config).await?;
    let report = lookup(&db, config, request_id).await;
    db.close().await?;
    let report = report?;

    if json {
        let body = serde_json::to_string_pretty(&report)
            .map_err(|e| PrepodavaiError::Internal(format!("failed to encode status: {e}")))?;
        println!("{body}");
    } else {
        println!();
        println!("{}", render_text(&report));
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prepodavai_core::GenerationType;
    use prepodavai_credits::CreditLedger;
    use prepodavai_generation::Orchestrator;
    use serde_json::json;

    #[tokio::test]
    async fn status_reports_request_and_job() {
        let db = Database::open_in_memory().await.unwrap();
        CreditLedger::new(db.clone())
            .grant("u1", 10, "test")
            .await
            .unwrap();
        let sub = Orchestrator::new(db.clone(), 3)
            .submit(
                "u1",
                GenerationType::Vocabulary,
                json!({"topic": "Food", "language": "de"}),
            )
            .await
            .unwrap();

        let config = PrepodavaiConfig::default();
        let report = lookup(&db, &config, &sub.request_id).await.unwrap();
        let text = render_text(&report);
        assert!(text.contains("vocabulary"));
        assert!(text.contains("pending"));
        assert!(text.contains("0/3 attempts"));

        let encoded = serde_json::to_value(&report).unwrap();
        assert_eq!(encoded["request"]["id"], sub.request_id.as_str());
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = lookup(&db, &PrepodavaiConfig::default(), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, PrepodavaiError::NotFound { .. }));
    }
}
