// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stale-request sweeper.
//!
//! Fails and refunds pending requests that have sat unclaimed for longer
//! than `sweeper.stale_after_secs`, and dead-letters their jobs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use prepodavai_config::model::SweeperConfig;
use prepodavai_core::PrepodavaiError;
use prepodavai_generation::{GenerationStore, fail_pending_in};
use prepodavai_storage::Database;
use prepodavai_storage::queries::jobs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Error recorded on swept requests.
pub const REQUEST_EXPIRED: &str = "request expired";

const BATCH: i64 = 100;

pub struct StaleSweeper {
    db: Database,
    store: GenerationStore,
    config: SweeperConfig,
}

impl StaleSweeper {
    pub fn new(db: Database, config: SweeperConfig) -> Self {
        Self {
            store: GenerationStore::new(db.clone()),
            db,
            config,
        }
    }

    pub async fn sweep_once(&self) -> Result<usize, PrepodavaiError> {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep requests created before `now - stale_after`. Returns how many failed.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize, PrepodavaiError> {
        let cutoff = now - chrono::Duration::seconds(self.config.stale_after_secs as i64);
        let mut swept = 0;
        loop {
            let ids = self.store.list_stale_pending(cutoff, BATCH).await?;
            let batch = ids.len();
            for id in ids {
                let refund = self
                    .db
                    .write(move |tx| {
                        let refund = fail_pending_in(tx, &id, REQUEST_EXPIRED)?;
                        if refund.is_some()
                            && let Some(job) = jobs::get_by_request(tx, &id)?
                        {
                            jobs::dead_letter(tx, job.id, REQUEST_EXPIRED)?;
                        }
                        Ok(refund.map(|r| (id, r)))
                    })
                    .await?;
                if let Some((id, refund)) = refund {
                    swept += 1;
                    debug!(request_id = %id, ?refund, "stale request failed");
                }
            }
            if (batch as i64) < BATCH {
                break;
            }
        }
        if swept > 0 {
            prepodavai_prometheus::record_swept(swept as u64);
            info!(swept, "stale pending requests failed and refunded");
        }
        Ok(swept)
    }

    /// Sweep every `interval_secs` until cancelled. Returns at once when disabled.
    pub async fn run(&self, cancel: CancellationToken) {
        if !self.config.enabled {
            debug!("stale-request sweeper disabled");
            return;
        }
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "stale-request sweep failed");
                    }
                }
            }
        }
        debug!("stale-request sweeper stopped");
    }
}
