// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `prepodavai grant` and `prepodavai sweep` command implementations.

use prepodavai_config::PrepodavaiConfig;
use prepodavai_core::PrepodavaiError;
use prepodavai_credits::CreditLedger;
use prepodavai_storage::Database;
use prepodavai_worker::StaleSweeper;

use crate::serve::open_database;

/// Grant `amount` credits and return the new spendable balance.
pub async fn grant(
    db: &Database,
    user_id: &str,
    amount: i64,
    description: &str,
) -> Result<i64, PrepodavaiError> {
    CreditLedger::new(db.clone())
        .grant(user_id, amount, description)
        .await
}

/// Runs the `prepodavai grant` command.
pub async fn run_grant(
    config: &PrepodavaiConfig,
    user_id: &str,
    amount: i64,
    description: &str,
) -> Result<(), PrepodavaiError> {
    let db = open_database(config).await?;
    let balance = grant(&db, user_id, amount, description).await?;
    println!("granted {amount} credits to {user_id}, balance is now {balance}");
    db.close().await
}

/// Runs the `prepodavai sweep` command.
///
/// One reconciliation pass regardless of `sweeper.enabled`.
pub async fn run_sweep(config: &PrepodavaiConfig) -> Result<(), PrepodavaiError> {
    let db = open_database(config).await?;
    let swept = StaleSweeper::new(db.clone(), config.sweeper.clone())
        .sweep_once()
        .await?;
    println!("failed and refunded {swept} stale pending request(s)");
    db.close().await
}
