// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the PrepodavAI generation pipeline.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and row-level queries for users,
//! subscriptions, the credit ledger, generation requests, and the job queue.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::{Database, map_call_err, map_tr_err, now, sql_err, timestamp};
pub use models::*;
