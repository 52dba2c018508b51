// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background processing for the PrepodavAI pipeline.
//!
//! - [`queue`]: durable job queue with leases, backoff and dead-lettering
//! - [`pool`]: bounded worker pool with graceful drain
//! - [`handler`]: generation job handler (provider call, completion, delivery)
//! - [`sweeper`]: fails and refunds requests stuck in `pending`
//! - [`http_provider`]: HTTP bridge to the generation service

pub mod backoff;
pub mod handler;
pub mod http_provider;
pub mod pool;
pub mod queue;
pub mod shutdown;
pub mod sweeper;

pub use backoff::backoff_delay;
pub use handler::{GenerationJobHandler, JobHandler};
pub use http_provider::HttpProvider;
pub use pool::{WorkerPool, process};
pub use queue::{FailOutcome, JobQueue, PROCESSING_FAILED, dead_letter_in};
pub use shutdown::install_signal_handler;
pub use sweeper::{REQUEST_EXPIRED, StaleSweeper};
