// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation request lifecycle for the PrepodavAI pipeline.
//!
//! - [`params`]: per-type parameter schemas and validation
//! - [`store`]: the request record and its guarded status changes
//! - [`orchestrator`]: submission (reserve + persist + enqueue) and status polls

pub mod orchestrator;
pub mod params;
pub mod store;

pub use orchestrator::{Orchestrator, StatusView, Submission};
pub use params::{GenerationParams, parse, resolve_type};
pub use store::{GenerationStore, complete_in, create_in, fail_in, fail_pending_in};
