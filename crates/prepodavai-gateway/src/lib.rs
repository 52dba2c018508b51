// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST API for PrepodavAI.
//!
//! Accepts generation requests, answers status polls and balance queries.
//! Work is handed to the job queue; the API never waits on a provider.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::{AuthConfig, AuthenticatedUser};
pub use handlers::ApiError;
pub use server::{GatewayState, HealthState, router, start_server};
