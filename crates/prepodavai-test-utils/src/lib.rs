// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for PrepodavAI integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Generation provider with scripted replies
//! - [`MockChannel`] - Delivery channel that captures sends and scripts failures
//! - [`MockRenderer`] - Renderer that succeeds, fails or hangs
//! - [`TestHarness`] - The whole pipeline over a temp database

pub mod harness;
pub mod mock_channel;
pub mod mock_provider;
pub mod mock_renderer;

pub use harness::{TEST_CHAT_ID, TestHarness, TestHarnessBuilder};
pub use mock_channel::{Failure, MockChannel, SentItem};
pub use mock_provider::{MockProvider, Reply};
pub use mock_renderer::{MockRenderer, RenderMode};
