// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod channel;
pub mod provider;
pub mod renderer;

pub use adapter::PluginAdapter;
pub use channel::DeliveryChannel;
pub use provider::GenerationProvider;
pub use renderer::DocumentRenderer;
