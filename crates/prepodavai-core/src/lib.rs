// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the PrepodavAI generation pipeline.
//!
//! This crate provides the error type, the domain types shared by every
//! pipeline stage, and the adapter traits for external collaborators
//! (chat channel, generation provider, document renderer).

pub mod error;
pub mod traits;
pub mod types;

pub use error::PrepodavaiError;
pub use types::{
    AdapterType, CreditTransaction, DocumentSource, GenerationJob, GenerationOutput,
    GenerationRequest, GenerationStatus, GenerationType, HealthStatus, MessageId, RenderInput,
    RenderedDocument, Subscription, SubscriptionStatus, TextFormat, TransactionType,
};

pub use traits::{DeliveryChannel, DocumentRenderer, GenerationProvider, PluginAdapter};
