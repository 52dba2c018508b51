// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery dispatcher for finished PrepodavAI generations.

pub mod dispatcher;
pub mod split;

pub use dispatcher::{DeliveryDispatcher, DeliveryOutcome, MAX_PHOTOS};
pub use split::split_message;
