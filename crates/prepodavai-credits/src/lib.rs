// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit accounting for the PrepodavAI generation pipeline.
//!
//! Credits are reserved when a request is accepted and refunded when it
//! fails. Every balance change is paired with an append-only ledger row whose
//! `balance_before`/`balance_after` chain can be replayed to audit the
//! stored balance.

pub mod costs;
pub mod ledger;
pub mod pricing;

pub use costs::CostTable;
pub use ledger::{
    ChainReport, CreditLedger, RefundOutcome, ReserveOutcome, grant_in, refund_in, reserve_in,
};
pub use pricing::{DebitPlan, plan_debit, plan_refund};
