// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation provider trait. The pipeline does not care which model runs.

use async_trait::async_trait;

use crate::error::PrepodavaiError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationJob, GenerationOutput};

/// Performs the actual content generation for a job.
#[async_trait]
pub trait GenerationProvider: PluginAdapter {
    /// Generates the output for `job`.
    ///
    /// Any error is terminal for the request: the worker marks it failed and
    /// refunds the reservation.
    async fn generate(&self, job: &GenerationJob) -> Result<GenerationOutput, PrepodavaiError>;
}
