// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document renderer trait (text/HTML to a paginated document).

use async_trait::async_trait;

use crate::error::PrepodavaiError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{RenderInput, RenderedDocument};

#[async_trait]
pub trait DocumentRenderer: PluginAdapter {
    /// Renders `input` to a document.
    ///
    /// Failures and timeouts surface as [`PrepodavaiError::Rendering`]; callers
    /// are expected to fall back to a plain-text delivery.
    async fn render_to_document(
        &self,
        input: RenderInput,
        filename: &str,
    ) -> Result<RenderedDocument, PrepodavaiError>;
}
