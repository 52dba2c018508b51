// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PDF rendering side-channel for the PrepodavAI delivery stage.
//!
//! [`PdfRenderer`] implements [`DocumentRenderer`] on top of a shared
//! [`RenderEngine`]. The engine is created once by the binary and passed in by
//! `Arc`; it owns the browser process and must be shut down on exit.

pub mod engine;
pub mod markup;

use std::sync::Arc;

use async_trait::async_trait;
use prepodavai_core::{
    AdapterType, DocumentRenderer, HealthStatus, PluginAdapter, PrepodavaiError, RenderInput,
    RenderedDocument,
};

pub use engine::RenderEngine;
pub use markup::{PreparedPage, contains_math, escape_html, prepare};

pub const PDF_MIME: &str = "application/pdf";

/// Ensure the document name ends in `.pdf`.
pub fn pdf_filename(stem: &str) -> String {
    let stem = stem.trim();
    let stem = if stem.is_empty() { "document" } else { stem };
    if stem.to_ascii_lowercase().ends_with(".pdf") {
        stem.to_string()
    } else {
        format!("{stem}.pdf")
    }
}

pub struct PdfRenderer {
    engine: Arc<RenderEngine>,
}

impl PdfRenderer {
    pub fn new(engine: Arc<RenderEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<RenderEngine> {
        &self.engine
    }
}

#[async_trait]
impl PluginAdapter for PdfRenderer {
    fn name(&self) -> &str {
        "pdf"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Renderer
    }

    async fn health_check(&self) -> Result<HealthStatus, PrepodavaiError> {
        Ok(if !self.engine.config().enabled {
            HealthStatus::Degraded("rendering disabled, text fallback only".into())
        } else if self.engine.is_closed() {
            HealthStatus::Unhealthy("render engine shut down".into())
        } else {
            HealthStatus::Healthy
        })
    }

    async fn shutdown(&self) -> Result<(), PrepodavaiError> {
        self.engine.shutdown().await
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    async fn render_to_document(
        &self,
        input: RenderInput,
        filename: &str,
    ) -> Result<RenderedDocument, PrepodavaiError> {
        let page = prepare(&input, &self.engine.config().mathjax_url);
        let bytes = self.engine.print_pdf(&page).await?;
        Ok(RenderedDocument {
            bytes,
            filename: pdf_filename(filename),
            mime: PDF_MIME,
        })
    }
}
