// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock document renderer.
//!
//! Produces a fake PDF, fails, or hangs until the render timeout fires. The
//! hang goes through the same [`bounded`] wrapper the real engine uses.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use prepodavai_core::{
    AdapterType, DocumentRenderer, HealthStatus, PluginAdapter, PrepodavaiError, RenderInput,
    RenderedDocument,
};
use prepodavai_render::engine::bounded;
use prepodavai_render::{PDF_MIME, pdf_filename};

/// Behaviour of the next renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Succeed,
    Fail,
    /// Never finish; the call errors after `timeout`.
    Hang { timeout: Duration },
}

pub struct MockRenderer {
    mode: Mutex<RenderMode>,
    calls: AtomicUsize,
}

impl MockRenderer {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: RenderMode) {
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn mode(&self) -> RenderMode {
        self.mode
            .lock()
            .map(|m| *m)
            .unwrap_or(RenderMode::Succeed)
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new(RenderMode::Succeed)
    }
}

#[async_trait]
impl PluginAdapter for MockRenderer {
    fn name(&self) -> &str {
        "mock-renderer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Renderer
    }

    async fn health_check(&self) -> Result<HealthStatus, PrepodavaiError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PrepodavaiError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentRenderer for MockRenderer {
    async fn render_to_document(
        &self,
        input: RenderInput,
        filename: &str,
    ) -> Result<RenderedDocument, PrepodavaiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            RenderMode::Succeed => {
                let body = match input {
                    RenderInput::Text(t) | RenderInput::Html(t) => t,
                };
                let mut bytes = b"%PDF-1.7\n".to_vec();
                bytes.extend_from_slice(body.as_bytes());
                Ok(RenderedDocument {
                    bytes,
                    filename: pdf_filename(filename),
                    mime: PDF_MIME,
                })
            }
            RenderMode::Fail => Err(PrepodavaiError::Rendering {
                message: "mock: browser crashed".into(),
            }),
            RenderMode::Hang { timeout } => {
                bounded(timeout, std::future::pending::<Result<RenderedDocument, PrepodavaiError>>())
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeed_produces_pdf_bytes() {
        let renderer = MockRenderer::default();
        let doc = renderer
            .render_to_document(RenderInput::Text("hi".into()), "quiz-1")
            .await
            .unwrap();
        assert!(doc.bytes.starts_with(b"%PDF"));
        assert_eq!(doc.filename, pdf_filename("quiz-1"));
        assert_eq!(doc.mime, PDF_MIME);
    }

    #[tokio::test(start_paused = true)]
    async fn hang_times_out_as_rendering_error() {
        let renderer = MockRenderer::new(RenderMode::Hang {
            timeout: Duration::from_secs(8),
        });
        let err = renderer
            .render_to_document(RenderInput::Text("hi".into()), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, PrepodavaiError::Rendering { .. }));
        assert_eq!(renderer.calls(), 1);
    }
}
