// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the PrepodavAI pipeline.
//!
//! Pipeline crates record through the helpers in [`recording`]; this crate
//! installs the exporter and renders the text format for `GET /metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use prepodavai_core::{AdapterType, HealthStatus, PluginAdapter, PrepodavaiError};

pub use recording::{
    record_delivery, record_finished, record_job_attempt, record_provider_latency,
    record_refund, record_render, record_reservation, record_submitted, record_swept,
    set_queue_depth,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder globally and keeps the handle for rendering.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the recorder. Fails if a recorder is already installed in this process.
    pub fn new() -> Result<Self, PrepodavaiError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            PrepodavaiError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, PrepodavaiError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PrepodavaiError> {
        Ok(())
    }
}
