// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP bridge to an external generation service.
//!
//! Each job is POSTed as `{id, generation_type, input_params}`; the service
//! answers with a `GenerationOutput` JSON body (`{"kind": "text", ...}`).

use std::time::Duration;

use async_trait::async_trait;
use prepodavai_config::model::ProviderConfig;
use prepodavai_core::{
    AdapterType, GenerationJob, GenerationOutput, GenerationProvider, GenerationType,
    HealthStatus, PluginAdapter, PrepodavaiError,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    id: &'a str,
    generation_type: GenerationType,
    input_params: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Provider that forwards jobs to `provider.endpoint_url`.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, PrepodavaiError> {
        let endpoint = config
            .endpoint_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                PrepodavaiError::Config("provider.endpoint_url is required for workers".into())
            })?;

        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                PrepodavaiError::Config(format!("invalid provider API key header value: {e}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PrepodavaiError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint,
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Status codes worth one more try.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

#[async_trait]
impl PluginAdapter for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, PrepodavaiError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PrepodavaiError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationProvider for HttpProvider {
    async fn generate(&self, job: &GenerationJob) -> Result<GenerationOutput, PrepodavaiError> {
        let body = GenerateRequest {
            id: &job.id,
            generation_type: job.generation_type,
            input_params: &job.input_params,
        };

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(request_id = %job.id, attempt, "retrying generation after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| PrepodavaiError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(request_id = %job.id, status = %status, attempt, "provider responded");

            if status.is_success() {
                let text = response.text().await.map_err(|e| PrepodavaiError::Provider {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return serde_json::from_str(&text).map_err(|e| PrepodavaiError::Provider {
                    message: format!("malformed generation result: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => format!("generation service error ({status}): {}", body.error),
                Err(_) => format!("generation service returned {status}: {text}"),
            };
            if is_transient_error(status) && attempt < self.max_retries {
                last_error = Some(PrepodavaiError::provider(message));
                continue;
            }
            return Err(PrepodavaiError::provider(message));
        }

        Err(last_error
            .unwrap_or_else(|| PrepodavaiError::provider("generation failed after retries")))
    }
}
