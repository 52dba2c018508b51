// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks cross-field constraints that serde attributes cannot express,
//! such as lease length versus provider timeout.

use std::str::FromStr;

use prepodavai_core::GenerationType;

use crate::diagnostic::ConfigError;
use crate::model::PrepodavaiConfig;

/// Lease time reserved for delivery sends after generation and rendering.
pub const DELIVERY_MARGIN_SECS: u64 = 30;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PrepodavaiConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let queue = &config.queue;
    if queue.worker_concurrency == 0 {
        fail("queue.worker_concurrency must be at least 1".to_string());
    }
    if queue.max_attempts == 0 {
        fail("queue.max_attempts must be at least 1".to_string());
    }
    if queue.backoff_base_ms == 0 {
        fail("queue.backoff_base_ms must be greater than 0".to_string());
    }
    if queue.backoff_max_secs * 1000 < queue.backoff_base_ms {
        fail(format!(
            "queue.backoff_max_secs ({}) is shorter than queue.backoff_base_ms ({} ms)",
            queue.backoff_max_secs, queue.backoff_base_ms
        ));
    }
    // One lease covers the provider call, the PDF render and the sends.
    let render_secs = if config.render.enabled {
        config.render.timeout_secs
    } else {
        0
    };
    let held_secs = queue
        .provider_timeout_secs
        .saturating_add(render_secs)
        .saturating_add(DELIVERY_MARGIN_SECS);
    if queue.lease_secs <= held_secs {
        fail(format!(
            "queue.lease_secs ({}) must exceed queue.provider_timeout_secs ({}) + render.timeout_secs ({}) + {} s for delivery, or jobs are reclaimed while still being processed",
            queue.lease_secs, queue.provider_timeout_secs, render_secs, DELIVERY_MARGIN_SECS
        ));
    }

    if config.sweeper.enabled {
        if config.sweeper.interval_secs == 0 {
            fail("sweeper.interval_secs must be greater than 0".to_string());
        }
        if config.sweeper.stale_after_secs < queue.lease_secs {
            fail(format!(
                "sweeper.stale_after_secs ({}) must be at least queue.lease_secs ({})",
                config.sweeper.stale_after_secs, queue.lease_secs
            ));
        }
    }

    let render = &config.render;
    if render.timeout_secs == 0 {
        fail("render.timeout_secs must be greater than 0".to_string());
    }
    if render.math_wait_ms >= render.timeout_secs * 1000 {
        fail(format!(
            "render.math_wait_ms ({}) must be shorter than render.timeout_secs ({} s)",
            render.math_wait_ms, render.timeout_secs
        ));
    }
    if render.max_concurrent_pages == 0 {
        fail("render.max_concurrent_pages must be at least 1".to_string());
    }

    if let Some(url) = &config.provider.endpoint_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        fail(format!(
            "provider.endpoint_url `{url}` must be an http(s) URL"
        ));
    }

    for (op, cost) in &config.credits.cost_overrides {
        if GenerationType::from_str(op).is_err() {
            fail(format!(
                "credits.cost_overrides: unknown operation type `{op}`"
            ));
        }
        if *cost < 0 {
            fail(format!(
                "credits.cost_overrides.{op} must be non-negative, got {cost}"
            ));
        }
    }
    if config.credits.signup_grant < 0 {
        fail(format!(
            "credits.signup_grant must be non-negative, got {}",
            config.credits.signup_grant
        ));
    }

    if let Some(token) = &config.auth.service_token
        && token.len() < 16
    {
        fail("auth.service_token must be at least 16 characters".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &PrepodavaiConfig) -> Vec<String> {
        match validate_config(config) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&PrepodavaiConfig::default()).is_ok());
    }

    #[test]
    fn lease_must_outlive_provider_timeout() {
        let mut config = PrepodavaiConfig::default();
        config.queue.lease_secs = 60;
        config.queue.provider_timeout_secs = 120;
        config.sweeper.enabled = false;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("queue.lease_secs")), "{msgs:?}");
    }

    #[test]
    fn lease_must_cover_render_and_delivery_too() {
        let mut config = PrepodavaiConfig::default();
        config.sweeper.enabled = false;
        config.queue.provider_timeout_secs = 120;
        config.render.timeout_secs = 8;
        config.queue.lease_secs = 150;
        let msgs = messages(&config);
        assert!(
            msgs.iter().any(|m| m.contains("render.timeout_secs (8)")),
            "{msgs:?}"
        );

        config.queue.lease_secs = 159;
        assert!(messages(&config).is_empty());

        config.render.enabled = false;
        config.queue.lease_secs = 151;
        assert!(messages(&config).is_empty());
    }

    #[test]
    fn unknown_cost_override_is_rejected() {
        let mut config = PrepodavaiConfig::default();
        config.credits.cost_overrides.insert("essay".into(), 3);
        config.credits.cost_overrides.insert("quiz".into(), -1);
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("unknown operation type `essay`")));
        assert!(msgs.iter().any(|m| m.contains("credits.cost_overrides.quiz")));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = PrepodavaiConfig::default();
        config.queue.worker_concurrency = 0;
        config.render.max_concurrent_pages = 0;
        config.provider.endpoint_url = Some("ftp://nope".into());
        let msgs = messages(&config);
        assert_eq!(msgs.len(), 3, "{msgs:?}");
    }

    #[test]
    fn math_wait_must_fit_in_render_timeout() {
        let mut config = PrepodavaiConfig::default();
        config.render.math_wait_ms = 9000;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("render.math_wait_ms")));
    }
}
