// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the PrepodavAI generation pipeline.

use thiserror::Error;

/// The primary error type used across adapter traits and pipeline operations.
#[derive(Debug, Error)]
pub enum PrepodavaiError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The user's spendable balance does not cover the operation and overage is off.
    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    /// Request parameters failed the per-type schema check.
    #[error("validation error: {0}")]
    Validation(String),

    /// The generation type is not registered.
    #[error("unknown generation type: {0}")]
    UnknownGenerationType(String),

    /// The user has no subscription to bill against.
    #[error("no subscription for user {user_id}")]
    NoSubscription { user_id: String },

    /// A looked-up entity does not exist (or is not visible to the caller).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A status change that the request state machine does not allow.
    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },

    /// Generation provider failure (upstream error, malformed output).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Delivery failed in a way that may succeed on retry (network, rate limit).
    #[error("transient delivery error: {message}")]
    DeliveryTransient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Delivery can never succeed for this target (bot blocked, chat gone).
    #[error("permanent delivery error: {message}")]
    DeliveryPermanent { message: String },

    /// Document rendering failed or timed out.
    #[error("rendering error: {message}")]
    Rendering { message: String },

    /// A job used up its retry budget.
    #[error("job {job_id} exhausted after {attempts} attempts")]
    QueueExhausted { job_id: i64, attempts: u32 },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Adapter health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PrepodavaiError {
    /// Whether the job queue should schedule another attempt after this error.
    ///
    /// Only delivery hiccups and storage contention are retried. Provider
    /// failures are terminal for the request (it is failed and refunded).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PrepodavaiError::DeliveryTransient { .. }
                | PrepodavaiError::Storage { .. }
                | PrepodavaiError::Internal(_)
        )
    }

    /// Terse machine-readable code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            PrepodavaiError::InsufficientCredits { .. } => "insufficient_credits",
            PrepodavaiError::Validation(_) => "validation_error",
            PrepodavaiError::UnknownGenerationType(_) => "unknown_generation_type",
            PrepodavaiError::NoSubscription { .. } => "no_subscription",
            PrepodavaiError::NotFound { .. } => "not_found",
            PrepodavaiError::InvalidTransition { .. } => "invalid_transition",
            PrepodavaiError::Provider { .. } => "provider_error",
            PrepodavaiError::DeliveryTransient { .. } => "delivery_transient",
            PrepodavaiError::DeliveryPermanent { .. } => "delivery_permanent",
            PrepodavaiError::Rendering { .. } => "rendering_error",
            PrepodavaiError::QueueExhausted { .. } => "processing_failed",
            PrepodavaiError::Timeout { .. } => "timeout",
            PrepodavaiError::Config(_)
            | PrepodavaiError::Storage { .. }
            | PrepodavaiError::HealthCheckFailed { .. }
            | PrepodavaiError::Internal(_) => "internal_error",
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        PrepodavaiError::Provider {
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        PrepodavaiError::DeliveryTransient {
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        PrepodavaiError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(PrepodavaiError::transient("timeout").is_retryable());
        assert!(
            PrepodavaiError::Storage {
                source: Box::new(std::io::Error::other("busy")),
            }
            .is_retryable()
        );
        assert!(!PrepodavaiError::provider("bad output").is_retryable());
        assert!(
            !PrepodavaiError::InsufficientCredits {
                required: 8,
                available: 5
            }
            .is_retryable()
        );
        assert!(
            !PrepodavaiError::Rendering {
                message: "timeout".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            PrepodavaiError::InsufficientCredits {
                required: 1,
                available: 0
            }
            .error_code(),
            "insufficient_credits"
        );
        assert_eq!(
            PrepodavaiError::Validation("x".into()).error_code(),
            "validation_error"
        );
        assert_eq!(
            PrepodavaiError::not_found("generation request", "abc").error_code(),
            "not_found"
        );
        assert_eq!(
            PrepodavaiError::Internal("boom".into()).error_code(),
            "internal_error"
        );
    }

    #[test]
    fn display_includes_context() {
        let err = PrepodavaiError::InsufficientCredits {
            required: 8,
            available: 5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient credits: required 8, available 5"
        );
        let err = PrepodavaiError::InvalidTransition {
            id: "r1".into(),
            from: "completed".into(),
            to: "failed".into(),
        };
        assert!(err.to_string().contains("completed -> failed"));
    }
}
