// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "prepodavai_generations_submitted_total",
        "Generation requests accepted, by type"
    );
    describe_counter!(
        "prepodavai_generations_finished_total",
        "Generation requests that reached a terminal status"
    );
    describe_counter!(
        "prepodavai_reservations_total",
        "Credit reservations by outcome"
    );
    describe_counter!("prepodavai_refunds_total", "Credit refunds applied");
    describe_counter!("prepodavai_job_attempts_total", "Job attempts by outcome");
    describe_counter!("prepodavai_deliveries_total", "Chat deliveries by kind and outcome");
    describe_counter!("prepodavai_renders_total", "Document renders by outcome");
    describe_counter!(
        "prepodavai_swept_requests_total",
        "Stale pending requests failed by the sweeper"
    );
    describe_gauge!("prepodavai_queue_pending", "Jobs waiting to be claimed");
    describe_gauge!("prepodavai_queue_dead", "Dead-lettered jobs");
    describe_histogram!(
        "prepodavai_provider_latency_seconds",
        "Generation provider call latency in seconds"
    );
    describe_histogram!(
        "prepodavai_render_latency_seconds",
        "Document render latency in seconds"
    );
}

pub fn record_submitted(generation_type: &str) {
    metrics::counter!("prepodavai_generations_submitted_total", "type" => generation_type.to_string())
        .increment(1);
}

/// `status` is `completed` or `failed`.
pub fn record_finished(generation_type: &str, status: &'static str) {
    metrics::counter!(
        "prepodavai_generations_finished_total",
        "type" => generation_type.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn record_reservation(outcome: &'static str) {
    metrics::counter!("prepodavai_reservations_total", "outcome" => outcome).increment(1);
}

pub fn record_refund() {
    metrics::counter!("prepodavai_refunds_total").increment(1);
}

/// `outcome` is `ok`, `retry` or `dead`.
pub fn record_job_attempt(outcome: &'static str) {
    metrics::counter!("prepodavai_job_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_delivery(kind: &'static str, outcome: &'static str) {
    metrics::counter!("prepodavai_deliveries_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}

pub fn record_render(outcome: &'static str, seconds: f64) {
    metrics::counter!("prepodavai_renders_total", "outcome" => outcome).increment(1);
    metrics::histogram!("prepodavai_render_latency_seconds").record(seconds);
}

pub fn record_swept(count: u64) {
    metrics::counter!("prepodavai_swept_requests_total").increment(count);
}

pub fn set_queue_depth(pending: i64, dead: i64) {
    metrics::gauge!("prepodavai_queue_pending").set(pending as f64);
    metrics::gauge!("prepodavai_queue_dead").set(dead as f64);
}

pub fn record_provider_latency(seconds: f64) {
    metrics::histogram!("prepodavai_provider_latency_seconds").record(seconds);
}
