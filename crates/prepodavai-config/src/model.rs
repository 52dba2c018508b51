// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level PrepodavAI configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional and has working defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrepodavaiConfig {
    /// HTTP API settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Telegram delivery and Mini App auth settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Service-to-service auth for the web backend.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Job queue and worker pool settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Stale pending request reconciliation.
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// PDF rendering settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Generation provider endpoint.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Credit pricing settings.
    #[serde(default)]
    pub credits: CreditsConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the API server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Allowed CORS origins. Empty allows none.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("prepodavai").join("prepodavai.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("prepodavai.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Telegram configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. `None` disables chat delivery and Mini App auth.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Maximum age of Mini App init data before it is rejected.
    #[serde(default = "default_init_data_max_age_secs")]
    pub init_data_max_age_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            init_data_max_age_secs: default_init_data_max_age_secs(),
        }
    }
}

fn default_init_data_max_age_secs() -> u64 {
    86_400
}

/// Service-to-service authentication.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Bearer token the web backend presents along with `X-User-Id`.
    #[serde(default)]
    pub service_token: Option<String>,
}

/// Job queue and worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum jobs processed concurrently per process.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Attempts before a job is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential retry backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on retry backoff.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Idle poll interval when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a claimed job stays locked to its worker.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Upper bound on a single provider call.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// How long shutdown waits for in-flight jobs.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Run the worker pool inside `serve`.
    #[serde(default = "default_embedded_workers")]
    pub embedded_workers: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: default_worker_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_secs: default_backoff_max_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            lease_secs: default_lease_secs(),
            provider_timeout_secs: default_provider_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            embedded_workers: default_embedded_workers(),
        }
    }
}

fn default_worker_concurrency() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_backoff_max_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_lease_secs() -> u64 {
    300
}

fn default_provider_timeout_secs() -> u64 {
    120
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_embedded_workers() -> bool {
    true
}

/// Stale pending request sweeper.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SweeperConfig {
    #[serde(default = "default_sweeper_enabled")]
    pub enabled: bool,

    #[serde(default = "default_sweeper_interval_secs")]
    pub interval_secs: u64,

    /// Pending requests older than this (and not leased) are failed and refunded.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweeper_enabled(),
            interval_secs: default_sweeper_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

fn default_sweeper_enabled() -> bool {
    true
}

fn default_sweeper_interval_secs() -> u64 {
    300
}

fn default_stale_after_secs() -> u64 {
    3600
}

/// PDF rendering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// Render text results to PDF. When off, text is always sent as messages.
    #[serde(default = "default_render_enabled")]
    pub enabled: bool,

    /// Explicit Chrome/Chromium executable. Auto-detected when unset.
    #[serde(default)]
    pub chrome_path: Option<String>,

    /// Upper bound on a whole render, including browser launch.
    #[serde(default = "default_render_timeout_secs")]
    pub timeout_secs: u64,

    /// How long to wait for math typesetting before printing anyway.
    #[serde(default = "default_math_wait_ms")]
    pub math_wait_ms: u64,

    /// Pages rendered concurrently by the shared browser.
    #[serde(default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: usize,

    /// MathJax bundle injected into documents that contain TeX.
    #[serde(default = "default_mathjax_url")]
    pub mathjax_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: default_render_enabled(),
            chrome_path: None,
            timeout_secs: default_render_timeout_secs(),
            math_wait_ms: default_math_wait_ms(),
            max_concurrent_pages: default_max_concurrent_pages(),
            mathjax_url: default_mathjax_url(),
        }
    }
}

fn default_render_enabled() -> bool {
    true
}

fn default_render_timeout_secs() -> u64 {
    8
}

fn default_math_wait_ms() -> u64 {
    3000
}

fn default_max_concurrent_pages() -> usize {
    1
}

fn default_mathjax_url() -> String {
    "https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-svg.js".to_string()
}

/// Generation provider endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Endpoint that receives generation jobs. `None` disables processing.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Bearer token sent to the endpoint.
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP timeout for a single request.
    #[serde(default = "default_provider_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            api_key: None,
            timeout_secs: default_provider_http_timeout_secs(),
        }
    }
}

fn default_provider_http_timeout_secs() -> u64 {
    90
}

/// Credit pricing configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreditsConfig {
    /// Per-operation cost overrides written to `credit_costs` at startup.
    #[serde(default)]
    pub cost_overrides: BTreeMap<String, i64>,

    /// Credits granted to a user on first authenticated contact. 0 disables.
    #[serde(default)]
    pub signup_grant: i64,
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
