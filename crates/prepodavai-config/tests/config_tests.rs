// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use prepodavai_config::diagnostic::ConfigError;
use prepodavai_config::model::PrepodavaiConfig;
use prepodavai_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
log_level = "debug"
cors_origins = ["https://app.prepodavai.ru"]

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[telegram]
bot_token = "123:ABC"
init_data_max_age_secs = 600

[auth]
service_token = "0123456789abcdef0123"

[queue]
worker_concurrency = 8
max_attempts = 5
lease_secs = 600

[sweeper]
stale_after_secs = 7200

[render]
timeout_secs = 10
chrome_path = "/usr/bin/chromium"

[provider]
endpoint_url = "http://localhost:9000/generate"

[credits]
signup_grant = 10

[credits.cost_overrides]
presentation = 12
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.cors_origins.len(), 1);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.telegram.bot_token.as_deref(), Some("123:ABC"));
    assert_eq!(config.queue.worker_concurrency, 8);
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.sweeper.stale_after_secs, 7200);
    assert_eq!(config.render.chrome_path.as_deref(), Some("/usr/bin/chromium"));
    assert_eq!(config.credits.cost_overrides.get("presentation"), Some(&12));
    assert_eq!(config.credits.signup_grant, 10);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.queue.worker_concurrency, 5);
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.queue.lease_secs, 300);
    assert_eq!(config.render.timeout_secs, 8);
    assert_eq!(config.render.max_concurrent_pages, 1);
    assert!(config.sweeper.enabled);
    assert!(config.telegram.bot_token.is_none());
    assert!(config.provider.endpoint_url.is_none());
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[queue]
max_atempts = 3
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown key");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion: Some(s), .. }
                if key == "max_atempts" && s == "max_attempts"
        )
    });
    assert!(found, "expected a suggestion, got {errors:?}");
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let err = load_config_from_str("[agent]\nname = \"x\"\n").expect_err("unknown section");
    assert!(err.to_string().contains("agent"));
}

#[test]
fn invalid_type_is_reported() {
    let errors = load_and_validate_str("[server]\nport = \"eighty\"\n").expect_err("bad type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. })),
        "{errors:?}"
    );
}

#[test]
fn validation_errors_surface_from_str_loader() {
    let toml = r#"
[queue]
worker_concurrency = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("zero workers");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { message } if message.contains("worker_concurrency")
    )));
}

#[test]
fn env_style_override_wins_over_file() {
    let config: PrepodavaiConfig = Figment::new()
        .merge(Serialized::defaults(PrepodavaiConfig::default()))
        .merge(Toml::string("[telegram]\nbot_token = \"from-file\"\n"))
        .merge(("telegram.bot_token", "from-env"))
        .extract()
        .expect("merge");
    assert_eq!(config.telegram.bot_token.as_deref(), Some("from-env"));
}

#[test]
#[serial_test::serial]
fn prefixed_env_var_is_applied() {
    // SAFETY: serialized test; no other thread reads the environment.
    unsafe { std::env::set_var("PREPODAVAI_QUEUE_WORKER_CONCURRENCY", "11") };
    let config = prepodavai_config::loader::build_figment()
        .extract::<PrepodavaiConfig>()
        .expect("extract");
    unsafe { std::env::remove_var("PREPODAVAI_QUEUE_WORKER_CONCURRENCY") };
    assert_eq!(config.queue.worker_concurrency, 11);
}

#[test]
fn config_error_renders_with_miette() {
    let errors = load_and_validate_str("[render]\ntimeout_sec = 3\n").expect_err("typo");
    let mut buf = String::new();
    let handler = miette::GraphicalReportHandler::new();
    handler
        .render_report(&mut buf, &errors[0] as &dyn miette::Diagnostic)
        .expect("render");
    assert!(buf.contains("timeout_sec"));
}
