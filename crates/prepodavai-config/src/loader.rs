// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./prepodavai.toml` > `~/.config/prepodavai/prepodavai.toml` >
//! `/etc/prepodavai/prepodavai.toml`, with `PREPODAVAI_` environment overrides.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PrepodavaiConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/prepodavai/prepodavai.toml";
pub const LOCAL_CONFIG_PATH: &str = "prepodavai.toml";

/// Sections addressable from environment variables.
const ENV_SECTIONS: &[&str] = &[
    "server",
    "storage",
    "telegram",
    "auth",
    "queue",
    "sweeper",
    "render",
    "provider",
    "credits",
    "prometheus",
];

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("prepodavai/prepodavai.toml"))
        .unwrap_or_default()
}

/// Build the full Figment: defaults, system, user and local files, then env.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/prepodavai/prepodavai.toml`
/// 3. `~/.config/prepodavai/prepodavai.toml`
/// 4. `./prepodavai.toml`
/// 5. `PREPODAVAI_*` environment variables
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PrepodavaiConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<PrepodavaiConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string over the defaults, without env.
pub fn load_config_from_str(toml_content: &str) -> Result<PrepodavaiConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PrepodavaiConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PrepodavaiConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PrepodavaiConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider with an explicit section mapping.
///
/// Only the first `_` after a known section name becomes a dot, so
/// `PREPODAVAI_TELEGRAM_BOT_TOKEN` maps to `telegram.bot_token`.
fn env_provider() -> Env {
    Env::prefixed("PREPODAVAI_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
