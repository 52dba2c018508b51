// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram Mini App init-data verification.
//!
//! The data-check string is every field except `hash`, sorted by key and
//! joined as `key=value` lines. The signing key is
//! `HMAC_SHA256(key = "WebAppData", msg = bot_token)`.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitDataError {
    #[error("init data has no hash")]
    MissingHash,
    #[error("init data signature mismatch")]
    BadSignature,
    #[error("init data is older than {max_age:?}")]
    Expired { max_age: Duration },
    #[error("malformed init data: {0}")]
    Malformed(String),
}

/// The `user` object of the init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// Verified launch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitData {
    pub user: TelegramUser,
    pub auth_date: i64,
    pub query_id: Option<String>,
}

fn secret_key(bot_token: &str) -> Result<Vec<u8>, InitDataError> {
    let mut mac = HmacSha256::new_from_slice(b"WebAppData")
        .map_err(|e| InitDataError::Malformed(e.to_string()))?;
    mac.update(bot_token.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn data_check_string(pairs: &[(String, String)]) -> String {
    let mut fields: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| k != "hash").collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn mac_for(pairs: &[(String, String)], bot_token: &str) -> Result<HmacSha256, InitDataError> {
    let key = secret_key(bot_token)?;
    let mut mac =
        HmacSha256::new_from_slice(&key).map_err(|e| InitDataError::Malformed(e.to_string()))?;
    mac.update(data_check_string(pairs).as_bytes());
    Ok(mac)
}

/// Verify `raw` (the URL-encoded init data string) and extract the user.
///
/// `now` is a unix timestamp in seconds.
pub fn verify_init_data(
    raw: &str,
    bot_token: &str,
    max_age: Duration,
    now: i64,
) -> Result<InitData, InitDataError> {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let hash = pairs
        .iter()
        .find(|(k, _)| k == "hash")
        .map(|(_, v)| v.as_str())
        .ok_or(InitDataError::MissingHash)?;
    let expected = hex::decode(hash).map_err(|_| InitDataError::BadSignature)?;
    mac_for(&pairs, bot_token)?
        .verify_slice(&expected)
        .map_err(|_| InitDataError::BadSignature)?;

    let field = |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let auth_date: i64 = field("auth_date")
        .ok_or_else(|| InitDataError::Malformed("auth_date missing".into()))?
        .parse()
        .map_err(|_| InitDataError::Malformed("auth_date is not a number".into()))?;
    let age = now.saturating_sub(auth_date);
    if age < 0 || age as u64 > max_age.as_secs() {
        return Err(InitDataError::Expired { max_age });
    }

    let user: TelegramUser = serde_json::from_str(
        field("user").ok_or_else(|| InitDataError::Malformed("user missing".into()))?,
    )
    .map_err(|e| InitDataError::Malformed(format!("user: {e}")))?;

    Ok(InitData {
        user,
        auth_date,
        query_id: field("query_id").map(str::to_string),
    })
}

/// Produce a signed init-data string, as Telegram would, for `fields`.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> String {
    let pairs: Vec<(String, String)> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let hash = match mac_for(&pairs, bot_token) {
        Ok(mac) => hex::encode(mac.finalize().into_bytes()),
        Err(_) => String::new(),
    };
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        out.append_pair(k, v);
    }
    out.append_pair("hash", &hash);
    out.finish()
}
