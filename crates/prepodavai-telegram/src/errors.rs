// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot API error classification.

use prepodavai_core::PrepodavaiError;
use teloxide::{ApiError, RequestError};
use tracing::warn;

/// Map a teloxide error onto the delivery error classes.
///
/// Only rejections that will not change on retry are permanent: the chat is
/// gone or unreachable for the bot, or the payload itself is unusable.
/// Everything else, including Bot API errors teloxide does not recognize
/// (server-side failures surface as `ApiError::Unknown`), is transient and
/// left to the queue's attempt limit.
pub fn classify(err: RequestError) -> PrepodavaiError {
    match err {
        RequestError::Api(api) if is_terminal(&api) => {
            warn!(error = %api, "telegram rejected delivery");
            PrepodavaiError::DeliveryPermanent {
                message: format!("telegram rejected the request: {api}"),
            }
        }
        RequestError::MigrateToChatId(id) => PrepodavaiError::DeliveryPermanent {
            message: format!("chat migrated to {}", id.0),
        },
        other => PrepodavaiError::DeliveryTransient {
            message: format!("telegram request failed: {other}"),
            source: Some(Box::new(other)),
        },
    }
}

fn is_terminal(api: &ApiError) -> bool {
    matches!(
        api,
        ApiError::BotBlocked
            | ApiError::ChatNotFound
            | ApiError::UserNotFound
            | ApiError::UserDeactivated
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::BotKickedFromChannel
            | ApiError::CantInitiateConversation
            | ApiError::CantTalkWithBots
            | ApiError::WrongFileIdOrUrl
            | ApiError::FailedToGetUrlContent
            | ApiError::WrongFileId
            | ApiError::MessageTextIsEmpty
            | ApiError::MessageIsTooLong
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::{ChatId, Seconds};

    #[test]
    fn blocked_bot_is_permanent() {
        let err = classify(RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(err, PrepodavaiError::DeliveryPermanent { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn unusable_payload_is_permanent() {
        let err = classify(RequestError::Api(ApiError::WrongFileIdOrUrl));
        assert!(matches!(err, PrepodavaiError::DeliveryPermanent { .. }));
    }

    #[test]
    fn unrecognized_api_error_is_transient() {
        let err = classify(RequestError::Api(ApiError::Unknown(
            "Bad Gateway".to_string(),
        )));
        assert!(matches!(err, PrepodavaiError::DeliveryTransient { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn chat_migration_is_permanent() {
        let err = classify(RequestError::MigrateToChatId(ChatId(-100123)));
        assert!(err.to_string().contains("-100123"));
    }

    #[test]
    fn flood_control_is_transient() {
        let err = classify(RequestError::RetryAfter(Seconds::from_seconds(3)));
        assert!(matches!(err, PrepodavaiError::DeliveryTransient { .. }));
        assert!(err.is_retryable());
    }
}
