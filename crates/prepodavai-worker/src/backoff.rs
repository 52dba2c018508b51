// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry delay for failed jobs.

use std::time::Duration;

/// Exponential delay before retry number `attempt` (1-based), capped at `max_secs`.
pub fn backoff_delay(attempt: u32, base_ms: u64, max_secs: u64) -> Duration {
    let cap = Duration::from_secs(max_secs);
    let shift = attempt.saturating_sub(1).min(32);
    let delay_ms = base_ms.saturating_mul(1u64 << shift);
    Duration::from_millis(delay_ms).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_attempt() {
        assert_eq!(backoff_delay(1, 1000, 300), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, 1000, 300), Duration::from_secs(2));
        assert_eq!(backoff_delay(4, 1000, 300), Duration::from_secs(8));
    }

    #[test]
    fn capped_and_overflow_safe() {
        assert_eq!(backoff_delay(20, 1000, 300), Duration::from_secs(300));
        assert_eq!(backoff_delay(u32::MAX, u64::MAX, 60), Duration::from_secs(60));
        assert_eq!(backoff_delay(0, 500, 60), Duration::from_millis(500));
    }
}
