//! Backoff calculation (SPEC_FULL.md §4.E), grounded on `calculateBackoff` in the original's
//! `httpclient.go`.

use std::time::Duration;

use crate::types::BackoffKind;

/// `attempt` is 1-based (the attempt that just failed). Mirrors the original's switch over
/// `constant` / `linear` / `exponential`, capped at `max`.
pub fn calculate_backoff(kind: BackoffKind, attempt: u32, initial: Duration, max: Duration) -> Duration {
    let wait = match kind {
        BackoffKind::Constant => initial,
        BackoffKind::Linear => initial * attempt,
        BackoffKind::Exponential => {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            initial * factor
        }
    };
    wait.min(max)
}

/// A response is retryable when the transport itself failed, or the upstream replied with a
/// 5xx — mirrors `err == nil && resp.StatusCode < 500` in the original's `doWithRetry`.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500
}
