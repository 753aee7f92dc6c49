//! Resilient HTTP Client (SPEC_FULL.md §4.E): per-connector rate limiting, circuit breaking,
//! and retry/backoff layered around [`reqwest`], grounded on the original's
//! `internal/framework/httpclient.go`.

mod circuit_breaker;
mod client;
mod retry;
mod retry_after;
mod token_bucket;

pub use client::ResilientHttpClient;
pub use retry_after::retry_after_hint;

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ResilienceError {
    #[error("rate limit exhausted")]
    RateLimitExhausted,
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("request cancelled")]
    Cancelled,
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Parses durations of the shape `"100ms"`, `"30s"`, `"5m"`, `"1h"` — the only units the
/// connector spec's resilience fields ever use (SPEC_FULL.md §4.A/§4.E).
pub(crate) fn parse_duration(raw: &str) -> Duration {
    let raw = raw.trim();
    let split_at = raw.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split_at);
    let value: f64 = number.parse().unwrap_or(0.0);
    match unit {
        "ms" => Duration::from_secs_f64(value / 1000.0),
        "s" | "" => Duration::from_secs_f64(value),
        "m" => Duration::from_secs_f64(value * 60.0),
        "h" => Duration::from_secs_f64(value * 3600.0),
        _ => Duration::from_secs_f64(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_supported_unit() {
        assert_eq!(parse_duration("100ms"), Duration::from_millis(100));
        assert_eq!(parse_duration("30s"), Duration::from_secs(30));
        assert_eq!(parse_duration("5m"), Duration::from_secs(300));
        assert_eq!(parse_duration("1h"), Duration::from_secs(3600));
    }

    #[test]
    fn unparseable_value_falls_back_to_zero() {
        assert_eq!(parse_duration("bogus"), Duration::from_secs(0));
    }
}
