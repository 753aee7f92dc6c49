//! `Retry-After` / `x-ratelimit-reset` wait-hint parsing (SPEC_FULL.md §4.E), ported from the
//! teacher's `http::outlierdetection` and trimmed to the two headers the spec calls out —
//! provider-specific token/request-bucket headers are out of scope here.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::{HeaderMap, RETRY_AFTER};

const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
const THIRTY_DAYS_SECS: u64 = 60 * 60 * 24 * 30;

/// Returns a wait hint for a 429 response, or `None` if neither header is present/parseable.
/// `Retry-After` (seconds or HTTP-date) takes precedence over `x-ratelimit-reset`.
pub fn retry_after_hint(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    if let Some(raw) = header_str(headers, &RETRY_AFTER) {
        if let Ok(seconds) = raw.parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }
        if let Ok(date) = httpdate::parse_http_date(raw)
            && let Ok(duration) = date.duration_since(now)
        {
            return Some(duration);
        }
    }

    if let Some(raw) = headers.get(X_RATELIMIT_RESET).and_then(|v| v.to_str().ok())
        && let Ok(value) = raw.parse::<u64>()
    {
        if value < THIRTY_DAYS_SECS {
            return Some(Duration::from_secs(value));
        }
        let reset_at = UNIX_EPOCH + Duration::from_secs(value);
        if let Ok(duration) = reset_at.duration_since(now) {
            return Some(duration);
        }
    }

    None
}

fn header_str<'a>(headers: &'a HeaderMap, name: &reqwest::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(
                reqwest::header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                v.parse().unwrap(),
            );
        }
        h
    }

    #[test]
    fn retry_after_seconds() {
        let now = SystemTime::now();
        let got = retry_after_hint(&headers(&[("retry-after", "120")]), now);
        assert_eq!(got, Some(Duration::from_secs(120)));
    }

    #[test]
    fn retry_after_http_date() {
        let now = SystemTime::now();
        let future = now + Duration::from_secs(300);
        let formatted = httpdate::fmt_http_date(future);
        let got = retry_after_hint(&headers(&[("retry-after", &formatted)]), now);
        assert_eq!(got.unwrap().as_secs(), 299);
    }

    #[test]
    fn ratelimit_reset_small_value_is_seconds() {
        let now = SystemTime::now();
        let got = retry_after_hint(&headers(&[("x-ratelimit-reset", "1234")]), now);
        assert_eq!(got, Some(Duration::from_secs(1234)));
    }

    #[test]
    fn ratelimit_reset_large_value_is_epoch_timestamp() {
        let now = SystemTime::now();
        let future_timestamp = (now + Duration::from_secs(240)).duration_since(UNIX_EPOCH).unwrap().as_secs();
        let got = retry_after_hint(&headers(&[("x-ratelimit-reset", &future_timestamp.to_string())]), now);
        assert_eq!(got.unwrap().as_secs(), 239);
    }

    #[test]
    fn no_recognized_headers_returns_none() {
        let now = SystemTime::now();
        assert_eq!(retry_after_hint(&headers(&[("content-type", "application/json")]), now), None);
    }

    #[test]
    fn malformed_retry_after_falls_through_to_none() {
        let now = SystemTime::now();
        assert_eq!(retry_after_hint(&headers(&[("retry-after", "not-a-number")]), now), None);
    }
}
