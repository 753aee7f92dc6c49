//! Token-bucket rate limiter (SPEC_FULL.md §4.E), grounded on the original's use of
//! `golang.org/x/time/rate`: `rate = rpm / 60` tokens/sec, capacity = burst (default rpm).

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::types::RateLimitSpec;

struct Inner {
    tokens: f64,
    last_refill: Instant,
}

pub struct TokenBucket {
    rate_per_sec: f64,
    capacity: f64,
    inner: Mutex<Inner>,
}

impl TokenBucket {
    pub fn new(spec: &RateLimitSpec) -> Self {
        let capacity = spec.burst.unwrap_or(spec.requests_per_minute) as f64;
        TokenBucket {
            rate_per_sec: spec.requests_per_minute as f64 / 60.0,
            capacity,
            inner: Mutex::new(Inner { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    /// Refills `inner` for elapsed time and takes one token if now available.
    fn refill_and_take(&self, inner: &mut Inner) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(inner.last_refill).as_secs_f64();
        inner.tokens = (inner.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        inner.last_refill = now;

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Non-blocking check: takes one token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        self.refill_and_take(&mut inner)
    }

    /// Waits up to `deadline` for a token to free up, polling at the bucket's refill rate.
    /// Returns `true` as soon as a token is taken, `false` once `deadline` elapses first —
    /// the caller maps the latter to `ResilienceError::RateLimitExhausted`.
    pub async fn acquire(&self, deadline: Duration) -> bool {
        let start = Instant::now();
        loop {
            let wait = {
                let mut inner = self.inner.lock();
                if self.refill_and_take(&mut inner) {
                    return true;
                }
                if self.rate_per_sec > 0.0 {
                    Duration::from_secs_f64((1.0 - inner.tokens) / self.rate_per_sec)
                } else {
                    Duration::from_millis(50)
                }
            };

            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return false;
            }
            tokio::time::sleep(wait.min(deadline - elapsed).max(Duration::from_millis(1))).await;
        }
    }
}
