//! Per-connector circuit breaker (SPEC_FULL.md §4.E), grounded on the original's use of
//! `sony/gobreaker`: three states, trip condition `requests >= 3 && failure_ratio >= 0.6`.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::types::CircuitBreakerSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Counts {
    requests: u32,
    failures: u32,
}

impl Counts {
    fn failure_ratio(&self) -> f64 {
        if self.requests == 0 { 0.0 } else { f64::from(self.failures) / f64::from(self.requests) }
    }
}

struct Inner {
    state: State,
    counts: Counts,
    opened_at: Option<Instant>,
    half_open_successes: u32,
    half_open_admitted: u32,
}

/// A single shared state machine per connector (SPEC_FULL.md §9: keep per-connector, not
/// global).
pub struct CircuitBreaker {
    failure_threshold: f64,
    success_threshold: u32,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(spec: &CircuitBreakerSpec, timeout: Duration) -> Self {
        CircuitBreaker {
            failure_threshold: spec.failure_threshold,
            success_threshold: spec.success_threshold.max(1),
            timeout,
            inner: Mutex::new(Inner {
                state: State::Closed,
                counts: Counts { requests: 0, failures: 0 },
                opened_at: None,
                half_open_successes: 0,
                half_open_admitted: 0,
            }),
        }
    }

    /// Returns `true` if the breaker admits a call right now, transitioning Open ->
    /// HalfOpen when the timeout has elapsed. In `HalfOpen`, admits at most
    /// `success_threshold` probes total (SPEC_FULL.md §4.E).
    pub fn admit(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => true,
            State::HalfOpen => {
                if inner.half_open_admitted >= self.success_threshold {
                    false
                } else {
                    inner.half_open_admitted += 1;
                    true
                }
            }
            State::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed >= self.timeout {
                    inner.state = State::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.half_open_admitted = 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => {
                inner.counts.requests += 1;
                maybe_trip(&mut inner, self.failure_threshold);
            }
            State::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.success_threshold {
                    inner.state = State::Closed;
                    inner.counts = Counts { requests: 0, failures: 0 };
                    inner.opened_at = None;
                    inner.half_open_admitted = 0;
                }
            }
            State::Open => {}
        }
    }

    pub fn on_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => {
                inner.counts.requests += 1;
                inner.counts.failures += 1;
                maybe_trip(&mut inner, self.failure_threshold);
            }
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
            }
            State::Open => {}
        }
    }
}

fn maybe_trip(inner: &mut Inner, failure_threshold: f64) {
    if inner.counts.requests >= 3 && inner.counts.failure_ratio() >= failure_threshold {
        inner.state = State::Open;
        inner.opened_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CircuitBreakerSpec;

    fn breaker(timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            &CircuitBreakerSpec { failure_threshold: 0.6, success_threshold: 1, timeout: "ignored".to_string() },
            timeout,
        )
    }

    #[test]
    fn trips_after_three_failures_past_threshold() {
        let breaker = breaker(Duration::from_millis(50));
        assert!(breaker.admit());
        breaker.on_failure();
        assert!(breaker.admit());
        breaker.on_failure();
        assert!(breaker.admit());
        breaker.on_failure();
        assert!(!breaker.admit());
    }

    #[test]
    fn half_open_after_timeout_then_closes_on_success() {
        let breaker = breaker(Duration::from_millis(10));
        for _ in 0..3 {
            breaker.on_failure();
        }
        assert!(!breaker.admit());
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.admit());
        breaker.on_success();
        assert!(breaker.admit());
        breaker.on_failure();
        assert!(breaker.admit());
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = breaker(Duration::from_millis(10));
        for _ in 0..3 {
            breaker.on_failure();
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.admit());
        breaker.on_failure();
        assert!(!breaker.admit());
    }

    #[test]
    fn half_open_admits_at_most_success_threshold_probes() {
        let breaker = CircuitBreaker::new(
            &CircuitBreakerSpec { failure_threshold: 0.6, success_threshold: 2, timeout: "ignored".to_string() },
            Duration::from_millis(10),
        );
        for _ in 0..3 {
            breaker.on_failure();
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.admit());
        assert!(breaker.admit());
        assert!(!breaker.admit());
    }
}
