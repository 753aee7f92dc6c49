//! Freemium Limiter: per-identity tumbling-window quota, with premium callers passed
//! through unlimited.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;

/// Resolves whether an identity gets unlimited (premium) access. Defaults to "everyone is
/// free" until a real subscription lookup is wired in; callers inject a real resolver once
/// that backing store exists.
#[async_trait]
pub trait PremiumResolver: Send + Sync {
    async fn is_premium(&self, identity: &str) -> bool;
}

pub struct AlwaysFree;

#[async_trait]
impl PremiumResolver for AlwaysFree {
    async fn is_premium(&self, _identity: &str) -> bool {
        false
    }
}

/// Resolves the calling identity from request metadata: authenticated `user:<id>` takes
/// precedence, else `ip:<addr>` via `X-Forwarded-For`'s first hop, then `X-Real-IP`, then
/// the observed peer address.
pub fn resolve_identity(user_id: Option<&str>, x_forwarded_for: Option<&str>, x_real_ip: Option<&str>, peer: Option<IpAddr>) -> String {
    if let Some(id) = user_id {
        return format!("user:{id}");
    }

    if let Some(xff) = x_forwarded_for {
        let first = xff.split(',').next().unwrap_or(xff).trim();
        if !first.is_empty() {
            return format!("ip:{first}");
        }
    }

    if let Some(xri) = x_real_ip {
        return format!("ip:{xri}");
    }

    match peer {
        Some(ip) => format!("ip:{ip}"),
        None => "ip:unknown".to_string(),
    }
}

struct WindowEntry {
    count: u32,
    reset_at: SystemTime,
}

pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: SystemTime,
}

/// Quota enforcement over a tumbling window per identity.
pub struct FreemiumLimiter {
    free_limit: u32,
    window: Duration,
    counters: Mutex<HashMap<String, WindowEntry>>,
    premium: Box<dyn PremiumResolver>,
}

impl FreemiumLimiter {
    pub fn new(free_limit: u32, window: Duration, premium: Box<dyn PremiumResolver>) -> Self {
        FreemiumLimiter { free_limit, window, counters: Mutex::new(HashMap::new()), premium }
    }

    /// Checks (but does not increment) the identity's quota. Premium identities always pass.
    pub async fn check(&self, identity: &str) -> Decision {
        if self.premium.is_premium(identity).await {
            return Decision { allowed: true, limit: u32::MAX, remaining: u32::MAX, reset_at: SystemTime::now() };
        }

        let now = SystemTime::now();
        let mut counters = self.counters.lock();
        let entry = counters.entry(identity.to_string()).or_insert_with(|| WindowEntry { count: 0, reset_at: now + self.window });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        let remaining = self.free_limit.saturating_sub(entry.count);
        Decision { allowed: remaining > 0, limit: self.free_limit, remaining, reset_at: entry.reset_at }
    }

    /// Records one admitted call against the identity's window — called only after a
    /// `Decision { allowed: true, .. }`, so the window state observably lags the admit
    /// decision, never precedes it.
    pub fn increment(&self, identity: &str) {
        let mut counters = self.counters.lock();
        if let Some(entry) = counters.get_mut(identity) {
            entry.count += 1;
        }
    }

    /// Removes windows that have fully expired; intended to run on an hourly tick.
    pub fn sweep_expired(&self) {
        let now = SystemTime::now();
        self.counters.lock().retain(|_, entry| entry.reset_at > now);
    }
}

pub fn reset_unix(reset_at: SystemTime) -> u64 {
    reset_at.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
