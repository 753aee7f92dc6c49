//! L2: shared key-value cache (SPEC_FULL.md §4.G). Widened from the original's Redis-only
//! `L2RedisCache` (`l2_redis.go`) into an injectable trait so a real out-of-process backend
//! can be substituted without touching [`crate::cache::CacheManager`]; the in-process
//! concurrent-map implementation here is the default/test double.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use super::CacheError;

const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process stand-in for an out-of-process L2 (e.g. Redis). JSON-encodes nothing extra —
/// `serde_json::Value` is already the wire shape — but keeps the prefixing and TTL semantics
/// a real backend would have.
pub struct InProcessSharedCache {
    prefix: String,
    entries: RwLock<HashMap<String, Entry>>,
}

impl InProcessSharedCache {
    pub fn new(prefix: impl Into<String>) -> Self {
        InProcessSharedCache { prefix: prefix.into(), entries: RwLock::new(HashMap::new()) }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

#[async_trait]
impl SharedCache for InProcessSharedCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let key = self.prefixed(key);
        let guard = self.entries.read().expect("L2 lock poisoned");
        match guard.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let key = self.prefixed(key);
        let mut guard = self.entries.write().expect("L2 lock poisoned");
        guard.insert(key, Entry { value: value.clone(), expires_at: Instant::now() + ttl.unwrap_or(DEFAULT_TTL) });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let key = self.prefixed(key);
        self.entries.write().expect("L2 lock poisoned").remove(&key);
        Ok(())
    }

    /// Cursor-style removal of this cache's own keys, never a blanket `KEYS *` scan.
    async fn clear(&self) -> Result<(), CacheError> {
        let mut guard = self.entries.write().expect("L2 lock poisoned");
        let stale: Vec<String> = guard.keys().filter(|k| k.starts_with(&self.prefix)).cloned().collect();
        for key in stale {
            guard.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn round_trips_through_prefix() {
        let cache = InProcessSharedCache::new("gw:");
        cache.set("k", &json!("v"), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = InProcessSharedCache::new("gw:");
        cache.set("k", &json!("v"), Some(Duration::from_millis(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_only_removes_own_prefix() {
        let cache = InProcessSharedCache::new("gw:");
        cache.set("k", &json!(1), None).await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
