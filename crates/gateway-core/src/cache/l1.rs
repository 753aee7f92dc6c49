//! In-process L1 cache: bounded by total cost, approximate-LFU eviction, per-entry TTL.
//! Grounded on the original's Ristretto-backed `L1MemoryCache` (`l1_memory.go`), reimplemented
//! without an external dependency since Ristretto has no Rust equivalent in the pack.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

const DEFAULT_COST: u64 = 1024;
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry {
    value: Value,
    cost: u64,
    expires_at: Instant,
    frequency: u64,
}

#[derive(Default)]
pub struct L1Stats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    total_cost: u64,
    stats: L1Stats,
}

pub struct L1Cache {
    max_cost: u64,
    inner: Mutex<Inner>,
}

impl L1Cache {
    pub fn new(max_cost: u64) -> Self {
        L1Cache {
            max_cost,
            inner: Mutex::new(Inner { entries: HashMap::new(), total_cost: 0, stats: L1Stats::default() }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        match inner.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.frequency += 1;
                let value = entry.value.clone();
                inner.stats.hits += 1;
                Some(value)
            }
            Some(_) => {
                let entry = inner.entries.remove(key).unwrap();
                inner.total_cost -= entry.cost;
                inner.stats.misses += 1;
                None
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.set_with_cost(key, value, DEFAULT_COST, ttl);
    }

    pub fn set_with_cost(&self, key: &str, value: Value, cost: u64, ttl: Option<Duration>) {
        let cost = if cost == 0 { DEFAULT_COST } else { cost };
        let ttl = ttl.unwrap_or(DEFAULT_TTL);
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.remove(key) {
            inner.total_cost -= old.cost;
        }

        while inner.total_cost + cost > self.max_cost && !inner.entries.is_empty() {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.frequency)
                .map(|(key, _)| key.clone());
            let Some(victim) = victim else { break };
            if let Some(evicted) = inner.entries.remove(&victim) {
                inner.total_cost -= evicted.cost;
                inner.stats.evictions += 1;
            }
        }

        inner.entries.insert(
            key.to_string(),
            Entry { value, cost, expires_at: Instant::now() + ttl, frequency: 0 },
        );
        inner.total_cost += cost;
        inner.stats.sets += 1;
    }

    pub fn delete(&self, key: &str) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.remove(key) {
            inner.total_cost -= entry.cost;
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.total_cost = 0;
        inner.stats = L1Stats::default();
    }

    pub fn hit_rate(&self) -> f64 {
        let inner = self.inner.lock();
        let total = inner.stats.hits + inner.stats.misses;
        if total == 0 { 0.0 } else { inner.stats.hits as f64 / total as f64 }
    }

    pub fn size_bytes(&self) -> u64 {
        self.inner.lock().total_cost
    }
}
