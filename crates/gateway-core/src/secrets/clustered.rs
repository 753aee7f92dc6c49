use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use secrecy::SecretString;

use super::{EnvSecretProvider, SecretError, SecretProvider};

const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    value: SecretString,
    expires_at: Instant,
}

/// A clustered secret store (e.g. a Kubernetes Secrets API client) with a 5-minute
/// read-through cache, mirroring the original's `KubernetesSecretStore` shape. The actual
/// cluster lookup is injected so the core has no hard dependency on a specific backend.
pub trait ClusterBackend: Send + Sync {
    /// `ref` of form `name/key`: fetch `key` from the named secret.
    fn fetch(&self, name: &str, key: &str) -> Result<SecretString, SecretError>;
}

/// Default backend when no real cluster integration (e.g. a Kubernetes Secrets API client)
/// has been injected: every `name/key` lookup fails, so only single-segment refs (served by
/// the env-var fallback) resolve. Lets [`ClusteredSecretProvider`] run out of the box, the
/// same way [`crate::cache::InProcessSharedCache`] stands in for a real L2 backend.
#[derive(Debug, Default)]
pub struct UnconfiguredClusterBackend;

impl ClusterBackend for UnconfiguredClusterBackend {
    fn fetch(&self, name: &str, key: &str) -> Result<SecretString, SecretError> {
        Err(SecretError::NotFound(format!("{name}/{key}")))
    }
}

/// `ClusteredSecretProvider` resolves `name/key` refs against an injected [`ClusterBackend`],
/// read-through caching each resolved value for [`CACHE_TTL`]. A single-segment ref falls
/// back to the env-var provider, matching the original's legacy compatibility path.
pub struct ClusteredSecretProvider {
    backend: Box<dyn ClusterBackend>,
    fallback: EnvSecretProvider,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl ClusteredSecretProvider {
    pub fn new(backend: Box<dyn ClusterBackend>) -> Self {
        ClusteredSecretProvider {
            backend,
            fallback: EnvSecretProvider::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn from_cache(&self, reference: &str) -> Option<SecretString> {
        let cache = self.cache.read().expect("secret cache lock poisoned");
        let entry = cache.get(reference)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.value.clone())
    }

    fn put_in_cache(&self, reference: &str, value: SecretString) {
        let mut cache = self.cache.write().expect("secret cache lock poisoned");
        cache.insert(
            reference.to_string(),
            CacheEntry { value, expires_at: Instant::now() + CACHE_TTL },
        );
    }

    /// Evicts `reference` from the cache. Stale entries are otherwise removed lazily on
    /// lookup and by the background sweep in [`Self::sweep_expired`].
    pub fn invalidate(&self, reference: &str) {
        self.cache.write().expect("secret cache lock poisoned").remove(reference);
    }

    pub fn invalidate_all(&self) {
        self.cache.write().expect("secret cache lock poisoned").clear();
    }

    /// Removes expired entries; intended to be driven by a 1-minute ticker (SPEC_FULL.md
    /// §4.B).
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.cache
            .write()
            .expect("secret cache lock poisoned")
            .retain(|_, entry| entry.expires_at > now);
    }
}

impl SecretProvider for ClusteredSecretProvider {
    fn get_secret(&self, reference: &str) -> Result<SecretString, SecretError> {
        if let Some(cached) = self.from_cache(reference) {
            return Ok(cached);
        }

        let value = match reference.split_once('/') {
            Some((name, key)) => self.backend.fetch(name, key)?,
            None => self.fallback.get_secret(reference)?,
        };
        self.put_in_cache(reference, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeBackend {
        calls: Arc<AtomicUsize>,
    }

    impl ClusterBackend for FakeBackend {
        fn fetch(&self, name: &str, key: &str) -> Result<SecretString, SecretError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if name == "connector-creds" && key == "api-key" {
                Ok(SecretString::from("s3cr3t".to_string()))
            } else {
                Err(SecretError::NotFound(format!("{name}/{key}")))
            }
        }
    }

    #[test]
    fn caches_resolved_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ClusteredSecretProvider::new(Box::new(FakeBackend { calls: calls.clone() }));
        let first = provider.get_secret("connector-creds/api-key").unwrap();
        let second = provider.get_secret("connector-creds/api-key").unwrap();
        assert_eq!(first.expose_secret(), "s3cr3t");
        assert_eq!(second.expose_secret(), "s3cr3t");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn single_segment_falls_back_to_env() {
        // SAFETY: test-only, single-threaded access to this specific var name.
        unsafe { std::env::set_var("SECRET_LEGACY_TOKEN", "legacy") };
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ClusteredSecretProvider::new(Box::new(FakeBackend { calls }));
        let value = provider.get_secret("legacy-token").unwrap();
        assert_eq!(value.expose_secret(), "legacy");
        unsafe { std::env::remove_var("SECRET_LEGACY_TOKEN") };
    }

    #[test]
    fn invalidate_forces_refetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ClusteredSecretProvider::new(Box::new(FakeBackend { calls: calls.clone() }));
        provider.get_secret("connector-creds/api-key").unwrap();
        provider.invalidate("connector-creds/api-key");
        provider.get_secret("connector-creds/api-key").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
