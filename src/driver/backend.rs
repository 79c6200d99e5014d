//! Key/value cache primitives.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::SessionError;
use crate::Result;

/// A cache that can only get, set and delete by exact key.
///
/// There is no way to enumerate keys, which is why [`super::CacheDriver`]
/// keeps its own index.
pub trait CacheBackend: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Whether the backend can be used on this host.
    fn is_available(&self) -> bool {
        true
    }

    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value, replacing any existing one.
    fn store(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a key. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;
}

/// Thread-safe in-process cache.
///
/// Clones share the same storage, so several drivers (standing in for
/// separate processes) can point at one cache.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    name: String,
    enabled: bool,
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A cache that reports itself unavailable, as when the module backing
    /// it is installed but switched off.
    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::named(name)
        }
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &str) -> Result<bool> {
        let entries = self
            .entries
            .read()
            .map_err(|_| SessionError::LockPoisoned)?;
        Ok(entries.contains_key(key))
    }

    /// Get the number of stored keys, the index key included.
    pub fn count(&self) -> Result<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|_| SessionError::LockPoisoned)?;
        Ok(entries.len())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| SessionError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| SessionError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| SessionError::LockPoisoned)?;
        Ok(entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_fetch_delete() {
        let cache = MemoryCache::new();
        assert_eq!(cache.fetch("a").unwrap(), None);

        cache.store("a", b"1").unwrap();
        assert_eq!(cache.fetch("a").unwrap(), Some(b"1".to_vec()));
        assert!(cache.contains("a").unwrap());

        assert!(cache.delete("a").unwrap());
        assert!(!cache.delete("a").unwrap());
        assert_eq!(cache.count().unwrap(), 0);
    }

    #[test]
    fn test_clones_share_storage() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        cache.store("k", b"v").unwrap();
        assert_eq!(other.fetch("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_disabled_reports_unavailable() {
        assert!(MemoryCache::new().is_available());
        let cache = MemoryCache::disabled("apcu");
        assert!(!cache.is_available());
        assert_eq!(cache.name(), "apcu");
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let cache = MemoryCache::new();
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || cache.store(&format!("k{}", i), b"x").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.count().unwrap(), 50);
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let cache = MemoryCache::new();
        let entries = Arc::clone(&cache.entries);
        let _ = std::thread::spawn(move || {
            let _guard = entries.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(cache.count(), Err(SessionError::LockPoisoned)));
        assert!(matches!(cache.contains("k"), Err(SessionError::LockPoisoned)));
        assert!(matches!(cache.fetch("k"), Err(SessionError::LockPoisoned)));
    }
}
