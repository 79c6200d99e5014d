//! Cache driver with a self-maintained shadow index.
//!
//! The backing cache cannot enumerate its keys, yet garbage collection needs
//! to find every session older than a cutoff. The driver therefore keeps one
//! reserved key holding the full `id -> last update` map and rewrites it on
//! every write, destroy and gc.
//!
//! The index update is a plain read-modify-write over two cache operations.
//! Two writers working from the same snapshot will drop one another's entry;
//! the dropped session's record stays in the cache but gc can no longer see
//! it. Two gc sweeps running at once can likewise re-add an entry the other
//! sweep just removed. Callers that share one cache between processes must
//! serialize gc themselves.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CacheBackend, SessionDriver};
use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;
use crate::session::SessionId;
use crate::Result;

/// Reserved cache key of the shadow index. `_` is outside the session id
/// alphabet, so no session record can land on it.
pub const DEFAULT_INDEX_KEY: &str = "sess_index";

/// Index bookkeeping for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Seconds since the epoch of the last write.
    pub last_update: u64,
}

/// Map of live session ids to their last update, in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShadowIndex {
    entries: BTreeMap<String, IndexEntry>,
}

impl ShadowIndex {
    /// Insert or refresh an entry.
    pub fn touch(&mut self, id: &SessionId, now: u64) {
        self.entries
            .insert(id.to_string(), IndexEntry { last_update: now });
    }

    pub fn remove(&mut self, id: &str) -> Option<IndexEntry> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// Ids whose `last_update + max_lifetime <= now`.
    pub fn expired(&self, max_lifetime: u64, now: u64) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.last_update.saturating_add(max_lifetime) <= now)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Session driver over a [`CacheBackend`].
pub struct CacheDriver {
    backend: Box<dyn CacheBackend>,
    index_key: String,
    clock: Arc<dyn Clock>,
    opened: bool,
}

impl std::fmt::Debug for CacheDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheDriver")
            .field("backend", &self.backend.name())
            .field("index_key", &self.index_key)
            .field("opened", &self.opened)
            .finish()
    }
}

impl CacheDriver {
    /// Wrap a single backend. Fails when the backend is unavailable.
    pub fn new(backend: impl CacheBackend + 'static) -> Result<Self> {
        Self::detect(vec![Box::new(backend)])
    }

    /// Use the first available backend, in preference order.
    pub fn detect(candidates: Vec<Box<dyn CacheBackend>>) -> Result<Self> {
        let names: Vec<String> = candidates.iter().map(|c| c.name().to_string()).collect();
        let backend = candidates
            .into_iter()
            .find(|candidate| candidate.is_available())
            .ok_or_else(|| {
                SessionError::BackendUnavailable(if names.is_empty() {
                    "no cache backend configured".to_string()
                } else {
                    format!("none of [{}] is available", names.join(", "))
                })
            })?;

        debug!(backend = backend.name(), "cache backend selected");

        Ok(Self {
            backend,
            index_key: DEFAULT_INDEX_KEY.to_string(),
            clock: Arc::new(SystemClock),
            opened: false,
        })
    }

    /// Store the index under a different reserved key. The key must fall
    /// outside the session id alphabet.
    pub fn with_index_key(mut self, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() || SessionId::is_valid(&key) {
            return Err(SessionError::InvalidIndexKey(key));
        }
        self.index_key = key;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    /// Snapshot of the shadow index as currently stored.
    pub fn index(&self) -> Result<ShadowIndex> {
        match self.backend.fetch(&self.index_key)? {
            Some(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(&bytes)?),
            _ => Ok(ShadowIndex::default()),
        }
    }

    fn save_index(&self, index: &ShadowIndex) -> Result<()> {
        let bytes = serde_json::to_vec(index)?;
        self.backend.store(&self.index_key, &bytes)
    }

    fn remove_session(&self, id: &str) -> Result<bool> {
        let mut index = self.index()?;
        index.remove(id);
        self.save_index(&index)?;
        self.backend.delete(id)
    }
}

impl SessionDriver for CacheDriver {
    fn open(&mut self, _save_path: &str, _name: &str) -> Result<bool> {
        self.opened = true;
        Ok(true)
    }

    fn close(&mut self) -> Result<bool> {
        self.opened = false;
        Ok(true)
    }

    fn read(&self, id: &SessionId) -> Result<Vec<u8>> {
        Ok(self.backend.fetch(id.as_str())?.unwrap_or_default())
    }

    fn write(&mut self, id: &SessionId, data: &[u8]) -> Result<bool> {
        let mut index = self.index()?;
        index.touch(id, self.clock.now());
        self.save_index(&index)?;

        self.backend.store(id.as_str(), data)?;
        debug!(backend = self.backend.name(), %id, bytes = data.len(), "session written");
        Ok(true)
    }

    fn destroy(&mut self, id: &SessionId) -> Result<bool> {
        let existed = self.remove_session(id.as_str())?;
        debug!(backend = self.backend.name(), %id, existed, "session destroyed");
        Ok(existed)
    }

    fn gc(&mut self, max_lifetime: u64) -> Result<bool> {
        let now = self.clock.now();
        let mut index = self.index()?;

        let expired = index.expired(max_lifetime, now);
        for id in &expired {
            self.remove_session(id)?;
            index.remove(id);
        }
        self.save_index(&index)?;

        if !expired.is_empty() {
            info!(
                backend = self.backend.name(),
                removed = expired.len(),
                remaining = index.len(),
                "cache gc swept expired sessions"
            );
        }
        Ok(true)
    }
}
