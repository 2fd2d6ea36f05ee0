//! In-memory backend (default, thread-safe, async).
//!
//! Uses DashMap for concurrent access with per-key sharding.
//! TTL expiration is enforced lazily on access.

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Entry { data, expires_at }
    }

    // A zero TTL yields an entry that is expired from the moment it is written.
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Thread-safe in-memory backend.
///
/// Clones share the same underlying map.
///
/// # Example
///
/// ```no_run
/// use cache_proxy::backend::{CacheBackend, InMemoryBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.set("key1", b"value".to_vec(), None).await?;
///     assert!(backend.get("key1").await?.is_some());
///
///     backend.set("key2", b"expires".to_vec(), Some(Duration::from_secs(300))).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, Entry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Number of entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Time left before `key` expires.
    ///
    /// `None` if the key is missing, expired, or stored without a TTL.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let entry = self.store.get(key)?;
        if entry.is_expired() {
            return None;
        }
        entry
            .expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            debug!("InMemory purged {} expired entries", removed);
        }
        removed
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                debug!("InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
        }

        // Reclaim the expired entry, if any. Only remove it if it is still expired:
        // a concurrent writer may have replaced it since the read above.
        self.store.remove_if(key, |_, entry| entry.is_expired());
        debug!("InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.store.insert(key.to_string(), Entry::new(value, ttl));

        match ttl {
            Some(d) => debug!("InMemory SET {} (TTL: {:?})", key, d),
            None => debug!("InMemory SET {}", key),
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("InMemory DELETE {}", key);
        Ok(())
    }
}
