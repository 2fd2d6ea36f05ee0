//! The backing-store capability consumed by the proxy.
//!
//! [`ValueStore`] is the only view of storage the proxy has: typed get/set/delete
//! of [`StoredValue`]s with a TTL. [`BackendStore`] implements it for any byte
//! [`CacheBackend`] by wrapping values in the versioned envelope from
//! [`serialization`](crate::serialization). Implement `ValueStore` directly to
//! plug in a store with its own value encoding.

use crate::backend::CacheBackend;
use crate::error::{Error, Result};
use crate::serialization::{deserialize_value, serialize_value};
use crate::value::StoredValue;
use std::future::Future;
use std::time::Duration;

/// Typed key-value store with TTL.
///
/// Implementations must be safe for concurrent use: the proxy reads on caller
/// tasks and writes from detached background tasks at the same time.
pub trait ValueStore: Send + Sync + 'static {
    /// Read the value stored under `key`.
    ///
    /// # Returns
    /// - `Ok(Some(value))` - entry found
    /// - `Ok(None)` - no entry (a value with `is_absent` set means the same)
    ///
    /// # Errors
    /// Returns `Err` on I/O or decoding failure
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<StoredValue>>> + Send;

    /// Replace the value under `key`, expiring `ttl` from now.
    ///
    /// # Errors
    /// Returns `Err` on I/O or encoding failure
    fn set(
        &self,
        key: &str,
        value: &StoredValue,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove `key`. A missing key is not an error.
    ///
    /// # Errors
    /// Returns `Err` on I/O failure
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Whether the store is reachable.
    ///
    /// # Errors
    /// Returns `Err` if the store cannot be contacted
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send {
        async { Ok::<_, crate::error::Error>(true) }
    }
}

/// [`ValueStore`] over a byte-level [`CacheBackend`].
///
/// # Example
///
/// ```no_run
/// use cache_proxy::backend::InMemoryBackend;
/// use cache_proxy::store::{BackendStore, ValueStore};
/// use cache_proxy::StoredValue;
/// use std::time::Duration;
///
/// # async fn example() -> cache_proxy::Result<()> {
/// let store = BackendStore::new(InMemoryBackend::new());
/// store.set("greeting", &StoredValue::new("hello", false), Duration::from_secs(60)).await?;
/// let value = store.get("greeting").await?;
/// assert_eq!(value.map(|v| v.payload), Some("hello".to_string()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BackendStore<B: CacheBackend> {
    backend: B,
}

impl<B: CacheBackend> BackendStore<B> {
    pub fn new(backend: B) -> Self {
        BackendStore { backend }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn check_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::ValidationError("empty key".to_string()));
        }
        Ok(())
    }
}

impl<B: CacheBackend> ValueStore for BackendStore<B> {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        Self::check_key(key)?;

        match self.backend.get(key).await? {
            Some(bytes) => deserialize_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &StoredValue, ttl: Duration) -> Result<()> {
        Self::check_key(key)?;

        let bytes = serialize_value(value)?;
        self.backend.set(key, bytes, Some(ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Self::check_key(key)?;
        self.backend.delete(key).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.backend.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    #[tokio::test]
    async fn test_backend_store_roundtrip() {
        let store = BackendStore::new(InMemoryBackend::new());
        let value = StoredValue::new("data", true);

        store
            .set("k", &value, Duration::from_secs(60))
            .await
            .expect("Failed to set");

        let read = store.get("k").await.expect("Failed to get").expect("Missing");
        assert_eq!(read, value);
    }

    #[tokio::test]
    async fn test_backend_store_miss() {
        let store = BackendStore::new(InMemoryBackend::new());
        assert_eq!(store.get("missing").await.expect("Failed to get"), None);
    }

    #[tokio::test]
    async fn test_backend_store_applies_ttl() {
        let backend = InMemoryBackend::new();
        let store = BackendStore::new(backend.clone());

        store
            .set("k", &StoredValue::new("", false), Duration::from_secs(30))
            .await
            .expect("Failed to set");

        let remaining = backend.ttl_remaining("k").expect("TTL missing");
        assert!(remaining <= Duration::from_secs(30));
        assert!(remaining > Duration::from_secs(29));
    }

    #[tokio::test]
    async fn test_backend_store_rejects_empty_key() {
        let store = BackendStore::new(InMemoryBackend::new());

        assert!(matches!(
            store.get("").await,
            Err(Error::ValidationError(_))
        ));
        assert!(matches!(
            store
                .set("", &StoredValue::new("x", false), Duration::from_secs(1))
                .await,
            Err(Error::ValidationError(_))
        ));
        assert!(matches!(
            store.delete("").await,
            Err(Error::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_store_corrupt_entry_is_error() {
        let backend = InMemoryBackend::new();
        backend
            .set("bad", b"garbage".to_vec(), None)
            .await
            .expect("Failed to set");

        let store = BackendStore::new(backend);
        let err = store.get("bad").await.expect_err("Corrupt entry should fail");
        assert!(err.is_store());
    }
}
