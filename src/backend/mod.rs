//! Byte-level key-value backends.
//!
//! A [`CacheBackend`] stores opaque bytes under string keys with a TTL. The
//! proxy never talks to a backend directly: it goes through
//! [`BackendStore`](crate::store::BackendStore), which encodes stored values
//! into the bytes a backend keeps.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Trait for byte-level backend implementations.
///
/// All methods take `&self`; implementations use interior mutability or an
/// external server. Returned futures are `Send` so backend calls can run on
/// detached background tasks.
///
/// A missing key must be reported as `Ok(None)`, distinct from a stored empty
/// value. A TTL of zero must never be treated as "no expiration".
pub trait CacheBackend: Send + Sync + Clone + 'static {
    /// Retrieve bytes by key. `Ok(None)` on miss or expiry.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs (connection lost, etc.)
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store bytes with an optional TTL. `None` means no expiration.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove a key. Removing a missing key succeeds.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Health check - verify the backend is reachable.
    ///
    /// # Errors
    /// Returns `Err` if the backend is not accessible
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send {
        async { Ok::<_, crate::error::Error>(true) }
    }
}
