//! Origin getters: the slow source of truth behind the cache.
//!
//! An [`OriginGetter`] fetches the current payload for one key. The proxy
//! guarantees at most one concurrent call per key through the
//! [`RequestCoalescer`](crate::coalescer::RequestCoalescer); getters must still
//! tolerate concurrent calls for different keys.
//!
//! Any async closure `Fn(String) -> impl Future<Output = Result<Fetched>>` is a
//! getter:
//!
//! ```
//! use cache_proxy::{Fetched, OriginGetter};
//!
//! # async fn example() -> cache_proxy::Result<()> {
//! let origin = |key: String| async move {
//!     Ok::<_, cache_proxy::Error>(Fetched::new(format!("value for {}", key)))
//! };
//! let fetched = origin.fetch("user:1").await?;
//! assert_eq!(fetched.payload, "value for user:1");
//! # Ok(())
//! # }
//! ```
//!
//! Retrying failed fetches is the getter's business; the proxy never retries.

use crate::error::{Error, Result};
use crate::value::Fetched;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Single-key origin fetch.
pub trait OriginGetter: Send + Sync + 'static {
    /// Fetch the current payload for `key`.
    ///
    /// # Returns
    /// - `Ok(fetched)` - payload (possibly empty) and its volatility hint
    ///
    /// # Errors
    /// Returns `Err` if the origin is unavailable or the fetch fails
    fn fetch(&self, key: &str) -> impl Future<Output = Result<Fetched>> + Send;
}

impl<F, Fut> OriginGetter for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Fetched>> + Send,
{
    fn fetch(&self, key: &str) -> impl Future<Output = Result<Fetched>> + Send {
        (self)(key.to_string())
    }
}

/// Map-backed origin for testing.
///
/// Counts every call, and can simulate latency and failures. Keys without a
/// configured value resolve to an empty payload (the origin knows nothing).
///
/// ```
/// use cache_proxy::origin::InMemoryOrigin;
/// use cache_proxy::OriginGetter;
///
/// # async fn example() -> cache_proxy::Result<()> {
/// let origin = InMemoryOrigin::new();
/// origin.insert("user:1", "Alice");
///
/// assert_eq!(origin.fetch("user:1").await?.payload, "Alice");
/// assert_eq!(origin.calls(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryOrigin {
    data: Arc<DashMap<String, Fetched>>,
    calls: Arc<AtomicUsize>,
    latency: Option<Duration>,
    failure: Arc<DashMap<String, String>>,
}

impl InMemoryOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Set the payload returned for `key`.
    pub fn insert(&self, key: impl Into<String>, payload: impl Into<String>) {
        self.data.insert(key.into(), Fetched::new(payload));
    }

    /// Set a payload flagged with `needs_fast_requery`.
    pub fn insert_volatile(&self, key: impl Into<String>, payload: impl Into<String>) {
        self.data.insert(key.into(), Fetched::fast_requery(payload));
    }

    /// Make fetches of `key` fail with `message` until [`recover`](Self::recover).
    pub fn fail(&self, key: impl Into<String>, message: impl Into<String>) {
        self.failure.insert(key.into(), message.into());
    }

    pub fn recover(&self, key: &str) {
        self.failure.remove(key);
    }

    /// Total number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OriginGetter for InMemoryOrigin {
    async fn fetch(&self, key: &str) -> Result<Fetched> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(message) = self.failure.get(key).map(|m| m.value().clone()) {
            return Err(Error::OriginError(message));
        }

        let fetched = self
            .data
            .get(key)
            .map(|f| f.value().clone())
            .unwrap_or_else(Fetched::empty);
        Ok(fetched)
    }
}
