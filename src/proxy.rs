//! Cache proxy - the single entry point for callers.
//!
//! [`CacheProxy::get_hit`] resolves a key against the backing store and the
//! origin according to a [`RefreshPolicy`]:
//!
//! ```text
//! get_hit(key)
//!   ├─ key == ""            → ("", false)        store and origin untouched
//!   ├─ force_refresh        → origin ─► write (awaited) ─► (fresh, false)
//!   └─ store.get(key)
//!        ├─ Err             → Err
//!        ├─ miss            → origin ─► (fresh, false), write in background
//!        ├─ stale + allowed → (cached, true), refresh in background
//!        └─ otherwise       → (cached, true)
//! ```
//!
//! Origin fetches always go through the proxy's [`RequestCoalescer`], so N
//! concurrent misses on one key cost one origin call and one store write. The
//! write belongs to the fetch, not to a caller: it happens even when every
//! caller has timed out or gone away. Failures of background work are logged
//! and never reach a caller.

use crate::background::BackgroundTasks;
use crate::backend::{CacheBackend, InMemoryBackend};
use crate::coalescer::{Flight, RequestCoalescer};
use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use crate::key::KeyBuilder;
use crate::origin::OriginGetter;
use crate::policy::RefreshPolicy;
use crate::store::{BackendStore, ValueStore};
use crate::value::{Fetched, StoredValue};
use futures::future::{ready, BoxFuture, FutureExt, Ready};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Proxy over the bundled in-memory backend.
pub type InMemoryProxy = CacheProxy<BackendStore<InMemoryBackend>>;

struct Inner<S: ValueStore> {
    store: S,
    keys: KeyBuilder,
    coalescer: RequestCoalescer,
    background: BackgroundTasks,
}

/// Read-through cache proxy with request coalescing and background refresh.
///
/// Cheap to clone: clones share the store, the in-flight table and the
/// background task pool. Construct one per independently configured cache and
/// pass it by reference or by clone.
///
/// # Example
///
/// ```no_run
/// use cache_proxy::backend::InMemoryBackend;
/// use cache_proxy::origin::InMemoryOrigin;
/// use cache_proxy::{CacheProxy, RefreshPolicy};
/// use std::sync::Arc;
///
/// # async fn example() -> cache_proxy::Result<()> {
/// let proxy = CacheProxy::from_backend(InMemoryBackend::new());
/// let origin = Arc::new(InMemoryOrigin::new());
/// origin.insert("user:1", "Alice");
///
/// let (name, hit) = proxy.get_hit(&RefreshPolicy::default(), "user:1", origin).await?;
/// assert_eq!(name, "Alice");
/// assert!(!hit);
/// # Ok(())
/// # }
/// ```
pub struct CacheProxy<S: ValueStore> {
    inner: Arc<Inner<S>>,
}

impl<S: ValueStore> Clone for CacheProxy<S> {
    fn clone(&self) -> Self {
        CacheProxy {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ValueStore> CacheProxy<S> {
    /// Create a proxy over `store` with the default configuration.
    pub fn new(store: S) -> Self {
        Self::from_parts(store, ProxyConfig::default())
    }

    /// Create a proxy with explicit configuration.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if `config` is invalid.
    pub fn with_config(store: S, config: ProxyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(store, config))
    }

    /// Start building a proxy.
    pub fn builder() -> CacheProxyBuilder<S> {
        CacheProxyBuilder::new()
    }

    fn from_parts(store: S, config: ProxyConfig) -> Self {
        debug!(
            "Cache proxy created (namespace: {:?}, max background tasks: {})",
            config.namespace, config.max_background_tasks
        );

        CacheProxy {
            inner: Arc::new(Inner {
                store,
                keys: KeyBuilder::new(config.namespace),
                coalescer: RequestCoalescer::new(),
                background: BackgroundTasks::new(config.max_background_tasks),
            }),
        }
    }

    /// Look up `key`, consulting `origin` as `policy` dictates.
    ///
    /// Returns the payload and whether it was served from the store.
    ///
    /// # Errors
    ///
    /// Returned only for work the answer depends on:
    /// - `Error::BackendError` (or a decoding error): store read failed, or the
    ///   synchronous write of a forced refresh failed. A miss that joins a
    ///   forced refresh's fetch shares that write's outcome.
    /// - `Error::OriginError`: the origin fetch on a miss or forced refresh failed
    /// - `Error::Timeout`: `policy.wait_timeout` elapsed while waiting on the origin
    ///
    /// Background write-backs and stale refreshes never produce an error here.
    pub async fn get_hit<G: OriginGetter>(
        &self,
        policy: &RefreshPolicy,
        key: &str,
        origin: Arc<G>,
    ) -> Result<(String, bool)> {
        if key.is_empty() {
            debug!("Empty key requested, answering not found");
            return Ok((String::new(), false));
        }

        let store_key = self.inner.keys.build(key).into_owned();

        if policy.force_refresh {
            debug!("FORCE refresh {}", store_key);
            let flight = self.inner.coalescer.fetch(
                key,
                origin,
                self.write_through(policy, store_key.clone()),
            );
            let leader = flight.is_leader();
            let fetched = wait_for(policy, key, flight).await?;

            // A joined fetch was started by another caller and may not have
            // written synchronously.
            if !leader {
                self.write_detached(policy, store_key, fetched.to_stored())
                    .await?;
            }
            return Ok((fetched.payload, false));
        }

        let cached = self.inner.store.get(&store_key).await?;
        match cached {
            Some(value) if !value.is_absent => {
                let stale = value.is_stale(
                    policy.refresh_offset,
                    policy.fast_refresh_offset,
                    SystemTime::now(),
                );

                if stale && policy.allow_background_refresh {
                    debug!("STALE hit {}, refreshing in background", store_key);
                    self.spawn_refresh(policy, key, store_key, origin);
                } else {
                    debug!("HIT {}", store_key);
                }

                Ok((value.into_payload(), true))
            }
            _ => {
                debug!("MISS {}, fetching from origin", store_key);
                let flight = self.inner.coalescer.fetch(
                    key,
                    origin,
                    self.write_back(policy, store_key),
                );
                let fetched = wait_for(policy, key, flight).await?;
                Ok((fetched.payload, false))
            }
        }
    }

    /// Like [`get_hit`](Self::get_hit), without the hit flag.
    ///
    /// # Errors
    /// Same as [`get_hit`](Self::get_hit).
    pub async fn get<G: OriginGetter>(
        &self,
        policy: &RefreshPolicy,
        key: &str,
        origin: Arc<G>,
    ) -> Result<String> {
        self.get_hit(policy, key, origin)
            .await
            .map(|(payload, _)| payload)
    }

    /// Write `payload` under `key` directly, bypassing the origin.
    ///
    /// The entry expires after `policy.empty_ttl` if `payload` is empty and
    /// `policy.ttl` otherwise. An empty key is ignored.
    ///
    /// # Errors
    /// Returns `Err` if the store write fails.
    pub async fn set(&self, policy: &RefreshPolicy, key: &str, payload: &str) -> Result<()> {
        if key.is_empty() {
            return Ok(());
        }

        let store_key = self.inner.keys.build(key);
        let ttl = policy.ttl_for(payload);
        self.inner
            .store
            .set(&store_key, &StoredValue::new(payload, false), ttl)
            .await
    }

    /// Delete `key` from the store. Deleting a missing key succeeds; an empty
    /// key is ignored.
    ///
    /// # Errors
    /// Returns `Err` if the store delete fails.
    pub async fn remove(&self, _policy: &RefreshPolicy, key: &str) -> Result<()> {
        if key.is_empty() {
            return Ok(());
        }

        let store_key = self.inner.keys.build(key);
        self.inner.store.delete(&store_key).await
    }

    /// Whether the backing store is reachable.
    ///
    /// # Errors
    /// Returns `Err` if the store cannot be contacted.
    pub async fn health_check(&self) -> Result<bool> {
        self.inner.store.health_check().await
    }

    /// Wait until every background write-back and refresh has finished,
    /// including writes still waiting on an origin fetch that no caller awaits.
    pub async fn wait_idle(&self) {
        self.inner.background.wait_idle().await
    }

    /// Background tasks not yet finished, counting fetches whose write-back
    /// is not queued yet.
    pub fn pending_background_tasks(&self) -> usize {
        self.inner.background.pending()
    }

    /// Keys with an origin fetch currently outstanding.
    pub fn in_flight_fetches(&self) -> usize {
        self.inner.coalescer.in_flight()
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// After-fetch step that writes the fetched value before waiters are
    /// answered. A failed write fails the fetch.
    fn write_through(
        &self,
        policy: &RefreshPolicy,
        store_key: String,
    ) -> impl FnOnce(&Fetched) -> BoxFuture<'static, Result<()>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        let policy = policy.clone();

        move |fetched: &Fetched| {
            let value = fetched.to_stored();
            let ttl = policy.ttl_for(&value.payload);
            async move { inner.store.set(&store_key, &value, ttl).await }.boxed()
        }
    }

    /// After-fetch step that queues one background write of the fetched value.
    ///
    /// The fetch counts as pending background work until the write is queued,
    /// so [`wait_idle`](Self::wait_idle) also covers fetches nobody awaits.
    fn write_back(
        &self,
        policy: &RefreshPolicy,
        store_key: String,
    ) -> impl FnOnce(&Fetched) -> Ready<Result<()>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        let policy = policy.clone();
        let pending = self.inner.background.track();

        move |fetched: &Fetched| {
            let value = fetched.to_stored();
            let ttl = policy.ttl_for(&value.payload);
            let description = format!("write-back of {}", store_key);
            let writer = Arc::clone(&inner);

            inner.background.spawn(description, async move {
                writer.store.set(&store_key, &value, ttl).await
            });
            drop(pending);
            ready(Ok(()))
        }
    }

    /// Write on a task of its own and wait for it.
    ///
    /// The write completes even if the caller stops waiting.
    async fn write_detached(
        &self,
        policy: &RefreshPolicy,
        store_key: String,
        value: StoredValue,
    ) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let ttl = policy.ttl_for(&value.payload);

        let task = tokio::spawn(async move { inner.store.set(&store_key, &value, ttl).await });

        task.await
            .map_err(|e| Error::BackendError(format!("store write task failed: {}", e)))?
    }

    fn spawn_refresh<G: OriginGetter>(
        &self,
        policy: &RefreshPolicy,
        key: &str,
        store_key: String,
        origin: Arc<G>,
    ) {
        let description = format!("refresh of {}", store_key);
        let flight = self
            .inner
            .coalescer
            .fetch(key, origin, self.write_back(policy, store_key));

        self.inner
            .background
            .spawn(description, async move { flight.await.map(|_| ()) });
    }
}

/// Wait on `flight`, giving up after the caller's wait timeout.
///
/// Giving up never cancels the fetch or its write.
async fn wait_for(policy: &RefreshPolicy, key: &str, flight: Flight) -> Result<Fetched> {
    match policy.wait_timeout {
        Some(limit) => tokio::time::timeout(limit, flight)
            .await
            .map_err(|_| timeout_error(key, limit))?,
        None => flight.await,
    }
}

impl<B: CacheBackend> CacheProxy<BackendStore<B>> {
    /// Create a proxy over a byte backend with the default configuration.
    pub fn from_backend(backend: B) -> Self {
        Self::new(BackendStore::new(backend))
    }
}

fn timeout_error(key: &str, limit: Duration) -> Error {
    warn!("Gave up waiting on origin for {} after {:?}", key, limit);
    Error::Timeout(format!("origin fetch for {} exceeded {:?}", key, limit))
}

/// Builder for [`CacheProxy`] that validates its inputs.
///
/// ```
/// use cache_proxy::backend::InMemoryBackend;
/// use cache_proxy::store::BackendStore;
/// use cache_proxy::CacheProxy;
///
/// let proxy = CacheProxy::builder()
///     .store(BackendStore::new(InMemoryBackend::new()))
///     .namespace("profiles")
///     .max_background_tasks(32)
///     .build();
/// assert!(proxy.is_ok());
///
/// let missing_store = CacheProxy::<BackendStore<InMemoryBackend>>::builder().build();
/// assert!(missing_store.is_err());
/// ```
pub struct CacheProxyBuilder<S: ValueStore> {
    store: Option<S>,
    config: ProxyConfig,
}

impl<S: ValueStore> CacheProxyBuilder<S> {
    pub fn new() -> Self {
        CacheProxyBuilder {
            store: None,
            config: ProxyConfig::default(),
        }
    }

    pub fn store(mut self, store: S) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = Some(namespace.into());
        self
    }

    pub fn max_background_tasks(mut self, max: usize) -> Self {
        self.config.max_background_tasks = max;
        self
    }

    /// Build the proxy.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if no store was supplied or the
    /// configuration is invalid.
    pub fn build(self) -> Result<CacheProxy<S>> {
        let store = self
            .store
            .ok_or_else(|| Error::ConfigError("a backing store is required".to_string()))?;
        CacheProxy::with_config(store, self.config)
    }
}

impl<S: ValueStore> Default for CacheProxyBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
