//! # cache-proxy
//!
//! A read-through cache proxy that sits between callers and a slow origin.
//!
//! ## Features
//!
//! - **Request coalescing:** concurrent misses on one key cost one origin call
//! - **Stale-while-revalidate:** serve aged entries immediately, refresh in the background
//! - **Negative caching:** empty origin answers are cached under their own, shorter TTL
//! - **Fast requery:** volatile values carry a flag that shortens their refresh window
//! - **Backend agnostic:** in-memory and Redis backends, or any custom [`ValueStore`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use cache_proxy::{
//!     backend::InMemoryBackend,
//!     CacheProxy, Fetched, RefreshPolicy,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> cache_proxy::Result<()> {
//! // 1. Create the proxy (cheap to clone, share it across tasks)
//! let proxy = CacheProxy::from_backend(InMemoryBackend::new());
//!
//! // 2. Describe the origin
//! let origin = Arc::new(|key: String| async move {
//!     // e.g. a database query
//!     Ok::<_, cache_proxy::Error>(Fetched::new(format!("profile of {}", key)))
//! });
//!
//! // 3. Pick a policy per call
//! let policy = RefreshPolicy::stale_while_revalidate(Duration::from_secs(60))
//!     .with_empty_ttl(Duration::from_secs(30));
//!
//! let (profile, hit) = proxy.get_hit(&policy, "user:42", origin).await?;
//! println!("{} (from cache: {})", profile, hit);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod background;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod key;
pub mod origin;
pub mod policy;
pub mod proxy;
pub mod serialization;
pub mod store;
pub mod value;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use coalescer::RequestCoalescer;
pub use config::ProxyConfig;
pub use error::{Error, Result};
pub use origin::OriginGetter;
pub use policy::RefreshPolicy;
pub use proxy::{CacheProxy, CacheProxyBuilder, InMemoryProxy};
pub use store::{BackendStore, ValueStore};
pub use value::{Fetched, StoredValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
