//! Per-key request coalescing ("single flight").
//!
//! Concurrent misses for one key collapse into a single origin fetch. The
//! first caller (the leader) starts the fetch on a detached task; everyone
//! arriving while it is outstanding joins the same shared future and receives
//! an identical outcome, error included. Once the fetch finishes the key is
//! released and the next caller starts a fresh fetch.
//!
//! ```text
//!  caller A ──┐
//!  caller B ──┼──► in_flight["user:1"] ──► one origin.fetch("user:1") ──► on_fetched
//!  caller C ──┘            │
//!                          └──► same Result<Fetched> delivered to A, B, C
//! ```
//!
//! The fetch runs on its own task, so a caller that stops waiting (dropped
//! future, timeout) never cancels it. The leader's `on_fetched` step runs on
//! that task once per fetch, whether or not anyone is still waiting.

use crate::error::{Error, Result};
use crate::origin::OriginGetter;
use crate::value::Fetched;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// A fetch that any number of callers can await.
pub type SharedFetch = Shared<BoxFuture<'static, Result<Fetched>>>;

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

/// Releases a key when its fetch task ends, including by panic.
///
/// Only the entry created for this fetch is removed, never a successor's.
struct Release {
    in_flight: Arc<DashMap<String, InFlight>>,
    key: String,
    id: u64,
}

impl Drop for Release {
    fn drop(&mut self) {
        let id = self.id;
        self.in_flight.remove_if(&self.key, |_, entry| entry.id == id);
    }
}

/// One caller's handle on a coalesced fetch. Await it for the outcome.
#[must_use = "a flight does nothing for the caller unless awaited"]
pub struct Flight {
    fetch: SharedFetch,
    leader: bool,
}

impl Flight {
    /// Whether this caller started the fetch (and so supplied `on_fetched`).
    pub fn is_leader(&self) -> bool {
        self.leader
    }
}

impl Future for Flight {
    type Output = Result<Fetched>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.fetch).poll(cx)
    }
}

/// Deduplicates concurrent origin fetches sharing the same key.
///
/// Clones share the same in-flight table.
#[derive(Clone, Default)]
pub struct RequestCoalescer {
    in_flight: Arc<DashMap<String, InFlight>>,
    next_id: Arc<AtomicU64>,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the outstanding fetch for `key`, or start one with `origin`.
    ///
    /// When a fetch is already in flight, neither `origin` nor `on_fetched` is
    /// called: the joined caller receives whatever the running fetch produces.
    /// Otherwise `on_fetched` runs on the fetch task after a successful fetch,
    /// before waiters are answered; an error from it becomes the outcome of the
    /// fetch.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn fetch<G, F, Fut>(&self, key: &str, origin: Arc<G>, on_fetched: F) -> Flight
    where
        G: OriginGetter,
        F: FnOnce(&Fetched) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                debug!("Coalescer JOIN {} (fetch #{})", key, entry.get().id);
                Flight {
                    fetch: entry.get().fetch.clone(),
                    leader: false,
                }
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let release = Release {
                    in_flight: Arc::clone(&self.in_flight),
                    key: key.to_string(),
                    id,
                };

                debug!("Coalescer START {} (fetch #{})", key, id);

                let task = tokio::spawn(async move {
                    let guard = release;
                    let fetched = origin.fetch(&guard.key).await?;
                    on_fetched(&fetched).await?;
                    Ok(fetched)
                });

                let fetch = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(e) => Err(Error::OriginError(format!("origin task failed: {}", e))),
                    }
                }
                .boxed()
                .shared();

                entry.insert(InFlight {
                    id,
                    fetch: fetch.clone(),
                });
                Flight {
                    fetch,
                    leader: true,
                }
            }
        }
    }

    /// Number of keys with a fetch currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }
}
