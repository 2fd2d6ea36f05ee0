//! Stored values and origin results.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// One cached entry as persisted in the backing store.
///
/// A stored value is never mutated in place: every write replaces the previous
/// entry wholesale, and staleness is derived from `created_at` alone.
///
/// # Example
///
/// ```
/// use cache_proxy::StoredValue;
/// use std::time::{Duration, SystemTime};
///
/// let value = StoredValue::new("payload", false);
/// let later = SystemTime::now() + Duration::from_secs(120);
///
/// assert!(value.is_stale(Duration::from_secs(60), Duration::from_secs(5), later));
/// assert!(!value.is_stale(Duration::from_secs(600), Duration::from_secs(5), later));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    /// Time of the write that produced this value. `None` means never written.
    pub created_at: Option<SystemTime>,

    /// The origin flagged this value as volatile.
    pub needs_fast_requery: bool,

    /// The store holds no entry for the key.
    pub is_absent: bool,

    /// Cached content. Empty for negative-cache entries.
    pub payload: String,
}

impl StoredValue {
    /// Materialize a freshly fetched or written payload, stamped with the current time.
    pub fn new(payload: impl Into<String>, needs_fast_requery: bool) -> Self {
        StoredValue {
            created_at: Some(SystemTime::now()),
            needs_fast_requery,
            is_absent: false,
            payload: payload.into(),
        }
    }

    /// The "no entry" marker.
    pub fn absent() -> Self {
        StoredValue {
            created_at: None,
            needs_fast_requery: false,
            is_absent: true,
            payload: String::new(),
        }
    }

    /// Override the creation timestamp.
    pub fn with_created_at(mut self, created_at: SystemTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Whether this value is older than the offset that applies to it.
    ///
    /// `fast_offset` applies when `needs_fast_requery` is set, `normal_offset`
    /// otherwise. A value that was never written is never stale; absence must be
    /// checked separately through `is_absent`.
    pub fn is_stale(&self, normal_offset: Duration, fast_offset: Duration, now: SystemTime) -> bool {
        let Some(created_at) = self.created_at else {
            return false;
        };

        let offset = if self.needs_fast_requery {
            fast_offset
        } else {
            normal_offset
        };

        match created_at.checked_add(offset) {
            Some(deadline) => deadline < now,
            None => false,
        }
    }

    /// True for negative-cache entries.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Consume the value, returning its payload.
    pub fn into_payload(self) -> String {
        self.payload
    }
}

impl Default for StoredValue {
    fn default() -> Self {
        StoredValue::absent()
    }
}

/// Successful result of an origin fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetched {
    /// Fetched content. May be empty to record "known missing".
    pub payload: String,

    /// Ask the proxy to treat this value as stale after the fast offset.
    pub needs_fast_requery: bool,
}

impl Fetched {
    pub fn new(payload: impl Into<String>) -> Self {
        Fetched {
            payload: payload.into(),
            needs_fast_requery: false,
        }
    }

    /// A volatile result that should be re-fetched sooner than usual.
    pub fn fast_requery(payload: impl Into<String>) -> Self {
        Fetched {
            payload: payload.into(),
            needs_fast_requery: true,
        }
    }

    /// Negative result: the origin has nothing for this key.
    pub fn empty() -> Self {
        Fetched::new(String::new())
    }

    /// Stamp this result into a value ready to be written.
    pub fn to_stored(&self) -> StoredValue {
        StoredValue::new(self.payload.clone(), self.needs_fast_requery)
    }
}
