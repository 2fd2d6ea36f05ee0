//! Per-call refresh policy.
//!
//! A [`RefreshPolicy`] decides, for a single proxy call, whether the backing
//! store is consulted at all, whether a stale hit triggers a background refresh,
//! when a stored value counts as stale, and how long a written value lives.
//!
//! # Decision table
//!
//! | `force_refresh` | `allow_background_refresh` | Store state | Behavior |
//! |---|---|---|---|
//! | true | any | any | Fetch origin, write synchronously, return fresh value |
//! | false | any | miss | Fetch origin, return it, write in background |
//! | false | true | stale hit | Return cached value, refresh in background |
//! | false | any | fresh hit | Return cached value |
//! | false | false | stale hit | Return cached value |
//!
//! # TTL selection
//!
//! Every write, foreground or background, uses `empty_ttl` when the payload is
//! empty and `ttl` otherwise:
//!
//! ```
//! use cache_proxy::RefreshPolicy;
//! use std::time::Duration;
//!
//! let policy = RefreshPolicy::default()
//!     .with_ttl(Duration::from_secs(3600))
//!     .with_empty_ttl(Duration::from_secs(30));
//!
//! assert_eq!(policy.ttl_for(""), Duration::from_secs(30));
//! assert_eq!(policy.ttl_for("data"), Duration::from_secs(3600));
//! ```

use std::time::Duration;

/// Default lifetime of a written value in the store.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default age after which a stored value counts as stale.
pub const DEFAULT_REFRESH_OFFSET: Duration = Duration::from_secs(10 * 60);

/// Per-call cache configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Skip the store read; always fetch from the origin and write synchronously.
    pub force_refresh: bool,

    /// Serve stale hits immediately and refresh them in the background.
    pub allow_background_refresh: bool,

    /// Staleness threshold for ordinary values.
    pub refresh_offset: Duration,

    /// Staleness threshold for values the origin flagged with `needs_fast_requery`.
    pub fast_refresh_offset: Duration,

    /// Store expiration for non-empty payloads.
    pub ttl: Duration,

    /// Store expiration for empty payloads (negative caching).
    pub empty_ttl: Duration,

    /// Upper bound on this caller's wait for a synchronous origin fetch.
    ///
    /// Expiry abandons only this caller's wait. The shared fetch continues for
    /// other waiters and still populates the store.
    pub wait_timeout: Option<Duration>,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        RefreshPolicy {
            force_refresh: false,
            allow_background_refresh: false,
            refresh_offset: DEFAULT_REFRESH_OFFSET,
            fast_refresh_offset: DEFAULT_REFRESH_OFFSET,
            ttl: DEFAULT_TTL,
            empty_ttl: DEFAULT_TTL,
            wait_timeout: None,
        }
    }
}

impl RefreshPolicy {
    /// Policy for read paths that prefer stale data over waiting.
    pub fn stale_while_revalidate(refresh_offset: Duration) -> Self {
        RefreshPolicy::default()
            .with_background_refresh(true)
            .with_refresh_offset(refresh_offset)
            .with_fast_refresh_offset(refresh_offset)
    }

    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn with_background_refresh(mut self, allow: bool) -> Self {
        self.allow_background_refresh = allow;
        self
    }

    pub fn with_refresh_offset(mut self, offset: Duration) -> Self {
        self.refresh_offset = offset;
        self
    }

    pub fn with_fast_refresh_offset(mut self, offset: Duration) -> Self {
        self.fast_refresh_offset = offset;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_empty_ttl(mut self, ttl: Duration) -> Self {
        self.empty_ttl = ttl;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Store expiration for a payload about to be written.
    pub fn ttl_for(&self, payload: &str) -> Duration {
        if payload.is_empty() {
            self.empty_ttl
        } else {
            self.ttl
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_default() {
        let policy = RefreshPolicy::default();
        assert!(!policy.force_refresh);
        assert!(!policy.allow_background_refresh);
        assert_eq!(policy.ttl, Duration::from_secs(86_400));
        assert_eq!(policy.refresh_offset, Duration::from_secs(600));
        assert_eq!(policy.wait_timeout, None);
    }

    #[test]
    fn test_policy_builder() {
        let policy = RefreshPolicy::default()
            .with_force_refresh(true)
            .with_fast_refresh_offset(Duration::from_secs(5))
            .with_wait_timeout(Duration::from_millis(250));

        assert!(policy.force_refresh);
        assert_eq!(policy.fast_refresh_offset, Duration::from_secs(5));
        assert_eq!(policy.refresh_offset, DEFAULT_REFRESH_OFFSET);
        assert_eq!(policy.wait_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_ttl_selection() {
        let policy = RefreshPolicy::default()
            .with_ttl(Duration::from_secs(100))
            .with_empty_ttl(Duration::from_secs(5));

        assert_eq!(policy.ttl_for(""), Duration::from_secs(5));
        assert_eq!(policy.ttl_for(" "), Duration::from_secs(100));
    }

    #[test]
    fn test_stale_while_revalidate_preset() {
        let policy = RefreshPolicy::stale_while_revalidate(Duration::from_secs(60));
        assert!(policy.allow_background_refresh);
        assert_eq!(policy.refresh_offset, Duration::from_secs(60));
        assert_eq!(policy.fast_refresh_offset, Duration::from_secs(60));
    }
}
