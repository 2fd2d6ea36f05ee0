//! Error types for the cache proxy.

use std::fmt;

/// Result type for cache proxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache proxy.
///
/// Errors are `Clone` because a single coalesced origin fetch delivers the same
/// outcome, error included, to every caller waiting on it.
///
/// An empty key is never an error at the proxy level: `get_hit` answers it with
/// a plain "not found".
#[derive(Debug, Clone)]
pub enum Error {
    /// Serialization failed when encoding a stored value into bytes.
    SerializationError(String),

    /// Deserialization failed when decoding stored bytes.
    ///
    /// This indicates corrupted or truncated data in the backing store.
    DeserializationError(String),

    /// A store adapter was handed a key it refuses to use (empty key).
    ValidationError(String),

    /// Backing store error (Redis, connection pool, etc).
    ///
    /// Returned to the caller on the foreground path only. Failures of
    /// background writes are logged and dropped.
    BackendError(String),

    /// The origin getter failed.
    ///
    /// Returned to every caller waiting on the failed fetch when that fetch was
    /// on their critical path (force refresh or cold miss).
    OriginError(String),

    /// The caller's wait on an origin fetch exceeded `RefreshPolicy::wait_timeout`.
    ///
    /// The shared fetch keeps running, and its result is still written to the
    /// store.
    Timeout(String),

    /// Configuration error during proxy construction.
    ///
    /// Common causes:
    /// - No backing store supplied to the builder
    /// - `max_background_tasks` set to zero
    /// - Invalid connection string
    ConfigError(String),

    /// Invalid stored entry: bad magic header or undecodable envelope.
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and stored data.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from stored entry)
        found: u32,
    },
}

impl Error {
    /// True for failures of the origin getter.
    pub fn is_origin(&self) -> bool {
        matches!(self, Error::OriginError(_))
    }

    /// True for failures reading or decoding the backing store.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Error::BackendError(_)
                | Error::DeserializationError(_)
                | Error::SerializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OriginError(msg) => write!(f, "Origin error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
        }
    }
}

impl std::error::Error for Error {}
