//! Byte encoding of stored values for byte-oriented backends.
//!
//! Every entry written through [`BackendStore`](crate::store::BackendStore) is
//! wrapped in a versioned envelope:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│ VERSION (u32)   │ POSTCARD(StoredValue)    │
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "CPXY"
//! ```
//!
//! Magic and version are checked on every read. A mismatch surfaces as an error
//! on the foreground path rather than as a silently misread value.
//!
//! ```rust
//! use cache_proxy::serialization::{deserialize_value, serialize_value};
//! use cache_proxy::StoredValue;
//!
//! # fn main() -> cache_proxy::Result<()> {
//! let value = StoredValue::new("payload", true);
//! let bytes = serialize_value(&value)?;
//! assert_eq!(deserialize_value(&bytes)?, value);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::value::StoredValue;
use serde::{Deserialize, Serialize};

/// Magic header for stored entries: b"CPXY"
pub const VALUE_MAGIC: [u8; 4] = *b"CPXY";

/// Current schema version of [`StoredValue`].
///
/// Increment when the layout of `StoredValue` changes. Entries written under a
/// different version fail to decode and must be refetched.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around a stored value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ValueEnvelope<T> {
    pub magic: [u8; 4],
    pub version: u32,
    pub payload: T,
}

impl<T> ValueEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            magic: VALUE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Encode a stored value for a byte backend.
///
/// # Errors
///
/// Returns `Error::SerializationError` if postcard encoding fails.
pub fn serialize_value(value: &StoredValue) -> Result<Vec<u8>> {
    postcard::to_allocvec(&ValueEnvelope::new(value)).map_err(|e| {
        error!("Stored value serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Decode and validate bytes read from a byte backend.
///
/// # Errors
///
/// - `Error::DeserializationError`: truncated or corrupted bytes
/// - `Error::InvalidCacheEntry`: magic header mismatch
/// - `Error::VersionMismatch`: entry written under another schema version
pub fn deserialize_value(bytes: &[u8]) -> Result<StoredValue> {
    let envelope: ValueEnvelope<StoredValue> = postcard::from_bytes(bytes).map_err(|e| {
        error!("Stored value deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != VALUE_MAGIC {
        warn!(
            "Invalid stored entry: expected magic {:?}, got {:?}",
            VALUE_MAGIC, envelope.magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            VALUE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Stored entry version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}
