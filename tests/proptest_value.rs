//! Property-based tests for stored values.
//!
//! # Properties Tested
//!
//! 1. **Staleness threshold**: a value is stale exactly when its age exceeds
//!    the offset selected by its `needs_fast_requery` flag
//! 2. **Monotonicity**: once stale, a value stays stale as time moves on
//! 3. **Undated values**: a value without creation time is never stale
//! 4. **Envelope**: every encoded value carries the magic and version and
//!    decodes back to itself
//! 5. **Version check**: an envelope from another schema version never decodes

use cache_proxy::serialization::{
    deserialize_value, serialize_value, ValueEnvelope, CURRENT_SCHEMA_VERSION, VALUE_MAGIC,
};
use cache_proxy::StoredValue;
use proptest::prelude::*;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MAX_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn base_time() -> impl Strategy<Value = SystemTime> {
    (0..MAX_SECS).prop_map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
}

fn offset() -> impl Strategy<Value = Duration> {
    (0u64..86_400_000).prop_map(Duration::from_millis)
}

fn stored_value() -> impl Strategy<Value = StoredValue> {
    (
        proptest::option::of(base_time()),
        any::<bool>(),
        any::<bool>(),
        ".*",
    )
        .prop_map(|(created_at, fast, absent, payload)| StoredValue {
            created_at,
            needs_fast_requery: fast,
            is_absent: absent,
            payload,
        })
}

proptest! {
    #[test]
    fn prop_stale_iff_age_exceeds_selected_offset(
        created in base_time(),
        age in offset(),
        normal in offset(),
        fast in offset(),
        volatile in any::<bool>(),
    ) {
        let value = StoredValue::new("payload", volatile).with_created_at(created);
        let now = created + age;
        let selected = if volatile { fast } else { normal };

        prop_assert_eq!(value.is_stale(normal, fast, now), age > selected);
    }

    #[test]
    fn prop_staleness_is_monotonic(
        created in base_time(),
        first in offset(),
        later in offset(),
        normal in offset(),
        fast in offset(),
        volatile in any::<bool>(),
    ) {
        let value = StoredValue::new("payload", volatile).with_created_at(created);
        let t1 = created + first;
        let t2 = t1 + later;

        if value.is_stale(normal, fast, t1) {
            prop_assert!(value.is_stale(normal, fast, t2));
        }
    }

    #[test]
    fn prop_undated_value_never_stale(
        normal in offset(),
        fast in offset(),
        now in base_time(),
        volatile in any::<bool>(),
    ) {
        let value = StoredValue {
            created_at: None,
            needs_fast_requery: volatile,
            is_absent: false,
            payload: "x".to_string(),
        };

        prop_assert!(!value.is_stale(normal, fast, now));
    }

    #[test]
    fn prop_wrong_version_detected(value in stored_value(), version in 2u32..1000) {
        let envelope = ValueEnvelope {
            magic: VALUE_MAGIC,
            version,
            payload: value,
        };
        let bytes = postcard::to_allocvec(&envelope).expect("Encoding should succeed");

        prop_assert!(deserialize_value(&bytes).is_err());
    }

    #[test]
    fn prop_envelope_holds_for_any_value(value in stored_value()) {
        let bytes = serialize_value(&value).expect("Serialization should succeed");

        prop_assert_eq!(&bytes[0..4], &VALUE_MAGIC[..]);

        // Version is a postcard varint, so read it back through the envelope.
        let envelope: ValueEnvelope<StoredValue> =
            postcard::from_bytes(&bytes).expect("Envelope should decode");
        prop_assert_eq!(envelope.version, CURRENT_SCHEMA_VERSION);

        let decoded = deserialize_value(&bytes).expect("Deserialization should succeed");
        prop_assert_eq!(decoded, value);
    }
}
