//! Measurement identity.
//!
//! A [`MeasurementKey`] identifies one telemetry signal. The durable
//! identity is the signal's UUID; the `SOURCE:ID` composite (device
//! acronym plus a small per-source index) rides along for display and for
//! fast numeric routing in adapters that predate UUID identification.
//! Equality, ordering, and hashing consider the UUID alone, so two keys
//! with mismatched composites still address the same signal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GridFrameError, Result};

static UNDEFINED: Lazy<MeasurementKey> = Lazy::new(|| MeasurementKey {
    signal_id: Uuid::nil(),
    source: Arc::from("__"),
    id: u64::MAX,
});

/// Identifies a single telemetry signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementKey {
    signal_id: Uuid,
    source: Arc<str>,
    id: u64,
}

impl MeasurementKey {
    /// Creates a key for the given signal.
    ///
    /// The nil UUID is reserved for [`MeasurementKey::undefined`] and is
    /// rejected here, so every constructed key is well-formed.
    pub fn new(signal_id: Uuid, source: impl Into<Arc<str>>, id: u64) -> Result<Self> {
        if signal_id.is_nil() {
            return Err(GridFrameError::UndefinedSignal);
        }
        Ok(MeasurementKey {
            signal_id,
            source: source.into(),
            id,
        })
    }

    /// Creates a key with a freshly generated signal UUID.
    pub fn generate(source: impl Into<Arc<str>>, id: u64) -> Self {
        MeasurementKey {
            signal_id: Uuid::new_v4(),
            source: source.into(),
            id,
        }
    }

    /// The sentinel key for measurements with no assigned signal.
    pub fn undefined() -> Self {
        UNDEFINED.clone()
    }

    /// Whether this key is the undefined sentinel.
    pub fn is_undefined(&self) -> bool {
        self.signal_id.is_nil()
    }

    /// The signal UUID, the durable identity of this key.
    pub fn signal_id(&self) -> Uuid {
        self.signal_id
    }

    /// The source acronym half of the `SOURCE:ID` composite.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The numeric half of the `SOURCE:ID` composite.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for MeasurementKey {
    fn eq(&self, other: &Self) -> bool {
        self.signal_id == other.signal_id
    }
}

impl Eq for MeasurementKey {}

impl Hash for MeasurementKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signal_id.hash(state);
    }
}

impl PartialOrd for MeasurementKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MeasurementKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.signal_id.cmp(&other.signal_id)
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(key: &MeasurementKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn rejects_nil_signal_id() {
        let result = MeasurementKey::new(Uuid::nil(), "PMU-7", 12);
        assert!(matches!(result, Err(GridFrameError::UndefinedSignal)));
    }

    #[test]
    fn identity_is_the_signal_id_alone() {
        let signal_id = Uuid::new_v4();
        let a = MeasurementKey::new(signal_id, "PMU-7", 12).unwrap();
        let b = MeasurementKey::new(signal_id, "RENAMED", 99).unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn distinct_signals_are_unequal() {
        let a = MeasurementKey::generate("PMU-7", 12);
        let b = MeasurementKey::generate("PMU-7", 12);
        assert_ne!(a, b);
    }

    #[test]
    fn displays_source_id_composite() {
        let key = MeasurementKey::generate("PMU-7", 12);
        assert_eq!(key.to_string(), "PMU-7:12");
    }

    #[test]
    fn undefined_sentinel_is_recognizable() {
        let key = MeasurementKey::undefined();
        assert!(key.is_undefined());
        assert_eq!(key.source(), "__");
        assert_eq!(key.id(), u64::MAX);
        assert!(!MeasurementKey::generate("PMU-7", 12).is_undefined());
    }

    #[test]
    fn serde_round_trip_preserves_identity() {
        let key = MeasurementKey::generate("PMU-7", 12);
        let json = serde_json::to_string(&key).unwrap();
        let back: MeasurementKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
        assert_eq!(back.source(), "PMU-7");
        assert_eq!(back.id(), 12);
    }
}
