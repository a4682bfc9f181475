//! Typed ID definitions for inventory resources.

use crate::define_id;
use crate::IdError;

// =============================================================================
// Catalog
// =============================================================================

define_id!(InventoryId, "inv");
define_id!(ItemId, "itm");

// =============================================================================
// Requests
// =============================================================================

define_id!(RequestId, "req");

// =============================================================================
// Sequence Values
// =============================================================================

/// A value handed out by an inventory's sequence counter.
///
/// Counters start at [`SequenceValue::FIRST`] and only move forward. Values are
/// stored as `BIGINT` so the conversion from `i64` rejects anything below 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceValue(u64);

impl SequenceValue {
    /// Initial counter value for a newly created inventory.
    pub const FIRST: Self = Self(1);

    /// Largest value a counter can hand out (the `BIGINT` maximum).
    pub const MAX: Self = Self(i64::MAX as u64);

    /// Returns `None` for zero.
    #[must_use]
    pub const fn new(value: u64) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The following value, or `None` once the counter is exhausted.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        if self.0 >= Self::MAX.0 {
            None
        } else {
            Some(Self(self.0 + 1))
        }
    }
}

impl Default for SequenceValue {
    fn default() -> Self {
        Self::FIRST
    }
}

impl std::fmt::Display for SequenceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for SequenceValue {
    type Error = IdError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(IdError::InvalidSequence(value))
    }
}

impl From<SequenceValue> for i64 {
    fn from(value: SequenceValue) -> Self {
        i64::try_from(value.0).unwrap_or(i64::MAX)
    }
}

impl serde::Serialize for SequenceValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for SequenceValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================
