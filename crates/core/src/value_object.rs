//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. Two
/// specification combinations with the same pairs are the same combination, no
/// matter which product carries them.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
