//! Shape classification.
//!
//! The diff engine never inspects a value's container type ad hoc; it asks
//! for the value's [`Shape`] once, under the rule that matches the value's
//! role. An old value is a sequence only if it is packed, while a new value
//! only needs strictly increasing keys so that removals without
//! renumbering still read as a sequence.

use crate::value::Value;

/// What kind of stored container a value represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// `null`: nothing to diff against.
    Absent,
    /// Bool, number or string.
    Scalar,
    /// Addressed by field name. Every document, and any array whose keys
    /// do not satisfy the sequence rule for its role.
    KeyedMap,
    /// Addressed by integer position.
    Sequence,
}

impl Shape {
    /// Classify a value on the old side of a diff.
    pub fn of_old(value: &Value) -> Self {
        match value {
            Value::Array(array) if array.is_packed() => Self::Sequence,
            other => Self::of_non_array(other),
        }
    }

    /// Classify a value on the new side of a diff.
    pub fn of_new(value: &Value) -> Self {
        match value {
            Value::Array(array) if array.is_monotonic() => Self::Sequence,
            other => Self::of_non_array(other),
        }
    }

    fn of_non_array(value: &Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Array(_) | Value::Document(_) => Self::KeyedMap,
            _ => Self::Scalar,
        }
    }

    /// Returns `true` for shapes that can be diffed entry by entry.
    pub fn is_container(self) -> bool {
        matches!(self, Self::KeyedMap | Self::Sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Array, Document};

    fn list(items: &[i64]) -> Value {
        items.iter().copied().map(Value::from).collect::<Array>().into()
    }

    #[test]
    fn scalars_and_null() {
        assert_eq!(Shape::of_old(&Value::Null), Shape::Absent);
        assert_eq!(Shape::of_new(&Value::from("x")), Shape::Scalar);
        assert_eq!(Shape::of_old(&Value::Double(1.5)), Shape::Scalar);
    }

    #[test]
    fn documents_are_keyed_maps() {
        assert_eq!(Shape::of_old(&Document::new().into()), Shape::KeyedMap);
        assert_eq!(Shape::of_new(&Document::new().into()), Shape::KeyedMap);
    }

    #[test]
    fn gapped_array_is_sequence_only_when_new() {
        let mut array = list(&[1, 2, 3]).as_array().cloned().unwrap();
        array.remove(1);
        let value = Value::from(array);
        assert_eq!(Shape::of_new(&value), Shape::Sequence);
        assert_eq!(Shape::of_old(&value), Shape::KeyedMap);
    }

    #[test]
    fn out_of_order_array_is_keyed_map() {
        let value = Value::from(Array::from_entries([
            (0, Value::from(1)),
            (2, Value::from(3)),
            (1, Value::from(2)),
        ]));
        assert_eq!(Shape::of_new(&value), Shape::KeyedMap);
    }

    #[test]
    fn packed_array_is_sequence_on_both_sides() {
        assert_eq!(Shape::of_old(&list(&[1, 2])), Shape::Sequence);
        assert_eq!(Shape::of_new(&list(&[1, 2])), Shape::Sequence);
        assert!(Shape::Sequence.is_container());
        assert!(!Shape::Scalar.is_container());
    }
}
