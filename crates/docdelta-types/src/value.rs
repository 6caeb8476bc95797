//! In-memory document values.
//!
//! A [`Value`] mirrors the semi-structured model of a document store:
//! scalars, keyed documents and integer-keyed arrays. Arrays keep their keys
//! so that a "new" snapshot can be produced by removing elements from an
//! "old" one without renumbering, which is what lets the diff engine tell a
//! removal apart from a shift.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::TypeError;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A document value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Array),
    Document(Document),
}

impl PartialEq for Value {
    /// Strict, type-sensitive equality: `Int(1)` and `Double(1.0)` differ
    /// because replacing one with the other changes the stored type. NaN is
    /// equal to itself so that every value diffs empty against itself.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Document(a), Self::Document(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Human-readable name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Document(_) => "document",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// A copy with every array renumbered to packed `0..n-1` keys, which is
    /// the form a document store holds after persisting the value.
    pub fn compacted(&self) -> Value {
        match self {
            Self::Array(array) => Self::Array(array.compacted()),
            Self::Document(doc) => Self::Document(doc.compacted()),
            other => other.clone(),
        }
    }

    /// Convert to a `serde_json::Value`. Array keys are dropped and
    /// non-finite doubles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(array) => {
                serde_json::Value::Array(array.values().map(Value::to_json).collect())
            }
            Self::Document(doc) => serde_json::Value::Object(
                doc.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Double(d) => serializer.serialize_f64(*d),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(array) => array.serialize(serializer),
            Self::Document(doc) => doc.serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Self::Document(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Self::Array(array)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(Array::from(items))
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An insertion-ordered keyed map.
///
/// Equality ignores field order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document(IndexMap<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Insert or replace a field. New fields are appended.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a field, keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy with every nested array renumbered; see [`Value::compacted`].
    pub fn compacted(&self) -> Document {
        self.iter().map(|(k, v)| (k.clone(), v.compacted())).collect()
    }

    /// Parse a JSON object into a document.
    pub fn from_json(json: serde_json::Value) -> Result<Self, TypeError> {
        Self::try_from(Value::from(json))
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl TryFrom<Value> for Document {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Document(doc) => Ok(doc),
            other => Err(TypeError::NotADocument {
                found: other.type_name(),
            }),
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Array
// ---------------------------------------------------------------------------

/// An integer-keyed sequence.
///
/// Entries keep the key they were inserted under. [`Array::remove`] leaves
/// a gap rather than shifting later elements, and [`Array::from_entries`]
/// accepts keys in any order. Whether an array is still a sequence is
/// decided by [`Array::is_packed`] and [`Array::is_monotonic`].
///
/// [`Array::push`] never reuses a removed key, so an element appended after
/// removals still reads as an addition. Lookups are constant time while the
/// entry at a position carries that position as its key, which holds for
/// every packed array.
#[derive(Clone, Debug, Default)]
pub struct Array {
    entries: Vec<(usize, Value)>,
    /// One past the largest key ever inserted.
    next_key: usize,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an array from explicit `(key, value)` pairs, kept in the given
    /// order. A repeated key replaces the earlier entry in place.
    pub fn from_entries(entries: impl IntoIterator<Item = (usize, Value)>) -> Self {
        let mut array = Self::new();
        for (key, value) in entries {
            array.insert(key, value);
        }
        array
    }

    fn position(&self, key: usize) -> Option<usize> {
        if key >= self.next_key {
            return None;
        }
        match self.entries.get(key) {
            Some((k, _)) if *k == key => Some(key),
            _ => self.entries.iter().position(|(k, _)| *k == key),
        }
    }

    pub fn get(&self, key: usize) -> Option<&Value> {
        self.position(key).map(|pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, key: usize) -> Option<&mut Value> {
        let pos = self.position(key)?;
        Some(&mut self.entries[pos].1)
    }

    /// Replace the value under `key`, or append a new entry.
    pub fn insert(&mut self, key: usize, value: impl Into<Value>) -> Option<Value> {
        let value = value.into();
        match self.position(key) {
            Some(pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.entries.push((key, value));
                self.next_key = self.next_key.max(key + 1);
                None
            }
        }
    }

    /// Append a value under the next key after the largest one ever used.
    pub fn push(&mut self, value: impl Into<Value>) {
        self.entries.push((self.next_key, value.into()));
        self.next_key += 1;
    }

    /// Remove the entry under `key` without renumbering the others.
    pub fn remove(&mut self, key: usize) -> Option<Value> {
        let pos = self.position(key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains_key(&self, key: usize) -> bool {
        self.position(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys are exactly `0..len` in order.
    pub fn is_packed(&self) -> bool {
        self.keys().enumerate().all(|(i, k)| i == k)
    }

    /// Keys are strictly increasing; gaps and a non-zero start are allowed.
    pub fn is_monotonic(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].0 < w[1].0)
    }

    /// A packed copy, renumbered recursively.
    pub fn compacted(&self) -> Array {
        self.values().map(Value::compacted).collect()
    }

    pub fn into_values(self) -> impl Iterator<Item = Value> {
        self.entries.into_iter().map(|(_, v)| v)
    }
}

impl PartialEq for Array {
    /// Compares entries only; keys freed by removal do not matter.
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        items.into_iter().collect()
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let entries: Vec<(usize, Value)> = iter.into_iter().enumerate().collect();
        Self {
            next_key: entries.len(),
            entries,
        }
    }
}

impl Serialize for Array {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for value in self.values() {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn strict_numeric_equality() {
        assert_ne!(Value::Int(1), Value::Double(1.0));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    }

    #[test]
    fn document_equality_ignores_field_order() {
        let a = Document::from_json(json!({"a": 1, "b": 2})).unwrap();
        let b = Document::from_json(json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn remove_keeps_remaining_keys() {
        let mut array = Array::from(vec![Value::from(1), Value::from(2), Value::from(3)]);
        assert_eq!(array.remove(1), Some(Value::from(2)));
        assert_eq!(array.keys().collect::<Vec<_>>(), vec![0, 2]);
        assert!(!array.is_packed());
        assert!(array.is_monotonic());
    }

    #[test]
    fn push_after_gap_uses_next_key() {
        let mut array = Array::from(vec![Value::from(1), Value::from(2), Value::from(3)]);
        array.remove(2);
        array.push(4);
        assert_eq!(array.keys().collect::<Vec<_>>(), vec![0, 1, 3]);
    }

    #[test]
    fn push_never_reuses_removed_keys() {
        let mut array = Array::from(vec![Value::from(1), Value::from(2), Value::from(3)]);
        array.remove(2);
        array.remove(1);
        array.push(4);
        assert_eq!(array.keys().collect::<Vec<_>>(), vec![0, 3]);

        let mut shorter = Array::from(vec![Value::from(1), Value::from(2)]);
        shorter.remove(1);
        assert_eq!(shorter, Array::from(vec![Value::from(1)]));
    }

    #[test]
    fn lookups_on_gapped_and_unordered_keys() {
        let mut array = Array::from_entries([
            (5, Value::from("five")),
            (1, Value::from("one")),
            (3, Value::from("three")),
        ]);
        assert_eq!(array.get(1), Some(&Value::from("one")));
        assert_eq!(array.get(3), Some(&Value::from("three")));
        assert_eq!(array.get(0), None);
        assert!(!array.contains_key(6));
        assert_eq!(array.insert(3, "THREE"), Some(Value::from("three")));
        array.push("six");
        assert_eq!(array.keys().collect::<Vec<_>>(), vec![5, 1, 3, 6]);
    }

    #[test]
    fn large_array_builds_and_looks_up() {
        let mut array = Array::new();
        for n in 0..100_000i64 {
            array.push(n);
        }
        assert!(array.is_packed());
        assert_eq!(array.get(99_999), Some(&Value::Int(99_999)));
        assert!((0..100_000).all(|key| array.contains_key(key)));
    }

    #[test]
    fn out_of_order_keys_are_not_monotonic() {
        let array = Array::from_entries([
            (0, Value::from(1)),
            (2, Value::from(3)),
            (1, Value::from(2)),
        ]);
        assert!(!array.is_monotonic());
        assert!(!array.is_packed());
    }

    #[test]
    fn empty_array_is_packed() {
        assert!(Array::new().is_packed());
        assert!(Array::new().is_monotonic());
    }

    #[test]
    fn json_conversion() {
        let value = Value::from(json!({"n": 1, "d": 1.5, "list": [true, null, "x"]}));
        let doc = value.as_document().unwrap();
        assert_eq!(doc.get("n"), Some(&Value::Int(1)));
        assert_eq!(doc.get("d"), Some(&Value::Double(1.5)));
        assert_eq!(doc.get("list").unwrap().as_array().unwrap().len(), 3);
        assert_eq!(value.to_json(), json!({"n": 1, "d": 1.5, "list": [true, null, "x"]}));
    }

    #[test]
    fn serialization_drops_array_keys() {
        let mut array = Array::from(vec![Value::from(1), Value::from(2), Value::from(3)]);
        array.remove(0);
        assert_eq!(serde_json::to_value(Value::from(array)).unwrap(), json!([2, 3]));
    }

    #[test]
    fn document_try_from_scalar_fails() {
        assert_eq!(
            Document::try_from(Value::from("x")),
            Err(TypeError::NotADocument { found: "string" })
        );
    }

    proptest! {
        #[test]
        fn compacted_arrays_are_packed(len in 0usize..20, removed in proptest::collection::vec(0usize..20, 0..10)) {
            let mut array: Array = (0..len as i64).map(Value::from).collect();
            for key in removed {
                array.remove(key);
            }
            prop_assert!(array.is_monotonic());
            for (key, value) in array.iter() {
                prop_assert_eq!(array.get(key), Some(value));
            }
            let compacted = array.compacted();
            prop_assert!(compacted.is_packed());
            prop_assert_eq!(compacted.len(), array.len());
        }
    }
}
