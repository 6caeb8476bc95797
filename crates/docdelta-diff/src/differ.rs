//! The diff engine.
//!
//! Dispatches on the [`Shape`] of both operands: keyed maps are compared by
//! field name, sequences by position, and every other combination degrades
//! to a full replacement. The engine is total; there is no input it cannot
//! express as a diff.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use docdelta_types::{Array, DiffConfig, Document, Shape, Value};

use crate::model::{ConditionalDiff, Diff, ListDiff, ListKey, ObjectDiff};

/// Compute the diff between two values using the default configuration.
pub fn diff(old: &Value, new: &Value) -> Diff {
    Differ::default().diff(old, new)
}

/// Compute the diff between two top-level documents using the default
/// configuration. The result is always [`Diff::Empty`] or [`Diff::Object`].
pub fn diff_documents(old: &Document, new: &Document) -> Diff {
    Differ::default().diff_documents(old, new)
}

/// Structural diff engine.
#[derive(Clone, Debug, Default)]
pub struct Differ {
    config: DiffConfig,
}

impl Differ {
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Compute the diff between two values.
    pub fn diff(&self, old: &Value, new: &Value) -> Diff {
        let diff = self.diff_values(old, new);
        debug!(changes = diff.change_count(), "computed value diff");
        diff
    }

    /// Compute the diff between two documents. Documents are always keyed
    /// maps, so the result is never a sequence change or a replacement.
    pub fn diff_documents(&self, old: &Document, new: &Document) -> Diff {
        let diff = self.diff_keyed(&document_entries(old), &document_entries(new));
        debug!(changes = diff.change_count(), "computed document diff");
        diff
    }

    fn diff_values(&self, old: &Value, new: &Value) -> Diff {
        if old == new {
            return Diff::Empty;
        }

        match (Shape::of_old(old), Shape::of_new(new)) {
            (Shape::KeyedMap, Shape::KeyedMap) => {
                self.diff_keyed(&keyed_entries(old), &keyed_entries(new))
            }
            (Shape::Sequence, Shape::Sequence) => match (old, new) {
                (Value::Array(old), Value::Array(new)) => self.diff_sequence(old, new),
                _ => Diff::Value(new.clone()),
            },
            // Absent on either side, scalars, or a container whose stored
            // type would change.
            _ => Diff::Value(new.clone()),
        }
    }

    fn diff_keyed(&self, old: &[(Cow<'_, str>, &Value)], new: &[(Cow<'_, str>, &Value)]) -> Diff {
        let new_index: HashMap<&str, &Value> =
            new.iter().map(|(k, v)| (&**k, *v)).collect();
        let old_keys: HashSet<&str> = old.iter().map(|(k, _)| &**k).collect();

        let mut changed = Vec::new();
        let mut removed = Vec::new();

        for (key, old_val) in old {
            match new_index.get(&**key) {
                Some(new_val) => {
                    let diff = self.diff_values(old_val, new_val);
                    if !diff.is_empty() {
                        changed.push((key.to_string(), diff));
                    }
                }
                None => removed.push(key.to_string()),
            }
        }

        let added: Vec<(String, Value)> = new
            .iter()
            .filter(|(k, _)| !old_keys.contains(&**k))
            .map(|(k, v)| (k.to_string(), (*v).clone()))
            .collect();

        trace!(
            added = added.len(),
            changed = changed.len(),
            removed = removed.len(),
            "keyed map diff"
        );

        let diff = ObjectDiff::new(added, changed, removed);
        if diff.is_empty() {
            Diff::Empty
        } else {
            Diff::Object(diff)
        }
    }

    fn diff_sequence(&self, old: &Array, new: &Array) -> Diff {
        let new_index: HashMap<usize, &Value> = new.iter().collect();

        let mut changed = Vec::new();
        let mut removed = Vec::new();

        for (key, old_val) in old.iter() {
            match new_index.get(&key) {
                Some(new_val) => {
                    let diff = self.diff_values(old_val, new_val);
                    if diff.is_empty() {
                        continue;
                    }
                    let diff = match self.identity_of(old_val) {
                        Some(id) => Diff::Conditional(ConditionalDiff::new(id.clone(), diff)),
                        None => diff,
                    };
                    changed.push((key, diff));
                }
                None => removed.push(match self.identity_of(old_val) {
                    Some(id) => ListKey::Conditional(ConditionalDiff::removal(id.clone())),
                    None => ListKey::Position(key),
                }),
            }
        }

        let added: Vec<(usize, Value)> = new
            .iter()
            .filter(|(k, _)| !old.contains_key(*k))
            .map(|(k, v)| (k, v.clone()))
            .collect();

        trace!(
            added = added.len(),
            changed = changed.len(),
            removed = removed.len(),
            "sequence diff"
        );

        let diff = ListDiff::new(added, changed, removed);
        if diff.is_empty() {
            Diff::Empty
        } else {
            Diff::List(diff)
        }
    }

    /// The identity of a sequence element: a non-null identity field on a
    /// document element. A dotted identity field is followed through nested
    /// documents, the way the compiled update reads it.
    fn identity_of<'a>(&self, element: &'a Value) -> Option<&'a Value> {
        let mut current = element;
        for segment in self.config.identity_field.split('.') {
            current = current.as_document()?.get(segment)?;
        }
        Some(current).filter(|id| !id.is_null())
    }
}

fn document_entries(doc: &Document) -> Vec<(Cow<'_, str>, &Value)> {
    doc.iter().map(|(k, v)| (Cow::Borrowed(k.as_str()), v)).collect()
}

/// Field-name view of a keyed map. Arrays classified as keyed maps are
/// stored as documents, so their indices become field names.
fn keyed_entries(value: &Value) -> Vec<(Cow<'_, str>, &Value)> {
    match value {
        Value::Document(doc) => document_entries(doc),
        Value::Array(array) => array
            .iter()
            .map(|(k, v)| (Cow::Owned(k.to_string()), v))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn doc(json: serde_json::Value) -> Document {
        Document::from_json(json).unwrap()
    }

    fn object(diff: Diff) -> ObjectDiff {
        match diff {
            Diff::Object(diff) => diff,
            other => panic!("expected Object, got {:?}", other),
        }
    }

    fn list(diff: Diff) -> ListDiff {
        match diff {
            Diff::List(diff) => diff,
            other => panic!("expected List, got {:?}", other),
        }
    }

    fn without(value: serde_json::Value, keys: &[usize]) -> Value {
        let mut array = v(value).as_array().cloned().unwrap();
        for key in keys {
            array.remove(*key);
        }
        Value::Array(array)
    }

    #[test]
    fn identical_values_no_diff() {
        let value = v(json!({"a": [1, {"b": null}], "c": "x"}));
        assert_eq!(diff(&value, &value.clone()), Diff::Empty);
        assert_eq!(diff(&Value::Null, &Value::Null), Diff::Empty);
    }

    #[test]
    fn scalar_changes() {
        assert_eq!(diff(&v(json!("foo")), &v(json!("bar"))), Diff::Value(v(json!("bar"))));
        assert_eq!(diff(&Value::Int(1), &Value::Double(1.0)), Diff::Value(Value::Double(1.0)));
    }

    #[test]
    fn null_on_either_side_replaces() {
        assert_eq!(diff(&v(json!([1, 2, 3])), &Value::Null), Diff::Value(Value::Null));
        assert_eq!(diff(&Value::Null, &v(json!({"foo": "bar"}))), Diff::Value(v(json!({"foo": "bar"}))));
    }

    #[test]
    fn scalar_and_composite_replace() {
        assert_eq!(diff(&v(json!("foo")), &v(json!({"bar": "baz"}))), Diff::Value(v(json!({"bar": "baz"}))));
        assert_eq!(diff(&v(json!({"foo": "bar"})), &v(json!("bar"))), Diff::Value(v(json!("bar"))));
    }

    #[test]
    fn added_field() {
        let diff = object(diff_documents(&doc(json!({"foo": "bar"})), &doc(json!({"foo": "bar", "bar": "baz"}))));
        assert_eq!(diff.added, vec![("bar".to_string(), v(json!("baz")))]);
        assert!(diff.changed.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn changed_field_to_null() {
        let diff = object(diff(&v(json!({"foo": "bar"})), &v(json!({"foo": null, "bar": "baz"}))));
        assert_eq!(diff.changed, vec![("foo".to_string(), Diff::Value(Value::Null))]);
    }

    #[test]
    fn nested_object_recurses() {
        let diff = object(diff(&v(json!({"foo": {"bar": "baz"}})), &v(json!({"foo": {"baz": "foo"}}))));
        assert_eq!(
            diff.changed,
            vec![(
                "foo".to_string(),
                Diff::Object(ObjectDiff::new(
                    vec![("baz".into(), v(json!("foo")))],
                    Vec::new(),
                    vec!["bar".into()],
                )),
            )]
        );
    }

    #[test]
    fn removed_field() {
        let diff = object(diff(&v(json!({"foo": "bar"})), &v(json!({"bar": "baz"}))));
        assert_eq!(diff.removed, vec!["foo".to_string()]);
    }

    #[test]
    fn reordered_fields_no_diff() {
        let old = doc(json!({"a": 1, "b": 2}));
        let mut new = Document::new();
        new.insert("b", 2);
        new.insert("a", 1);
        assert_eq!(diff_documents(&old, &new), Diff::Empty);
    }

    #[test]
    fn appended_element() {
        let diff = list(diff(&v(json!([1, 2, 3])), &v(json!([1, 2, 3, 4]))));
        assert_eq!(diff.added, vec![(3, v(json!(4)))]);
    }

    #[test]
    fn changed_element() {
        let diff = list(diff(&v(json!([1, 2, 3])), &v(json!([1, 4, 3]))));
        assert_eq!(diff, ListDiff::new(Vec::new(), vec![(1, Diff::Value(v(json!(4))))], Vec::new()));
    }

    #[test]
    fn removed_element_without_renumbering() {
        let diff = list(diff(&v(json!([1, 2, 3])), &without(json!([1, 2, 3]), &[1])));
        assert_eq!(diff, ListDiff::new(Vec::new(), Vec::new(), vec![ListKey::Position(1)]));
    }

    #[test]
    fn renumbered_removal_reads_as_change_and_truncation() {
        let diff = list(diff(&v(json!([1, 2, 3])), &v(json!([1, 3]))));
        assert_eq!(diff.changed, vec![(1, Diff::Value(v(json!(3))))]);
        assert_eq!(diff.removed, vec![ListKey::Position(2)]);
    }

    #[test]
    fn nested_list_in_list() {
        let mut inner = v(json!([1, 2, 3])).as_array().cloned().unwrap();
        inner.remove(2);
        inner.insert(3, 4);
        let mut new = Array::new();
        new.push(inner);

        let diff = list(diff(&v(json!([[1, 2, 3]])), &Value::Array(new)));
        assert_eq!(
            diff.changed,
            vec![(
                0,
                Diff::List(ListDiff::new(vec![(3, v(json!(4)))], Vec::new(), vec![ListKey::Position(2)])),
            )]
        );
    }

    #[test]
    fn sequence_to_keyed_map_replaces() {
        let new = v(json!({"foo": "bar"}));
        assert_eq!(diff(&v(json!([1, 2, 3])), &new), Diff::Value(new));
    }

    #[test]
    fn keyed_map_to_sequence_replaces() {
        let new = v(json!([1, 2, 3]));
        assert_eq!(diff(&v(json!({"foo": "bar"})), &new), Diff::Value(new));
    }

    #[test]
    fn reordered_keys_replace() {
        let new = Value::Array(Array::from_entries([
            (0, v(json!(1))),
            (2, v(json!(3))),
            (1, v(json!(2))),
        ]));
        assert_eq!(diff(&v(json!([1, 2, 3])), &new), Diff::Value(new));
    }

    #[test]
    fn empty_document_to_empty_array_replaces() {
        let new = v(json!([]));
        assert_eq!(diff(&v(json!({})), &new), Diff::Value(new));
    }

    #[test]
    fn documents_with_index_like_fields_stay_keyed() {
        let diff = object(diff(&v(json!({"0": "a", "1": "b"})), &v(json!({"0": "a", "1": "c"}))));
        assert_eq!(diff.changed, vec![("1".to_string(), Diff::Value(v(json!("c"))))]);
    }

    #[test]
    fn non_packed_arrays_diff_by_stringified_index() {
        let old = Value::Array(Array::from_entries([(1, v(json!("a"))), (0, v(json!("b")))]));
        let new = Value::Array(Array::from_entries([(1, v(json!("z"))), (0, v(json!("b")))]));
        let diff = object(diff(&old, &new));
        assert_eq!(diff.changed, vec![("1".to_string(), Diff::Value(v(json!("z"))))]);
    }

    #[test]
    fn embedded_documents_use_identity() {
        let old = v(json!([{"_id": 1}, {"_id": 2}, {"_id": 3}]));
        let mut new = old.as_array().cloned().unwrap();
        new.remove(1);
        if let Some(Value::Document(third)) = new.get_mut(2) {
            third.insert("foo", "bar");
        }
        new.push(v(json!({"_id": 4})));

        let diff = list(diff(&old, &Value::Array(new)));
        assert_eq!(diff.added, vec![(3, v(json!({"_id": 4})))]);
        assert_eq!(
            diff.changed,
            vec![(
                2,
                Diff::Conditional(ConditionalDiff::new(
                    v(json!(3)),
                    Diff::Object(ObjectDiff::new(vec![("foo".into(), v(json!("bar")))], Vec::new(), Vec::new())),
                )),
            )]
        );
        assert_eq!(diff.removed, vec![ListKey::Conditional(ConditionalDiff::removal(v(json!(2))))]);
    }

    #[test]
    fn elements_without_identity_stay_positional() {
        let old = v(json!([{"_id": null, "a": 1}, {"a": 2}, 3]));
        let new = v(json!([{"_id": null, "a": 5}, {"a": 6}, 4]));
        let diff = list(diff(&old, &new));
        assert!(diff.changed.iter().all(|(_, d)| !matches!(d, Diff::Conditional(_))));
        assert_eq!(diff.changed.len(), 3);
    }

    #[test]
    fn custom_identity_field() {
        let differ = Differ::new(DiffConfig::with_identity_field("uuid"));
        let old = v(json!([{"uuid": "a", "n": 1}, {"_id": 7, "n": 2}]));
        let new = v(json!([{"uuid": "a", "n": 10}, {"_id": 7, "n": 20}]));
        let diff = list(differ.diff(&old, &new));
        assert!(matches!(&diff.changed[0].1, Diff::Conditional(c) if c.identifier == v(json!("a"))));
        assert!(matches!(&diff.changed[1].1, Diff::Object(_)));
    }

    #[test]
    fn document_identity_values() {
        let old = v(json!([{"_id": {"a": 1}, "n": 1}]));
        let new = v(json!([]));
        let diff = list(diff(&old, &new));
        assert_eq!(
            diff.removed,
            vec![ListKey::Conditional(ConditionalDiff::removal(v(json!({"a": 1}))))]
        );
    }

    #[test]
    fn dotted_identity_field_follows_nested_documents() {
        let differ = Differ::new(DiffConfig::with_identity_field("meta.id"));
        let old = v(json!([
            {"meta": {"id": "a"}, "n": 1},
            {"meta.id": "literal", "n": 2},
            {"meta": [{"id": "x"}], "n": 3}
        ]));
        let new = v(json!([
            {"meta": {"id": "a"}, "n": 10},
            {"meta.id": "literal", "n": 20},
            {"meta": [{"id": "x"}], "n": 30}
        ]));
        let diff = list(differ.diff(&old, &new));
        assert!(matches!(&diff.changed[0].1, Diff::Conditional(c) if c.identifier == v(json!("a"))));
        assert!(matches!(&diff.changed[1].1, Diff::Object(_)));
        assert!(matches!(&diff.changed[2].1, Diff::Object(_)));
    }

    #[test]
    fn large_sequence_append() {
        let old: Value = (0..50_000i64).map(Value::from).collect::<Array>().into();
        let new: Value = (0..100_000i64).map(Value::from).collect::<Array>().into();
        let diff = list(diff(&old, &new));
        assert_eq!(diff.added.len(), 50_000);
        assert_eq!(diff.added[0], (50_000, Value::Int(50_000)));
        assert!(diff.changed.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn large_sequence_with_scattered_changes() {
        let old: Array = (0..60_000i64).map(Value::from).collect();
        let mut new = old.clone();
        for key in (0..60_000).step_by(1_000) {
            new.remove(key);
        }
        for key in (500..60_000).step_by(1_000) {
            new.insert(key, -1i64);
        }
        let diff = list(diff(&Value::Array(old), &Value::Array(new)));
        assert_eq!(diff.removals(), 60);
        assert_eq!(diff.modifications(), 60);
        assert!(diff.added.is_empty());
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-5i64..5).prop_map(Value::Int),
            "[a-c]{0,2}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                proptest::collection::vec(("[a-d]", inner), 0..4)
                    .prop_map(|fields| Value::Document(fields.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn diff_with_itself_is_empty(value in arb_value()) {
            prop_assert_eq!(diff(&value, &value.clone()), Diff::Empty);
        }

        #[test]
        fn shape_change_always_replaces(items in proptest::collection::vec(arb_value(), 0..4), key in "[a-d]") {
            let sequence = Value::from(items);
            let mut keyed = Document::new();
            keyed.insert(key, 1);
            let keyed = Value::Document(keyed);
            prop_assert_eq!(diff(&sequence, &keyed), Diff::Value(keyed.clone()));
            prop_assert_eq!(diff(&keyed, &sequence), Diff::Value(sequence.clone()));
        }
    }
}
