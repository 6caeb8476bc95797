//! The diff tree.
//!
//! A [`Diff`] is created once per diff engine call, consumed by the update
//! compiler and discarded. Container diffs never hold [`Diff::Empty`]
//! entries in `changed`; the constructors drop them.

use serde::{Serialize, Serializer};

use docdelta_types::Value;

/// The change between two values.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "diff", rename_all = "snake_case")]
pub enum Diff {
    /// No change.
    Empty,
    /// Replace the value wholesale.
    Value(Value),
    /// Change to a keyed map.
    Object(ObjectDiff),
    /// Change to an ordered sequence.
    List(ListDiff),
    /// A sequence entry located by identity rather than position. Only
    /// appears inside a [`ListDiff`].
    Conditional(ConditionalDiff),
}

impl Diff {
    /// Returns `true` if this is [`Diff::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Total number of leaf changes in the tree.
    pub fn change_count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Value(_) => 1,
            Self::Object(diff) => diff.change_count(),
            Self::List(diff) => diff.change_count(),
            Self::Conditional(diff) => diff.diff.as_deref().map_or(1, Diff::change_count),
        }
    }
}

impl From<ObjectDiff> for Diff {
    fn from(diff: ObjectDiff) -> Self {
        Self::Object(diff)
    }
}

impl From<ListDiff> for Diff {
    fn from(diff: ListDiff) -> Self {
        Self::List(diff)
    }
}

impl From<ConditionalDiff> for Diff {
    fn from(diff: ConditionalDiff) -> Self {
        Self::Conditional(diff)
    }
}

// ---------------------------------------------------------------------------
// ObjectDiff
// ---------------------------------------------------------------------------

/// Change to a keyed map.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ObjectDiff {
    /// Fields present only in the new value.
    #[serde(serialize_with = "serialize_pairs")]
    pub added: Vec<(String, Value)>,
    /// Fields present on both sides whose values differ.
    #[serde(serialize_with = "serialize_pairs")]
    pub changed: Vec<(String, Diff)>,
    /// Fields present only in the old value.
    pub removed: Vec<String>,
}

impl ObjectDiff {
    /// Build an object diff, dropping empty entries from `changed`.
    pub fn new(
        added: Vec<(String, Value)>,
        changed: Vec<(String, Diff)>,
        removed: Vec<String>,
    ) -> Self {
        Self {
            added,
            changed: changed.into_iter().filter(|(_, d)| !d.is_empty()).collect(),
            removed,
        }
    }

    /// Returns `true` if nothing was added, changed or removed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// Number of added fields.
    pub fn additions(&self) -> usize {
        self.added.len()
    }

    /// Number of changed fields.
    pub fn modifications(&self) -> usize {
        self.changed.len()
    }

    /// Number of removed fields.
    pub fn removals(&self) -> usize {
        self.removed.len()
    }

    pub fn change_count(&self) -> usize {
        self.added.len()
            + self.removed.len()
            + self.changed.iter().map(|(_, d)| d.change_count()).sum::<usize>()
    }
}

// ---------------------------------------------------------------------------
// ListDiff
// ---------------------------------------------------------------------------

/// Identifies a removed sequence element.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListKey {
    /// Matched by position in the old snapshot.
    Position(usize),
    /// Matched by the element's identity field.
    Conditional(ConditionalDiff),
}

/// Change to an ordered sequence.
///
/// `changed` and `removed` entries are keyed by the element's position in
/// the old snapshot. Entries for elements with an identity are wrapped in
/// [`ConditionalDiff`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ListDiff {
    /// Elements present only in the new value, keyed by their new position.
    #[serde(serialize_with = "serialize_pairs")]
    pub added: Vec<(usize, Value)>,
    /// Elements present on both sides whose values differ.
    #[serde(serialize_with = "serialize_pairs")]
    pub changed: Vec<(usize, Diff)>,
    /// Elements present only in the old value.
    pub removed: Vec<ListKey>,
}

impl ListDiff {
    /// Build a list diff, dropping empty entries from `changed`.
    pub fn new(
        added: Vec<(usize, Value)>,
        changed: Vec<(usize, Diff)>,
        removed: Vec<ListKey>,
    ) -> Self {
        Self {
            added,
            changed: changed.into_iter().filter(|(_, d)| !d.is_empty()).collect(),
            removed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    pub fn additions(&self) -> usize {
        self.added.len()
    }

    pub fn modifications(&self) -> usize {
        self.changed.len()
    }

    pub fn removals(&self) -> usize {
        self.removed.len()
    }

    pub fn change_count(&self) -> usize {
        self.added.len()
            + self.removed.len()
            + self.changed.iter().map(|(_, d)| d.change_count()).sum::<usize>()
    }
}

// ---------------------------------------------------------------------------
// ConditionalDiff
// ---------------------------------------------------------------------------

/// A sequence entry located by the identity value of the old element.
///
/// `diff` is `None` for a pure removal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConditionalDiff {
    pub identifier: Value,
    pub diff: Option<Box<Diff>>,
}

impl ConditionalDiff {
    /// Apply `diff` to the element whose identity equals `identifier`.
    pub fn new(identifier: Value, diff: Diff) -> Self {
        Self {
            identifier,
            diff: Some(Box::new(diff)),
        }
    }

    /// Remove the element whose identity equals `identifier`.
    pub fn removal(identifier: Value) -> Self {
        Self {
            identifier,
            diff: None,
        }
    }

    pub fn is_removal(&self) -> bool {
        self.diff.is_none()
    }
}

fn serialize_pairs<K, V, S>(pairs: &[(K, V)], serializer: S) -> Result<S::Ok, S::Error>
where
    K: Serialize,
    V: Serialize,
    S: Serializer,
{
    serializer.collect_map(pairs.iter().map(|(k, v)| (k, v)))
}
