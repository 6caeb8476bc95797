//! Update stages and update documents.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use docdelta_types::Value;

use crate::expr::Expr;

/// A single pipeline update stage.
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    /// `{"$set": {field: expr, ...}}`. Every expression is evaluated against
    /// the stage's input document; a field whose expression yields
    /// `$$REMOVE` is dropped.
    Set(Vec<(String, Expr)>),
}

struct SetStageFields<'a>(&'a [(String, Expr)]);

impl Serialize for SetStageFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, e)| (k, e)))
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(fields) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$set", &SetStageFields(fields))?;
                map.end()
            }
        }
    }
}

/// An ordered list of update stages, executed atomically against one
/// document.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// An empty pipeline means "nothing to update".
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Render in aggregation syntax.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<Vec<Stage>> for Pipeline {
    fn from(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

/// A classic operator update with dotted field paths:
/// `{"$set": {...}, "$unset": {...}, "$push": {path: {"$each": [...]}}}`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperatorUpdate {
    pub set: Vec<(String, Value)>,
    pub unset: Vec<String>,
    /// Values appended to the array at each path.
    pub push: Vec<(String, Vec<Value>)>,
}

impl OperatorUpdate {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.push.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

struct UnsetFields<'a>(&'a [String]);

impl Serialize for UnsetFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|field| (field, "")))
    }
}

struct SetFields<'a>(&'a [(String, Value)]);

impl Serialize for SetFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

#[derive(Serialize)]
struct Each<'a> {
    #[serde(rename = "$each")]
    each: &'a [Value],
}

struct PushFields<'a>(&'a [(String, Vec<Value>)]);

impl Serialize for PushFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, values)| (k, Each { each: values })))
    }
}

impl Serialize for OperatorUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if !self.set.is_empty() {
            map.serialize_entry("$set", &SetFields(&self.set))?;
        }
        if !self.unset.is_empty() {
            map.serialize_entry("$unset", &UnsetFields(&self.unset))?;
        }
        if !self.push.is_empty() {
            map.serialize_entry("$push", &PushFields(&self.push))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_stage_serialization() {
        let pipeline = Pipeline::from(vec![Stage::Set(vec![
            ("foo".into(), Expr::literal("bar")),
            ("baz".into(), Expr::remove()),
        ])]);
        assert_eq!(
            pipeline.to_json(),
            json!([{"$set": {"foo": {"$literal": "bar"}, "baz": "$$REMOVE"}}])
        );
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn empty_pipeline() {
        assert!(Pipeline::new().is_empty());
        assert_eq!(Pipeline::new().to_json(), json!([]));
    }

    #[test]
    fn operator_update_serialization() {
        let update = OperatorUpdate {
            set: vec![("a.b".into(), Value::from(1))],
            unset: vec!["c".into()],
            push: vec![("list".into(), vec![Value::from(2), Value::from("x")])],
        };
        assert_eq!(
            update.to_json(),
            json!({
                "$set": {"a.b": 1},
                "$unset": {"c": ""},
                "$push": {"list": {"$each": [2, "x"]}}
            })
        );
        assert_eq!(OperatorUpdate::default().to_json(), json!({}));
    }
}
