//! Expression tree and builders.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use docdelta_types::Value;

/// An aggregation expression.
///
/// Variants map one-to-one onto store operators. Build them with the
/// associated functions rather than by hand; every builder takes explicit
/// operands and boxes them as needed.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// `{"$literal": v}`: a value the store must not interpret.
    Literal(Value),
    /// A value embedded as-is. Only safe for scalars.
    Constant(Value),
    /// `"$a.b"`: a field of the document being updated.
    FieldPath(String),
    /// `"$$this.v"`: a variable, optionally followed by a sub-path.
    Variable(String),
    /// An expression object: each field is evaluated.
    Object(Vec<(String, Expr)>),
    /// An array of expressions.
    Array(Vec<Expr>),
    MergeObjects(Vec<Expr>),
    /// Evaluate `body` for each element of `input`, bound to `$$this`.
    Map { input: Box<Expr>, body: Box<Expr> },
    /// Keep the elements of `input` for which `cond` is truthy.
    Filter { input: Box<Expr>, cond: Box<Expr> },
    /// The `then` of the first truthy branch, or `default`.
    Switch { branches: Vec<Case>, default: Box<Expr> },
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    And(Vec<Expr>),
    ConcatArrays(Vec<Expr>),
    Range { start: Box<Expr>, end: Box<Expr>, step: Box<Expr> },
    Size(Box<Expr>),
    /// Transpose arrays, truncating to the shortest input.
    Zip(Vec<Expr>),
    SortArray { input: Box<Expr>, sort_by: Vec<(String, i32)> },
    ToString(Box<Expr>),
    ToInt(Box<Expr>),
    /// Document to an array of `{k, v}` pairs.
    ObjectToArray(Box<Expr>),
    /// Array of `{k, v}` pairs back to a document.
    ArrayToObject(Box<Expr>),
}

/// A branch of [`Expr::Switch`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Case {
    pub case: Expr,
    pub then: Expr,
}

impl Case {
    pub fn new(case: Expr, then: Expr) -> Self {
        Self { case, then }
    }
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    pub fn field_path(path: impl Into<String>) -> Self {
        Self::FieldPath(path.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// `$$this`, the element bound by `$map` and `$filter`.
    pub fn this() -> Self {
        Self::variable("this")
    }

    /// `$$REMOVE`: a field set to this is dropped.
    pub fn remove() -> Self {
        Self::variable("REMOVE")
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Self::Object(fields.into_iter().map(|(k, e)| (k.into(), e)).collect())
    }

    pub fn array(items: impl IntoIterator<Item = Expr>) -> Self {
        Self::Array(items.into_iter().collect())
    }

    pub fn merge_objects(operands: impl IntoIterator<Item = Expr>) -> Self {
        Self::MergeObjects(operands.into_iter().collect())
    }

    pub fn map(input: Expr, body: Expr) -> Self {
        Self::Map {
            input: Box::new(input),
            body: Box::new(body),
        }
    }

    pub fn filter(input: Expr, cond: Expr) -> Self {
        Self::Filter {
            input: Box::new(input),
            cond: Box::new(cond),
        }
    }

    pub fn switch(branches: Vec<Case>, default: Expr) -> Self {
        Self::Switch {
            branches,
            default: Box::new(default),
        }
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::Eq(Box::new(lhs), Box::new(rhs))
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Self {
        Self::Ne(Box::new(lhs), Box::new(rhs))
    }

    pub fn and(operands: impl IntoIterator<Item = Expr>) -> Self {
        Self::And(operands.into_iter().collect())
    }

    pub fn concat_arrays(operands: impl IntoIterator<Item = Expr>) -> Self {
        Self::ConcatArrays(operands.into_iter().collect())
    }

    pub fn range(start: Expr, end: Expr, step: Expr) -> Self {
        Self::Range {
            start: Box::new(start),
            end: Box::new(end),
            step: Box::new(step),
        }
    }

    pub fn size(input: Expr) -> Self {
        Self::Size(Box::new(input))
    }

    pub fn zip(inputs: impl IntoIterator<Item = Expr>) -> Self {
        Self::Zip(inputs.into_iter().collect())
    }

    pub fn sort_array(input: Expr, sort_by: Vec<(String, i32)>) -> Self {
        Self::SortArray {
            input: Box::new(input),
            sort_by,
        }
    }

    pub fn convert_to_string(input: Expr) -> Self {
        Self::ToString(Box::new(input))
    }

    pub fn convert_to_int(input: Expr) -> Self {
        Self::ToInt(Box::new(input))
    }

    pub fn object_to_array(input: Expr) -> Self {
        Self::ObjectToArray(Box::new(input))
    }

    pub fn array_to_object(input: Expr) -> Self {
        Self::ArrayToObject(Box::new(input))
    }

    /// Render in aggregation syntax.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Self::Constant(Value::Int(n))
    }
}

impl From<usize> for Expr {
    fn from(n: usize) -> Self {
        Self::Constant(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MapArgs<'a> {
    input: &'a Expr,
    #[serde(rename = "in")]
    body: &'a Expr,
}

#[derive(Serialize)]
struct FilterArgs<'a> {
    input: &'a Expr,
    cond: &'a Expr,
}

#[derive(Serialize)]
struct SwitchArgs<'a> {
    branches: &'a [Case],
    default: &'a Expr,
}

#[derive(Serialize)]
struct ZipArgs<'a> {
    inputs: &'a [Expr],
}

#[derive(Serialize)]
struct SortArrayArgs<'a> {
    input: &'a Expr,
    #[serde(rename = "sortBy")]
    sort_by: SortBy<'a>,
}

struct SortBy<'a>(&'a [(String, i32)]);

impl Serialize for SortBy<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, dir)| (k, dir)))
    }
}

/// `{ operator: argument }`.
fn operator<S, T>(serializer: S, name: &str, argument: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(name, argument)?;
    map.end()
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(value) => operator(serializer, "$literal", value),
            Self::Constant(value) => value.serialize(serializer),
            Self::FieldPath(path) => serializer.serialize_str(&format!("${path}")),
            Self::Variable(name) => serializer.serialize_str(&format!("$${name}")),
            Self::Object(fields) => serializer.collect_map(fields.iter().map(|(k, e)| (k, e))),
            Self::Array(items) => serializer.collect_seq(items),
            Self::MergeObjects(operands) => match operands.as_slice() {
                [single] => operator(serializer, "$mergeObjects", single),
                _ => operator(serializer, "$mergeObjects", operands),
            },
            Self::Map { input, body } => operator(
                serializer,
                "$map",
                &MapArgs {
                    input,
                    body,
                },
            ),
            Self::Filter { input, cond } => {
                operator(serializer, "$filter", &FilterArgs { input, cond })
            }
            Self::Switch { branches, default } => operator(
                serializer,
                "$switch",
                &SwitchArgs {
                    branches,
                    default,
                },
            ),
            Self::Eq(lhs, rhs) => operator(serializer, "$eq", &[lhs, rhs]),
            Self::Ne(lhs, rhs) => operator(serializer, "$ne", &[lhs, rhs]),
            Self::And(operands) => operator(serializer, "$and", operands),
            Self::ConcatArrays(operands) => operator(serializer, "$concatArrays", operands),
            Self::Range { start, end, step } => {
                operator(serializer, "$range", &[start, end, step])
            }
            Self::Size(input) => operator(serializer, "$size", input),
            Self::Zip(inputs) => operator(serializer, "$zip", &ZipArgs { inputs }),
            Self::SortArray { input, sort_by } => operator(
                serializer,
                "$sortArray",
                &SortArrayArgs {
                    input,
                    sort_by: SortBy(sort_by),
                },
            ),
            Self::ToString(input) => operator(serializer, "$toString", input),
            Self::ToInt(input) => operator(serializer, "$toInt", input),
            Self::ObjectToArray(input) => operator(serializer, "$objectToArray", input),
            Self::ArrayToObject(input) => operator(serializer, "$arrayToObject", input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn references() {
        assert_eq!(Expr::field_path("nested.list").to_json(), json!("$nested.list"));
        assert_eq!(Expr::variable("this.v._id").to_json(), json!("$$this.v._id"));
        assert_eq!(Expr::remove().to_json(), json!("$$REMOVE"));
    }

    #[test]
    fn literal_protects_dollar_strings() {
        assert_eq!(Expr::literal("$notAField").to_json(), json!({"$literal": "$notAField"}));
        assert_eq!(Expr::from(3i64).to_json(), json!(3));
    }

    #[test]
    fn map_filter_switch() {
        let expr = Expr::map(
            Expr::filter(
                Expr::field_path("list"),
                Expr::and([Expr::ne(Expr::variable("this.k"), Expr::from(1i64))]),
            ),
            Expr::switch(
                vec![Case::new(
                    Expr::eq(Expr::variable("this.k"), Expr::from(0i64)),
                    Expr::merge_objects([Expr::this(), Expr::object([("v", Expr::literal(0))])]),
                )],
                Expr::this(),
            ),
        );
        assert_eq!(
            expr.to_json(),
            json!({"$map": {
                "input": {"$filter": {
                    "input": "$list",
                    "cond": {"$and": [{"$ne": ["$$this.k", 1]}]}
                }},
                "in": {"$switch": {
                    "branches": [{
                        "case": {"$eq": ["$$this.k", 0]},
                        "then": {"$mergeObjects": ["$$this", {"v": {"$literal": 0}}]}
                    }],
                    "default": "$$this"
                }}
            }})
        );
    }

    #[test]
    fn single_operand_merge_is_not_wrapped() {
        assert_eq!(Expr::merge_objects([Expr::this()]).to_json(), json!({"$mergeObjects": "$$this"}));
    }

    #[test]
    fn array_helpers() {
        let list = Expr::field_path("list");
        let expr = Expr::zip([
            Expr::range(Expr::from(0i64), Expr::size(list.clone()), Expr::from(1i64)),
            list.clone(),
        ]);
        assert_eq!(
            expr.to_json(),
            json!({"$zip": {"inputs": [{"$range": [0, {"$size": "$list"}, 1]}, "$list"]}})
        );
        assert_eq!(
            Expr::sort_array(list, vec![("k".into(), 1)]).to_json(),
            json!({"$sortArray": {"input": "$list", "sortBy": {"k": 1}}})
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(
            Expr::array_to_object(Expr::object_to_array(Expr::convert_to_string(Expr::convert_to_int(Expr::this())))).to_json(),
            json!({"$arrayToObject": {"$objectToArray": {"$toString": {"$toInt": "$$this"}}}})
        );
    }
}
