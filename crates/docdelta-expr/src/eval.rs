//! In-memory evaluation of expressions and updates.
//!
//! Follows the store's semantics closely enough to execute compiled
//! updates against a document held in memory: a missing value is distinct
//! from `null`, `$$REMOVE` evaluates to missing, and a `$set` field that
//! evaluates to missing is dropped. Arrays are compacted on the way in,
//! since a stored document never carries gapped sequences.

use std::cmp::Ordering;

use tracing::debug;

use docdelta_types::{Array, Document, Value};

use crate::error::{EvalError, EvalResult};
use crate::expr::Expr;
use crate::pipeline::{OperatorUpdate, Pipeline, Stage};

/// Variable bindings visible to an expression.
struct Scope<'r, 't> {
    root: &'r Document,
    this: Option<&'t Value>,
}

/// Evaluate an expression against a document. `Ok(None)` means the
/// expression yielded a missing value.
pub fn evaluate(expr: &Expr, root: &Document) -> EvalResult<Option<Value>> {
    eval(expr, &Scope { root, this: None })
}

/// Run every stage of `pipeline` against `document` and return the result.
pub fn apply_pipeline(pipeline: &Pipeline, document: &Document) -> EvalResult<Document> {
    debug!(stages = pipeline.len(), "applying update pipeline");
    let mut current = document.compacted();
    for stage in pipeline.stages() {
        current = apply_stage(stage, &current)?;
    }
    Ok(current)
}

/// Apply a `$set` / `$unset` / `$push` update document.
pub fn apply_operators(update: &OperatorUpdate, document: &Document) -> EvalResult<Document> {
    debug!(
        set = update.set.len(),
        unset = update.unset.len(),
        push = update.push.len(),
        "applying operator update"
    );
    let mut output = document.compacted();
    for (path, value) in &update.set {
        set_path(&mut output, path, value.clone())?;
    }
    for path in &update.unset {
        unset_path(&mut output, path);
    }
    for (path, values) in &update.push {
        push_path(&mut output, path, values)?;
    }
    Ok(output)
}

fn apply_stage(stage: &Stage, input: &Document) -> EvalResult<Document> {
    match stage {
        Stage::Set(fields) => {
            // All fields see the stage input, not each other's output.
            let scope = Scope { root: input, this: None };
            let mut output = input.clone();
            for (path, expr) in fields {
                match eval(expr, &scope)? {
                    Some(value) => set_path(&mut output, path, value)?,
                    None => unset_path(&mut output, path),
                }
            }
            Ok(output)
        }
    }
}

fn eval(expr: &Expr, scope: &Scope<'_, '_>) -> EvalResult<Option<Value>> {
    match expr {
        Expr::Literal(value) | Expr::Constant(value) => Ok(Some(value.clone())),
        Expr::FieldPath(path) => Ok(resolve_in_document(scope.root, &segments(path))),
        Expr::Variable(path) => resolve_variable(path, scope),
        Expr::Object(fields) => {
            let mut doc = Document::new();
            for (key, field) in fields {
                if let Some(value) = eval(field, scope)? {
                    doc.insert(key.clone(), value);
                }
            }
            Ok(Some(Value::Document(doc)))
        }
        Expr::Array(items) => {
            let values = items
                .iter()
                .map(|item| -> EvalResult<Value> { Ok(eval(item, scope)?.unwrap_or(Value::Null)) })
                .collect::<EvalResult<Array>>()?;
            Ok(Some(Value::Array(values)))
        }
        Expr::MergeObjects(operands) => merge_objects(operands, scope),
        Expr::Map { input, body } => {
            let Some(items) = array_operand("$map", eval(input, scope)?)? else {
                return Ok(Some(Value::Null));
            };
            let mut mapped = Array::new();
            for item in items.values() {
                let inner = Scope {
                    root: scope.root,
                    this: Some(item),
                };
                mapped.push(eval(body, &inner)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(mapped)))
        }
        Expr::Filter { input, cond } => {
            let Some(items) = array_operand("$filter", eval(input, scope)?)? else {
                return Ok(Some(Value::Null));
            };
            let mut kept = Array::new();
            for item in items.values() {
                let inner = Scope {
                    root: scope.root,
                    this: Some(item),
                };
                if truthy(&eval(cond, &inner)?) {
                    kept.push(item.clone());
                }
            }
            Ok(Some(Value::Array(kept)))
        }
        Expr::Switch { branches, default } => {
            for branch in branches {
                if truthy(&eval(&branch.case, scope)?) {
                    return eval(&branch.then, scope);
                }
            }
            eval(default, scope)
        }
        Expr::Eq(lhs, rhs) => {
            let equal = loose_eq(eval(lhs, scope)?.as_ref(), eval(rhs, scope)?.as_ref());
            Ok(Some(Value::Bool(equal)))
        }
        Expr::Ne(lhs, rhs) => {
            let equal = loose_eq(eval(lhs, scope)?.as_ref(), eval(rhs, scope)?.as_ref());
            Ok(Some(Value::Bool(!equal)))
        }
        Expr::And(operands) => {
            for operand in operands {
                if !truthy(&eval(operand, scope)?) {
                    return Ok(Some(Value::Bool(false)));
                }
            }
            Ok(Some(Value::Bool(true)))
        }
        Expr::ConcatArrays(operands) => {
            let mut joined = Array::new();
            for operand in operands {
                match array_operand("$concatArrays", eval(operand, scope)?)? {
                    Some(items) => items.into_values().for_each(|item| joined.push(item)),
                    None => return Ok(Some(Value::Null)),
                }
            }
            Ok(Some(Value::Array(joined)))
        }
        Expr::Range { start, end, step } => {
            let start = int_operand("$range", eval(start, scope)?)?;
            let end = int_operand("$range", eval(end, scope)?)?;
            let step = int_operand("$range", eval(step, scope)?)?;
            if step == 0 {
                return Err(EvalError::InvalidArgument {
                    operator: "$range",
                    reason: "step must not be zero".to_string(),
                });
            }
            let mut values = Array::new();
            let mut current = start;
            while (step > 0 && current < end) || (step < 0 && current > end) {
                values.push(current);
                current += step;
            }
            Ok(Some(Value::Array(values)))
        }
        Expr::Size(input) => match eval(input, scope)? {
            Some(Value::Array(items)) => Ok(Some(Value::Int(items.len() as i64))),
            other => Err(EvalError::TypeMismatch {
                operator: "$size",
                expected: "array",
                found: type_name(&other),
            }),
        },
        Expr::Zip(inputs) => {
            let mut columns = Vec::with_capacity(inputs.len());
            for input in inputs {
                match array_operand("$zip", eval(input, scope)?)? {
                    Some(items) => columns.push(items.into_values().collect::<Vec<_>>()),
                    None => return Ok(Some(Value::Null)),
                }
            }
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            let zipped = (0..rows)
                .map(|i| {
                    Value::Array(columns.iter().map(|column| column[i].clone()).collect())
                })
                .collect::<Array>();
            Ok(Some(Value::Array(zipped)))
        }
        Expr::SortArray { input, sort_by } => {
            let Some(items) = array_operand("$sortArray", eval(input, scope)?)? else {
                return Ok(Some(Value::Null));
            };
            let mut items: Vec<Value> = items.into_values().collect();
            items.sort_by(|a, b| {
                for (field, direction) in sort_by {
                    let ord = compare_options(sort_key(a, field), sort_key(b, field));
                    let ord = if *direction < 0 { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            Ok(Some(Value::Array(items.into())))
        }
        Expr::ToString(input) => match eval(input, scope)? {
            None | Some(Value::Null) => Ok(Some(Value::Null)),
            Some(Value::Int(n)) => Ok(Some(Value::String(n.to_string()))),
            Some(Value::Double(d)) => Ok(Some(Value::String(d.to_string()))),
            Some(Value::Bool(b)) => Ok(Some(Value::String(b.to_string()))),
            Some(Value::String(s)) => Ok(Some(Value::String(s))),
            Some(other) => Err(EvalError::TypeMismatch {
                operator: "$toString",
                expected: "scalar",
                found: other.type_name(),
            }),
        },
        Expr::ToInt(input) => match eval(input, scope)? {
            None | Some(Value::Null) => Ok(Some(Value::Null)),
            Some(Value::Int(n)) => Ok(Some(Value::Int(n))),
            Some(Value::Double(d)) => Ok(Some(Value::Int(d.trunc() as i64))),
            Some(Value::Bool(b)) => Ok(Some(Value::Int(i64::from(b)))),
            Some(Value::String(s)) => s.trim().parse::<i64>().map(|n| Some(Value::Int(n))).map_err(|e| {
                EvalError::InvalidArgument {
                    operator: "$toInt",
                    reason: format!("{s:?}: {e}"),
                }
            }),
            Some(other) => Err(EvalError::TypeMismatch {
                operator: "$toInt",
                expected: "scalar",
                found: other.type_name(),
            }),
        },
        Expr::ObjectToArray(input) => match eval(input, scope)? {
            None | Some(Value::Null) => Ok(Some(Value::Null)),
            Some(Value::Document(doc)) => {
                let pairs = doc
                    .into_iter()
                    .map(|(k, v)| {
                        let mut pair = Document::new();
                        pair.insert("k", k);
                        pair.insert("v", v);
                        Value::Document(pair)
                    })
                    .collect::<Array>();
                Ok(Some(Value::Array(pairs)))
            }
            Some(other) => Err(EvalError::TypeMismatch {
                operator: "$objectToArray",
                expected: "document",
                found: other.type_name(),
            }),
        },
        Expr::ArrayToObject(input) => {
            let Some(items) = array_operand("$arrayToObject", eval(input, scope)?)? else {
                return Ok(Some(Value::Null));
            };
            let mut doc = Document::new();
            for item in items.into_values() {
                let (key, value) = key_value_pair(item)?;
                doc.insert(key, value);
            }
            Ok(Some(Value::Document(doc)))
        }
    }
}

fn merge_objects(operands: &[Expr], scope: &Scope<'_, '_>) -> EvalResult<Option<Value>> {
    let mut values = Vec::new();
    if let [single] = operands {
        // A single array operand merges its elements.
        match eval(single, scope)? {
            Some(Value::Array(items)) => values.extend(items.into_values().map(Some)),
            other => values.push(other),
        }
    } else {
        for operand in operands {
            values.push(eval(operand, scope)?);
        }
    }

    let mut merged = Document::new();
    for value in values {
        match value {
            None | Some(Value::Null) => {}
            Some(Value::Document(doc)) => {
                for (key, field) in doc {
                    merged.insert(key, field);
                }
            }
            Some(other) => {
                return Err(EvalError::TypeMismatch {
                    operator: "$mergeObjects",
                    expected: "document",
                    found: other.type_name(),
                })
            }
        }
    }
    Ok(Some(Value::Document(merged)))
}

fn key_value_pair(item: Value) -> EvalResult<(String, Value)> {
    let invalid = |found: &'static str| EvalError::TypeMismatch {
        operator: "$arrayToObject",
        expected: "{k, v} document or [k, v] pair",
        found,
    };
    match item {
        Value::Document(doc) => match (doc.get("k"), doc.get("v")) {
            (Some(Value::String(k)), Some(v)) => Ok((k.clone(), v.clone())),
            _ => Err(invalid("document")),
        },
        Value::Array(pair) => {
            let mut values = pair.into_values();
            match (values.next(), values.next(), values.next()) {
                (Some(Value::String(k)), Some(v), None) => Ok((k, v)),
                _ => Err(invalid("array")),
            }
        }
        other => Err(invalid(other.type_name())),
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

fn segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

fn resolve_variable(path: &str, scope: &Scope<'_, '_>) -> EvalResult<Option<Value>> {
    let parts = segments(path);
    let (name, rest) = parts.split_first().map_or(("", &[][..]), |(n, r)| (*n, r));
    match name {
        "REMOVE" => Ok(None),
        "ROOT" | "CURRENT" => Ok(resolve_in_document(scope.root, rest)),
        "this" => match scope.this {
            Some(value) => Ok(resolve(value, rest)),
            None => Err(EvalError::UnknownVariable(name.to_string())),
        },
        other => Err(EvalError::UnknownVariable(other.to_string())),
    }
}

fn resolve_in_document(doc: &Document, segments: &[&str]) -> Option<Value> {
    match segments.split_first() {
        None => Some(Value::Document(doc.clone())),
        Some((first, rest)) => resolve(doc.get(first)?, rest),
    }
}

/// Walk a dotted path. Arrays are traversed element-wise, collecting the
/// sub-path of every element that has it.
fn resolve(value: &Value, segments: &[&str]) -> Option<Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Document(doc) => resolve(doc.get(first)?, rest),
        Value::Array(items) => Some(Value::Array(
            items
                .values()
                .filter(|item| matches!(item, Value::Document(_) | Value::Array(_)))
                .filter_map(|item| resolve(item, segments))
                .collect(),
        )),
        _ => None,
    }
}

fn sort_key<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    value.as_document()?.get(field)
}

// ---------------------------------------------------------------------------
// Operand helpers
// ---------------------------------------------------------------------------

fn type_name(value: &Option<Value>) -> &'static str {
    value.as_ref().map_or("missing", Value::type_name)
}

/// `Ok(None)` for null or missing operands, which most array operators
/// propagate as a null result.
fn array_operand(operator: &'static str, value: Option<Value>) -> EvalResult<Option<Array>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(EvalError::TypeMismatch {
            operator,
            expected: "array",
            found: other.type_name(),
        }),
    }
}

fn int_operand(operator: &'static str, value: Option<Value>) -> EvalResult<i64> {
    match value {
        Some(Value::Int(n)) => Ok(n),
        Some(Value::Double(d)) if d.fract() == 0.0 => Ok(d as i64),
        other => Err(EvalError::TypeMismatch {
            operator,
            expected: "integer",
            found: type_name(&other),
        }),
    }
}

fn truthy(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Int(n)) => *n != 0,
        Some(Value::Double(d)) => *d != 0.0,
        Some(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

fn loose_eq(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    compare_options(lhs, rhs) == Ordering::Equal
}

/// Missing sorts before everything else, including `null`.
fn compare_options(lhs: Option<&Value>, rhs: Option<&Value>) -> Ordering {
    match (lhs, rhs) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Int(_) | Value::Double(_) => 1,
        Value::String(_) => 2,
        Value::Document(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Cross-type ordering: numbers compare by value regardless of their
/// representation.
fn compare_values(lhs: &Value, rhs: &Value) -> Ordering {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Int(a), Value::Double(b)) => (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Double(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Document(a), Value::Document(b)) => {
            for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                let ord = ka.cmp(kb).then_with(|| compare_values(va, vb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Array(a), Value::Array(b)) => {
            for (va, vb) in a.values().zip(b.values()) {
                let ord = compare_values(va, vb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => type_rank(lhs).cmp(&type_rank(rhs)),
    }
}

// ---------------------------------------------------------------------------
// Dotted-path writes
// ---------------------------------------------------------------------------

fn set_path(doc: &mut Document, path: &str, value: Value) -> EvalResult<()> {
    set_in_document(doc, &segments(path), value)
}

fn set_in_document(doc: &mut Document, segments: &[&str], value: Value) -> EvalResult<()> {
    let Some((first, rest)) = segments.split_first() else {
        return Err(EvalError::InvalidArgument {
            operator: "$set",
            reason: "empty field path".to_string(),
        });
    };
    if rest.is_empty() {
        doc.insert(*first, value);
        return Ok(());
    }
    if !doc.contains_key(first) {
        doc.insert(*first, Document::new());
    }
    match doc.get_mut(first) {
        Some(child) => set_in_value(child, rest, value),
        None => Ok(()),
    }
}

fn set_in_value(target: &mut Value, segments: &[&str], value: Value) -> EvalResult<()> {
    match target {
        Value::Document(doc) => set_in_document(doc, segments, value),
        Value::Array(items) => {
            let Some((first, rest)) = segments.split_first() else {
                return Err(EvalError::InvalidArgument {
                    operator: "$set",
                    reason: "empty field path".to_string(),
                });
            };
            let index: usize = first.parse().map_err(|_| EvalError::InvalidArgument {
                operator: "$set",
                reason: format!("cannot address array element {first:?}"),
            })?;
            // Writing past the end pads with nulls.
            while items.len() < index {
                items.push(Value::Null);
            }
            if rest.is_empty() {
                items.insert(index, value);
                return Ok(());
            }
            if !items.contains_key(index) {
                items.insert(index, Document::new());
            }
            match items.get_mut(index) {
                Some(child) => set_in_value(child, rest, value),
                None => Ok(()),
            }
        }
        other => Err(EvalError::TypeMismatch {
            operator: "$set",
            expected: "document or array",
            found: other.type_name(),
        }),
    }
}

/// Append to the array at `path`, creating it when the field is missing.
fn push_path(doc: &mut Document, path: &str, values: &[Value]) -> EvalResult<()> {
    match value_at_mut(doc, &segments(path)) {
        None => set_path(doc, path, Value::Array(values.iter().cloned().collect())),
        Some(Value::Array(items)) => {
            values.iter().for_each(|value| items.push(value.clone()));
            Ok(())
        }
        Some(other) => Err(EvalError::TypeMismatch {
            operator: "$push",
            expected: "array",
            found: other.type_name(),
        }),
    }
}

fn value_at_mut<'a>(doc: &'a mut Document, segments: &[&str]) -> Option<&'a mut Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = doc.get_mut(first)?;
    for segment in rest {
        current = match current {
            Value::Document(inner) => inner.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn unset_path(doc: &mut Document, path: &str) {
    unset_in_document(doc, &segments(path));
}

fn unset_in_document(doc: &mut Document, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        doc.remove(first);
    } else if let Some(child) = doc.get_mut(first) {
        unset_in_value(child, rest);
    }
}

fn unset_in_value(target: &mut Value, segments: &[&str]) {
    match target {
        Value::Document(doc) => unset_in_document(doc, segments),
        Value::Array(items) => {
            let Some((first, rest)) = segments.split_first() else {
                return;
            };
            let Ok(index) = first.parse::<usize>() else {
                return;
            };
            // Unsetting an array element leaves a null in its place.
            match items.get_mut(index) {
                Some(slot) if rest.is_empty() => *slot = Value::Null,
                Some(child) => unset_in_value(child, rest),
                None => {}
            }
        }
        _ => {}
    }
}
