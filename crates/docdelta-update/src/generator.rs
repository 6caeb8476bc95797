//! Pipeline update compiler.
//!
//! Walks an [`ObjectDiff`] and emits a single `$set` stage whose fields
//! rebuild every changed top-level field in one expression tree. Nested
//! keyed maps become `$mergeObjects` over the original value. Sequences are
//! tagged with positions, rewritten in a `$switch`, filtered, stripped and
//! appended to.

use tracing::debug;

use docdelta_diff::{ConditionalDiff, Diff, ListDiff, ListKey, ObjectDiff};
use docdelta_expr::{Case, Expr, Pipeline, Stage};
use docdelta_types::{DiffConfig, Value};

use crate::error::{CompileError, CompileResult};
use crate::list;
use crate::path::FieldRef;

/// Compiles diffs into pipeline updates.
#[derive(Clone, Debug, Default)]
pub struct UpdateGenerator {
    config: DiffConfig,
}

impl UpdateGenerator {
    /// The identity field in `config` must be the one the diff was computed
    /// with.
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// Compile a top-level document diff. An empty diff compiles to an
    /// empty pipeline.
    pub fn generate_update_pipeline(&self, diff: &ObjectDiff) -> CompileResult<Pipeline> {
        if diff.is_empty() {
            return Ok(Pipeline::new());
        }

        let mut fields = Vec::with_capacity(diff.change_count());
        fields.extend(
            diff.added
                .iter()
                .map(|(key, value)| (key.clone(), literal(value))),
        );
        fields.extend(diff.removed.iter().map(|key| (key.clone(), Expr::remove())));
        for (key, change) in &diff.changed {
            let expr = self.field_expression(&FieldRef::Root.child(key), change)?;
            fields.push((key.clone(), expr));
        }

        debug!(fields = fields.len(), "compiled update pipeline");
        Ok(Pipeline::from(vec![Stage::Set(fields)]))
    }

    /// The expression that yields the new value of the field at `path`.
    pub fn field_expression(&self, path: &FieldRef, diff: &Diff) -> CompileResult<Expr> {
        match diff {
            Diff::Empty => Ok(path.to_expr()),
            Diff::Value(value) => Ok(literal(value)),
            Diff::Object(object) => self.object_update(path, object),
            Diff::List(list) => self.list_update(path, list),
            Diff::Conditional(_) => Err(CompileError::ConditionalOutsideList {
                path: path.to_string(),
            }),
        }
    }

    /// Merge the added and changed fields into the original value, then
    /// drop removed fields.
    fn object_update(&self, path: &FieldRef, diff: &ObjectDiff) -> CompileResult<Expr> {
        let mut fields = Vec::with_capacity(diff.added.len() + diff.changed.len());
        fields.extend(
            diff.added
                .iter()
                .map(|(key, value)| (key.clone(), literal(value))),
        );
        for (key, change) in &diff.changed {
            fields.push((key.clone(), self.field_expression(&path.child(key), change)?));
        }

        let merged = Expr::merge_objects([path.to_expr(), Expr::object(fields)]);
        if diff.removed.is_empty() {
            return Ok(merged);
        }

        // `$$REMOVE` inside `$mergeObjects` leaves the original field in
        // place, so removed fields are filtered out of the merged document.
        let keep = diff
            .removed
            .iter()
            .map(|key| Expr::ne(Expr::variable("this.k"), Expr::literal(key.as_str())));
        Ok(Expr::array_to_object(Expr::filter(
            Expr::object_to_array(merged),
            Expr::and(keep),
        )))
    }

    /// Rewrite the sequence at `path`:
    ///
    /// 1. tag every element with its position (`{k, v}`),
    /// 2. rewrite changed elements in a `$switch`, matching by position or
    ///    by identity,
    /// 3. filter out removed elements, matched the same way,
    /// 4. strip the tags,
    /// 5. append added elements.
    ///
    /// Steps 1 to 4 are skipped when nothing but appends changed.
    fn list_update(&self, path: &FieldRef, diff: &ListDiff) -> CompileResult<Expr> {
        let appended: Vec<Expr> = diff.added.iter().map(|(_, value)| literal(value)).collect();

        if diff.changed.is_empty() && diff.removed.is_empty() {
            return Ok(append(path.to_expr(), appended));
        }

        let mut tagged = list::wrap_with_keys(path.to_expr());

        if !diff.changed.is_empty() {
            let branches = diff
                .changed
                .iter()
                .map(|(position, change)| self.element_branch(path, *position, change))
                .collect::<CompileResult<Vec<_>>>()?;
            tagged = Expr::map(tagged, Expr::switch(branches, Expr::this()));
        }

        if !diff.removed.is_empty() {
            let keep = diff.removed.iter().map(|key| match key {
                ListKey::Position(position) => {
                    Expr::ne(Expr::variable("this.k"), Expr::from(*position))
                }
                ListKey::Conditional(conditional) => {
                    Expr::ne(self.identity_ref(), Expr::literal(conditional.identifier.clone()))
                }
            });
            tagged = Expr::filter(tagged, Expr::and(keep));
        }

        Ok(append(list::extract_values(tagged), appended))
    }

    fn element_branch(&self, path: &FieldRef, position: usize, change: &Diff) -> CompileResult<Case> {
        let (condition, inner) = match change {
            Diff::Conditional(ConditionalDiff { identifier, diff }) => {
                let inner = diff.as_deref().ok_or_else(|| CompileError::MissingConditionalDiff {
                    path: format!("{path}.{position}"),
                })?;
                (Expr::eq(self.identity_ref(), Expr::literal(identifier.clone())), inner)
            }
            other => (Expr::eq(Expr::variable("this.k"), Expr::from(position)), other),
        };

        let value = self.field_expression(&FieldRef::element(), inner)?;
        Ok(Case::new(
            condition,
            Expr::merge_objects([Expr::this(), Expr::object([("v", value)])]),
        ))
    }

    /// The identity field of the tagged element bound to `$$this`.
    fn identity_ref(&self) -> Expr {
        FieldRef::element().child(&self.config.identity_field).to_expr()
    }
}

/// Literal-wrap a value as the store will hold it.
fn literal(value: &Value) -> Expr {
    Expr::literal(value.compacted())
}

fn append(list: Expr, appended: Vec<Expr>) -> Expr {
    if appended.is_empty() {
        list
    } else {
        Expr::concat_arrays([list, Expr::array(appended)])
    }
}
