//! Operator-style updates.
//!
//! Classic `$set` / `$unset` / `$push` updates address fields by dotted
//! path. They cannot match sequence elements by identity, and the store
//! refuses an update that touches a path and one of its prefixes at once,
//! so only a subset of sequence changes is expressible. Everything else
//! reports [`CompileError::ListRequiresPipeline`].

use tracing::debug;

use docdelta_diff::{Diff, ListDiff, ObjectDiff};
use docdelta_expr::OperatorUpdate;

use crate::error::{CompileError, CompileResult};
use crate::generator::UpdateGenerator;

impl UpdateGenerator {
    /// Compile a top-level document diff into an operator update.
    pub fn generate_operator_update(&self, diff: &ObjectDiff) -> CompileResult<OperatorUpdate> {
        let mut update = OperatorUpdate::default();
        collect_object(&mut update, None, diff)?;
        debug!(
            set = update.set.len(),
            unset = update.unset.len(),
            push = update.push.len(),
            "compiled operator update"
        );
        Ok(update)
    }
}

fn dotted(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{key}"),
        None => key.to_string(),
    }
}

fn collect_object(
    update: &mut OperatorUpdate,
    prefix: Option<&str>,
    diff: &ObjectDiff,
) -> CompileResult<()> {
    for (key, value) in &diff.added {
        update.set.push((dotted(prefix, key), value.compacted()));
    }
    for key in &diff.removed {
        update.unset.push(dotted(prefix, key));
    }
    for (key, change) in &diff.changed {
        collect_change(update, &dotted(prefix, key), change)?;
    }
    Ok(())
}

fn collect_change(update: &mut OperatorUpdate, path: &str, diff: &Diff) -> CompileResult<()> {
    match diff {
        Diff::Empty => Ok(()),
        Diff::Value(value) => {
            update.set.push((path.to_string(), value.compacted()));
            Ok(())
        }
        Diff::Object(object) => collect_object(update, Some(path), object),
        Diff::List(list) => collect_list(update, path, list),
        Diff::Conditional(_) => Err(CompileError::ConditionalOutsideList {
            path: path.to_string(),
        }),
    }
}

fn collect_list(update: &mut OperatorUpdate, path: &str, diff: &ListDiff) -> CompileResult<()> {
    let by_identity = diff
        .changed
        .iter()
        .any(|(_, change)| matches!(change, Diff::Conditional(_)));
    let mixed = !diff.changed.is_empty() && !diff.added.is_empty();
    if by_identity || mixed || !diff.removed.is_empty() {
        return Err(CompileError::ListRequiresPipeline {
            path: path.to_string(),
        });
    }

    if !diff.added.is_empty() {
        let values = diff.added.iter().map(|(_, value)| value.compacted()).collect();
        update.push.push((path.to_string(), values));
    }
    for (position, change) in &diff.changed {
        collect_change(update, &format!("{path}.{position}"), change)?;
    }
    Ok(())
}
