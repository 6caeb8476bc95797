//! Update compiler for docdelta.
//!
//! Turns an [`ObjectDiff`](docdelta_diff::ObjectDiff) into an update the
//! document store applies atomically to the live document. The pipeline
//! form rebuilds every changed field in a single `$set` stage and locates
//! sequence elements by identity where the diff recorded one, so it stays
//! correct when another writer reshaped the sequence after the old snapshot
//! was read. The operator form produces a classic dotted-path update for
//! the subset of changes it can express.
//!
//! # Key Types
//!
//! - [`UpdateGenerator`] -- Compiles diffs into pipelines or operator updates
//! - [`FieldRef`] -- Path to the value being rewritten
//! - [`CompileError`] -- Malformed diff trees and inexpressible changes

pub mod error;
pub mod generator;
pub mod list;
pub mod operators;
pub mod path;


pub use error::{CompileError, CompileResult};
pub use generator::UpdateGenerator;
pub use path::FieldRef;

use docdelta_diff::{Diff, Differ};
use docdelta_expr::Pipeline;
use docdelta_types::{DiffConfig, Document};

/// Diff two snapshots and compile the result into a pipeline update.
pub fn update_pipeline(old: &Document, new: &Document, config: &DiffConfig) -> CompileResult<Pipeline> {
    match Differ::new(config.clone()).diff_documents(old, new) {
        Diff::Object(diff) => UpdateGenerator::new(config.clone()).generate_update_pipeline(&diff),
        _ => Ok(Pipeline::new()),
    }
}
