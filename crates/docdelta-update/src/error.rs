//! Error types for the update compiler.

use thiserror::Error;

/// Errors raised while compiling a diff into an update.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    /// A changed sequence entry was wrapped in a conditional diff that
    /// carries no inner diff. The diff tree is malformed.
    #[error("conditional diff at `{path}` has no inner diff")]
    MissingConditionalDiff { path: String },

    /// A conditional diff appeared somewhere other than a sequence entry.
    #[error("conditional diff at `{path}` is not a sequence entry")]
    ConditionalOutsideList { path: String },

    /// The operator form cannot express this sequence change.
    #[error("sequence change at `{path}` requires a pipeline update")]
    ListRequiresPipeline { path: String },
}

/// Convenience alias for compiler results.
pub type CompileResult<T> = Result<T, CompileError>;
