//! Aggregation expression toolkit for docdelta.
//!
//! The update compiler is a pure consumer of this crate: it builds [`Expr`]
//! trees out of the primitives below and wraps them in [`Stage`]s. The
//! `Serialize` impls render everything in the document store's aggregation
//! syntax, ready to be handed to a pipeline-update call. The [`eval`]
//! module executes the same trees against in-memory documents.
//!
//! # Key Types
//!
//! - [`Expr`] / [`Case`] -- Expression tree
//! - [`Stage`] / [`Pipeline`] -- Ordered update stages
//! - [`OperatorUpdate`] -- Classic `$set` / `$unset` update document
//! - [`EvalError`] -- Failures raised by the in-memory evaluator

pub mod error;
pub mod eval;
pub mod expr;
pub mod pipeline;

pub use error::{EvalError, EvalResult};
pub use eval::{apply_operators, apply_pipeline, evaluate};
pub use expr::{Case, Expr};
pub use pipeline::{OperatorUpdate, Pipeline, Stage};
