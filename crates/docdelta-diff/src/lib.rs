//! Diff engine for docdelta.
//!
//! Compares an old and a new document snapshot and produces a typed diff
//! tree that mirrors the old document's shape. Sequence elements that carry
//! a stable identity are addressed by that identity instead of their
//! position, so the update compiled from the diff stays correct when the
//! live sequence was reordered or shortened in the meantime.
//!
//! # Key Types
//!
//! - [`Diff`] -- Empty / full replacement / keyed change / sequence change / identity-conditioned change
//! - [`ObjectDiff`] -- Added, changed and removed fields of a keyed map
//! - [`ListDiff`] / [`ListKey`] -- Added, changed and removed elements of a sequence
//! - [`ConditionalDiff`] -- A sequence entry located by identity
//! - [`Differ`] -- The engine itself

pub mod differ;
pub mod model;

pub use differ::{diff, diff_documents, Differ};
pub use model::{ConditionalDiff, Diff, ListDiff, ListKey, ObjectDiff};
