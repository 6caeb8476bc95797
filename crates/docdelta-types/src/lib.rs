//! Foundation types for docdelta.
//!
//! This crate provides the in-memory document model that both sides of a
//! diff are expressed in, the shape classification the diff engine
//! dispatches on, and the configuration shared by the diff engine and the
//! update compiler.
//!
//! # Key Types
//!
//! - [`Value`] -- A document value: scalar, [`Document`] or [`Array`]
//! - [`Document`] -- Insertion-ordered keyed map, always diffed by field name
//! - [`Array`] -- Integer-keyed sequence that may carry gaps after removals
//! - [`Shape`] -- Classification of a value for the old or the new side
//! - [`DiffConfig`] -- Identity field used to locate sequence elements

pub mod config;
pub mod error;
pub mod shape;
pub mod value;

pub use config::DiffConfig;
pub use error::{TypeError, TypeResult};
pub use shape::Shape;
pub use value::{Array, Document, Value};
