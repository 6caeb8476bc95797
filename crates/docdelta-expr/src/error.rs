//! Error types for the expression evaluator.

use thiserror::Error;

/// Errors raised while evaluating an expression or applying an update.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    /// An operator received an operand of the wrong type.
    #[error("{operator} expected {expected}, found {found}")]
    TypeMismatch {
        operator: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A variable was referenced outside the scope that binds it.
    #[error("unknown variable: $${0}")]
    UnknownVariable(String),

    /// An operand had the right type but an unusable value.
    #[error("invalid argument to {operator}: {reason}")]
    InvalidArgument {
        operator: &'static str,
        reason: String,
    },
}

/// Convenience alias for evaluator results.
pub type EvalResult<T> = Result<T, EvalError>;
