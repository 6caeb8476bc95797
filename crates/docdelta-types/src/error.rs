use thiserror::Error;

/// Errors produced by value conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("expected a document, found {found}")]
    NotADocument { found: &'static str },
}

/// Convenience alias for type conversion results.
pub type TypeResult<T> = Result<T, TypeError>;
