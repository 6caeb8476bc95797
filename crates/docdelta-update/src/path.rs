//! Field references threaded through compilation.

use std::fmt;

use docdelta_expr::Expr;

/// Where the value being updated lives.
///
/// Top-level fields and their nested fields are addressed by field path.
/// Inside a sequence update the element being rewritten is only reachable
/// through the `$$this` variable, so everything below it is a variable
/// path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldRef {
    /// The document itself.
    Root,
    /// `"$a.b"`.
    Field(String),
    /// `"$$this.v.a"`.
    Variable(String),
}

impl FieldRef {
    /// The value of the tagged sequence element currently bound to `$$this`.
    pub fn element() -> Self {
        Self::Variable("this.v".to_string())
    }

    /// Reference to the field `key` below this one.
    pub fn child(&self, key: &str) -> Self {
        match self {
            Self::Root => Self::Field(key.to_string()),
            Self::Field(path) => Self::Field(format!("{path}.{key}")),
            Self::Variable(path) => Self::Variable(format!("{path}.{key}")),
        }
    }

    pub fn to_expr(&self) -> Expr {
        match self {
            Self::Root => Expr::variable("ROOT"),
            Self::Field(path) => Expr::field_path(path.as_str()),
            Self::Variable(path) => Expr::variable(path.as_str()),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("$$ROOT"),
            Self::Field(path) => f.write_str(path),
            Self::Variable(path) => write!(f, "$${path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn children_extend_the_path() {
        let nested = FieldRef::Root.child("address").child("city");
        assert_eq!(nested, FieldRef::Field("address.city".into()));
        assert_eq!(nested.to_expr().to_json(), json!("$address.city"));
    }

    #[test]
    fn element_paths_stay_variables() {
        let field = FieldRef::element().child("tags");
        assert_eq!(field.to_expr().to_json(), json!("$$this.v.tags"));
        assert_eq!(field.to_string(), "$$this.v.tags");
    }

    #[test]
    fn root_is_the_document() {
        assert_eq!(FieldRef::Root.to_expr().to_json(), json!("$$ROOT"));
    }
}
