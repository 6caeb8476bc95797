//! Expressions that tag sequence elements with their position and strip
//! the tag again.
//!
//! Inside `$map` and `$filter` only the element value is visible. Pairing
//! every element with its index as `{k: index, v: element}` makes the
//! position addressable for the duration of the update.

use docdelta_expr::Expr;

/// `[e0, e1, ...]` to `[{k: 0, v: e0}, {k: 1, v: e1}, ...]`.
pub fn wrap_with_keys(list: Expr) -> Expr {
    let keys = Expr::map(
        Expr::range(Expr::from(0i64), Expr::size(list.clone()), Expr::from(1i64)),
        Expr::object([("k", Expr::this())]),
    );
    let values = Expr::map(list, Expr::object([("v", Expr::this())]));
    Expr::map(Expr::zip([keys, values]), Expr::merge_objects([Expr::this()]))
}

/// Inverse of [`wrap_with_keys`].
pub fn extract_values(tagged: Expr) -> Expr {
    Expr::map(tagged, Expr::variable("this.v"))
}
