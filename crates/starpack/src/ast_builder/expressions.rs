//! Expression AST node factory functions
//!
//! Every node is created with `TextRange::default()` and
//! `AtomicNodeIndex::dummy()`.

use ruff_python_ast::{
    Arguments, AtomicNodeIndex, Expr, ExprCall, ExprContext, ExprDict, ExprName,
    ExprStringLiteral, ExprSubscript, StringLiteral, StringLiteralFlags, StringLiteralValue,
    name::Name,
};

use super::synthetic_range;

/// Creates a name expression.
///
/// # Arguments
/// * `name` - The identifier
/// * `ctx` - `Load` when read, `Store` when assigned
pub fn name(name: &str, ctx: ExprContext) -> Expr {
    Expr::Name(ExprName {
        id: Name::new(name),
        ctx,
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates a plain double-quoted string literal.
pub fn string_literal(value: &str) -> Expr {
    Expr::StringLiteral(ExprStringLiteral {
        value: StringLiteralValue::single(StringLiteral {
            value: value.into(),
            flags: StringLiteralFlags::empty(),
            range: synthetic_range(),
            node_index: AtomicNodeIndex::dummy(),
        }),
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates an empty dict display: `{}`
pub fn empty_dict() -> Expr {
    Expr::Dict(ExprDict {
        items: vec![],
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates a subscript expression: `value[key]`
///
/// # Example
/// ```ignore
/// // Creates: `registry["geo"]`
/// let expr = subscript(
///     name("registry", ExprContext::Load),
///     string_literal("geo"),
///     ExprContext::Load,
/// );
/// ```
pub fn subscript(value: Expr, key: Expr, ctx: ExprContext) -> Expr {
    Expr::Subscript(ExprSubscript {
        value: Box::new(value),
        slice: Box::new(key),
        ctx,
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates a string-keyed lookup on a named mapping: `mapping["key"]`
pub fn string_key(mapping: Expr, key: &str, ctx: ExprContext) -> Expr {
    subscript(mapping, string_literal(key), ctx)
}

/// Creates a call with positional arguments only: `func(args...)`
pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(ExprCall {
        func: Box::new(func),
        arguments: Arguments {
            args: args.into_boxed_slice(),
            keywords: Box::new([]),
            range: synthetic_range(),
            node_index: AtomicNodeIndex::dummy(),
        },
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    })
}
