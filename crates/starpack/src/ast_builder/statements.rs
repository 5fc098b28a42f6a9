//! Statement AST node factory functions
//!
//! This module provides factory functions for creating various types of statement AST nodes.
//! All statements are created with `TextRange::default()` and `AtomicNodeIndex::dummy()`
//! to indicate their synthetic nature.

use ruff_python_ast::{
    AtomicNodeIndex, Expr, ExprContext, Identifier, Parameters, Stmt, StmtAssign, StmtExpr,
    StmtFunctionDef, StmtPass,
};

use super::{expressions, synthetic_range};

/// Creates an assignment statement node.
///
/// # Arguments
/// * `target` - The assignment target (left-hand side)
/// * `value` - The assigned value (right-hand side)
///
/// # Example
/// ```ignore
/// // Creates: `exports["PI"] = PI`
/// let target = expressions::string_key(
///     expressions::name("exports", ExprContext::Load),
///     "PI",
///     ExprContext::Store,
/// );
/// let stmt = assign(target, expressions::name("PI", ExprContext::Load));
/// ```
pub fn assign(target: Expr, value: Expr) -> Stmt {
    Stmt::Assign(StmtAssign {
        targets: vec![target],
        value: Box::new(value),
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates a simple assignment statement with a string target.
///
/// This is a convenience wrapper around `assign` for the common case
/// of assigning to a single variable name.
///
/// # Example
/// ```ignore
/// // Creates: `registry = {}`
/// let stmt = simple_assign("registry", expressions::empty_dict());
/// ```
pub fn simple_assign(target: &str, value: Expr) -> Stmt {
    assign(expressions::name(target, ExprContext::Store), value)
}

/// Creates an expression statement node.
pub fn expr(expr: Expr) -> Stmt {
    Stmt::Expr(StmtExpr {
        value: Box::new(expr),
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates a `pass` statement node.
pub fn pass() -> Stmt {
    Stmt::Pass(StmtPass {
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates a function definition that takes no parameters.
///
/// An empty `body` gets a single `pass` so the definition stays valid
/// source when rendered.
///
/// # Example
/// ```ignore
/// // Creates:
/// // def init():
/// //     pass
/// let stmt = function_def("init", vec![]);
/// ```
pub fn function_def(name: &str, body: Vec<Stmt>) -> Stmt {
    let body = if body.is_empty() { vec![pass()] } else { body };
    Stmt::FunctionDef(StmtFunctionDef {
        name: Identifier::new(name, synthetic_range()),
        type_params: None,
        parameters: Box::new(Parameters {
            posonlyargs: vec![],
            args: vec![],
            vararg: None,
            kwonlyargs: vec![],
            kwarg: None,
            range: synthetic_range(),
            node_index: AtomicNodeIndex::dummy(),
        }),
        returns: None,
        body,
        decorator_list: vec![],
        is_async: false,
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_assign_stores_name() {
        let stmt = simple_assign("registry", expressions::empty_dict());
        let Stmt::Assign(assign) = stmt else {
            panic!("expected an assignment");
        };
        assert!(matches!(
            &assign.targets[..],
            [Expr::Name(name)] if name.id.as_str() == "registry" && name.ctx == ExprContext::Store
        ));
        assert!(matches!(assign.value.as_ref(), Expr::Dict(_)));
    }

    #[test]
    fn test_function_def_without_parameters() {
        let stmt = function_def("init", vec![]);
        let Stmt::FunctionDef(def) = stmt else {
            panic!("expected a function definition");
        };
        assert_eq!(def.name.as_str(), "init");
        assert!(def.parameters.args.is_empty());
        assert!(matches!(&def.body[..], [Stmt::Pass(_)]));
    }
}
