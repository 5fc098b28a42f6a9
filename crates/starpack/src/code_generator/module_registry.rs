//! Module registry management for code bundling
//!
//! This module handles:
//! - The well-known identifiers shared by every bundle
//! - Registry initialization and per-module registration
//! - Export assignments and cross-module lookups against the registry

use ruff_python_ast::{ExprContext, Stmt};

use crate::ast_builder::{expressions, statements};

/// Global holding `module name -> export table` inside a bundle
pub const REGISTRY: &str = "__starpack_registry__";
/// Function holding every synthetic module function
pub const CONTAINER: &str = "__starpack_init__";
/// Local export table inside each synthetic module function
pub const EXPORTS: &str = "__starpack_exports__";

/// Name of the synthetic function for the `sequence`-th loaded module
pub fn synthetic_function_name(sequence: usize) -> String {
    format!("__starpack_module_{sequence}__")
}

/// Generate registry initialization: `__starpack_registry__ = {}`
pub fn generate_registry_init() -> Stmt {
    statements::simple_assign(REGISTRY, expressions::empty_dict())
}

/// Generate the opening of a synthetic module function
///
/// ```text
/// __starpack_exports__ = {}
/// __starpack_registry__["module"] = __starpack_exports__
/// ```
pub fn generate_registration(module_name: &str) -> [Stmt; 2] {
    [
        statements::simple_assign(EXPORTS, expressions::empty_dict()),
        statements::assign(
            expressions::string_key(
                expressions::name(REGISTRY, ExprContext::Load),
                module_name,
                ExprContext::Store,
            ),
            expressions::name(EXPORTS, ExprContext::Load),
        ),
    ]
}

/// Generate `__starpack_exports__["name"] = name`
pub fn generate_export(name: &str) -> Stmt {
    statements::assign(
        expressions::string_key(
            expressions::name(EXPORTS, ExprContext::Load),
            name,
            ExprContext::Store,
        ),
        expressions::name(name, ExprContext::Load),
    )
}

/// Generate `local = __starpack_registry__["module"]["symbol"]`
pub fn generate_import_lookup(local: &str, module_name: &str, symbol: &str) -> Stmt {
    let table = expressions::string_key(
        expressions::name(REGISTRY, ExprContext::Load),
        module_name,
        ExprContext::Load,
    );
    statements::simple_assign(
        local,
        expressions::string_key(table, symbol, ExprContext::Load),
    )
}

/// Generate a bare call statement: `function()`
pub fn generate_call(function: &str) -> Stmt {
    statements::expr(expressions::call(
        expressions::name(function, ExprContext::Load),
        vec![],
    ))
}
