//! Export rewriting of one module into the body of its synthetic function
//!
//! Given the top-level statements of `geo`:
//!
//! ```text
//! load("units", "SCALE")
//! def area(w, h):
//!     return w * h * SCALE
//! PI = 3
//! ```
//!
//! the rewritten body is
//!
//! ```text
//! __starpack_exports__ = {}
//! __starpack_registry__["geo"] = __starpack_exports__
//! SCALE = __starpack_registry__["units"]["SCALE"]
//! def area(w, h):
//!     return w * h * SCALE
//! __starpack_exports__["area"] = area
//! PI = 3
//! __starpack_exports__["PI"] = PI
//! ```
//!
//! The registration comes first so a module has a registry entry before any
//! of its own statements run. Symbol existence is not checked here; a missing
//! symbol surfaces as a lookup error when the bundle runs.

use log::trace;
use ruff_python_ast::Stmt;

use super::module_registry;
use crate::{
    analyzers::statement_categorizer::{ModuleStmt, categorize},
    util::normalize_separators,
};

/// Rewrite `body`, the top-level statements of `module_name`
pub fn rewrite_module(module_name: &str, body: &[Stmt]) -> Vec<Stmt> {
    let mut rewritten = Vec::with_capacity(body.len() * 2 + 2);
    rewritten.extend(module_registry::generate_registration(module_name));

    for stmt in body {
        let shape = categorize(stmt);
        trace!("{module_name}: {shape:?}");
        match shape {
            ModuleStmt::Load(load) => {
                // Registry keys use the same spelling the resolver registers
                let imported = normalize_separators(&load.module);
                rewritten.extend(load.bindings.iter().map(|binding| {
                    module_registry::generate_import_lookup(
                        &binding.local,
                        &imported,
                        &binding.symbol,
                    )
                }));
            }
            ModuleStmt::FunctionDef(name) | ModuleStmt::SimpleAssign(name) => {
                rewritten.push(stmt.clone());
                rewritten.push(module_registry::generate_export(name));
            }
            // Known gap: destructuring, index and attribute targets are not exported
            ModuleStmt::Other => rewritten.push(stmt.clone()),
        }
    }
    rewritten
}
