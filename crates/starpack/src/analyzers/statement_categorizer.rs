//! Statement categorizer for module top levels
//!
//! The export rewriter only distinguishes four statement shapes. Anything
//! that is not a load, a `def` or a single-name assignment is [`ModuleStmt::Other`].

use ruff_python_ast::{Expr, Stmt};
use starpack_runtime::{LoadStatement, load_statement};

use crate::types::FxIndexSet;

/// Shape of one top-level statement, as far as exporting is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStmt<'a> {
    /// `load("module", "symbol", alias = "symbol")`
    Load(LoadStatement),
    /// `def name(...)`
    FunctionDef(&'a str),
    /// `name = ...` or `name op= ...` with a single identifier target
    SimpleAssign(&'a str),
    /// Any other statement, including destructuring, index and attribute
    /// assignment. Copied into the module body but never exported.
    Other,
}

impl ModuleStmt<'_> {
    /// The name this statement exports, if any
    pub fn exported_name(&self) -> Option<&str> {
        match self {
            Self::FunctionDef(name) | Self::SimpleAssign(name) => Some(name),
            Self::Load(_) | Self::Other => None,
        }
    }
}

/// Classify one top-level statement
pub fn categorize(stmt: &Stmt) -> ModuleStmt<'_> {
    if let Some(load) = load_statement(stmt) {
        return ModuleStmt::Load(load);
    }
    match stmt {
        Stmt::FunctionDef(def) => ModuleStmt::FunctionDef(def.name.as_str()),
        Stmt::Assign(assign) => match assign.targets.as_slice() {
            [Expr::Name(target)] => ModuleStmt::SimpleAssign(target.id.as_str()),
            _ => ModuleStmt::Other,
        },
        Stmt::AugAssign(assign) => match assign.target.as_ref() {
            Expr::Name(target) => ModuleStmt::SimpleAssign(target.id.as_str()),
            _ => ModuleStmt::Other,
        },
        _ => ModuleStmt::Other,
    }
}

/// Names a module's export table will hold, in first-binding order
pub fn export_names(body: &[Stmt]) -> FxIndexSet<String> {
    body.iter()
        .filter_map(|stmt| categorize(stmt).exported_name().map(ToOwned::to_owned))
        .collect()
}
