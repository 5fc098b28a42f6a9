//! AST builder module for creating synthetic AST nodes
//!
//! This module provides factory functions for creating AST nodes that don't
//! originate from source files. All synthetic nodes use default ranges to
//! clearly indicate they are generated.

pub mod expressions;
pub mod statements;

use ruff_python_ast::{AtomicNodeIndex, ModModule, Stmt};
use ruff_text_size::TextRange;

/// Create a synthetic range for generated nodes
pub(crate) fn synthetic_range() -> TextRange {
    TextRange::default()
}

/// Wrap generated statements in a module node
pub fn module(body: Vec<Stmt>) -> ModModule {
    ModModule {
        body,
        range: synthetic_range(),
        node_index: AtomicNodeIndex::dummy(),
    }
}
