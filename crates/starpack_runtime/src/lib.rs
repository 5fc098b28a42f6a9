//! starpack runtime - parser front end, compiler and evaluator for the
//! Starlark dialect bundled by `starpack`.
//!
//! # Architecture
//!
//! - [`parse`]: source text to a `ruff_python_ast::ModModule`; Starlark's
//!   surface syntax is a strict subset of Python
//! - [`compile`]: AST to a validated, serializable IR under a [`Dialect`]
//! - [`Program::init`]: tree-walking evaluation of the IR on a [`Thread`],
//!   which calls back into a [`Loader`] for every `load` statement
//! - [`Program::write_to`] / [`Program::read_from`]: the compiled artifact

mod builtins;
mod compile;
mod dialect;
mod error;
mod eval;
mod ir;
mod methods;
mod operators;
mod program;
mod syntax;
mod value;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

pub use builtins::{Builtin, NativeModule};
pub use compile::compile;
pub use dialect::Dialect;
pub use error::{ErrorKind, LoadCause, Result, RuntimeError};
pub use eval::{Loader, PrintHandler, Thread};
pub use program::{Execution, Program, eval_expression};
pub use syntax::{LoadBinding, LoadStatement, SourceModule, load_statement, parse};
pub use value::{BoundMethod, Dict, Function, Globals, List, Set, Value};

pub(crate) type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
