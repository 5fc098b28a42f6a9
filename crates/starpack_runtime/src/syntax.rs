//! Parsing and the `load` statement view of the syntax tree
//!
//! Starlark's grammar is a subset of Python's, so source units are parsed
//! with `ruff_python_parser`. A `load` statement is represented by the
//! parser as an expression statement calling the bare name `load`;
//! [`load_statement`] recognises that shape.

use ruff_python_ast::{self as ast, Expr, ModModule, Stmt};
use ruff_python_parser::parse_module;

use crate::{Dialect, Program, Result, RuntimeError, compile};

/// A parsed source unit
#[derive(Debug, Clone)]
pub struct SourceModule {
    path: String,
    source: String,
    ast: ModModule,
}

impl SourceModule {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &ModModule {
        &self.ast
    }

    pub fn into_ast(self) -> ModModule {
        self.ast
    }

    /// Compile this module, reporting errors with source line numbers
    pub fn compile(&self, dialect: &Dialect) -> Result<Program> {
        compile::compile_with_source(&self.path, &self.ast, Some(&self.source), dialect)
    }
}

/// Parse one source unit
pub fn parse(path: &str, source: &str) -> Result<SourceModule> {
    let parsed = parse_module(source).map_err(|err| {
        let (line, column) = line_column(source, usize::from(err.location.start()));
        RuntimeError::Parse {
            path: path.to_owned(),
            line,
            column,
            message: err.error.to_string(),
        }
    })?;
    log::trace!("Parsed {path} ({} statements)", parsed.syntax().body.len());
    Ok(SourceModule {
        path: path.to_owned(),
        source: source.to_owned(),
        ast: parsed.into_syntax(),
    })
}

/// 1-based line and column of a byte offset
pub(crate) fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before, |newline| &before[newline + 1..])
        .chars()
        .count()
        + 1;
    (line, column)
}

/// One `local = "symbol"` pair of a load statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBinding {
    /// Name bound in the loading module
    pub local: String,
    /// Name exported by the loaded module
    pub symbol: String,
}

/// `load("module", "a", b = "c")`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStatement {
    pub module: String,
    pub bindings: Vec<LoadBinding>,
}

/// Recognise a well-formed top-level `load` statement
pub fn load_statement(stmt: &Stmt) -> Option<LoadStatement> {
    load_call(stmt).and_then(|call| LoadStatement::from_call(call).ok())
}

pub(crate) fn load_call(stmt: &Stmt) -> Option<&ast::ExprCall> {
    let Stmt::Expr(ast::StmtExpr { value, .. }) = stmt else {
        return None;
    };
    let Expr::Call(call) = value.as_ref() else {
        return None;
    };
    match call.func.as_ref() {
        Expr::Name(name) if name.id.as_str() == "load" => Some(call),
        _ => None,
    }
}

impl LoadStatement {
    pub(crate) fn from_call(call: &ast::ExprCall) -> Result<Self, String> {
        let mut args = call.arguments.args.iter();
        let module = match args.next() {
            Some(Expr::StringLiteral(literal)) => literal.value.to_str().to_owned(),
            Some(_) => return Err("load: module name must be a string literal".to_owned()),
            None => return Err("load statement requires a module name".to_owned()),
        };

        let mut bindings = Vec::new();
        for arg in args {
            let Expr::StringLiteral(literal) = arg else {
                return Err("load: symbol names must be string literals".to_owned());
            };
            let symbol = literal.value.to_str();
            bindings.push(LoadBinding {
                local: symbol.to_owned(),
                symbol: symbol.to_owned(),
            });
        }
        for keyword in &call.arguments.keywords {
            let Some(alias) = &keyword.arg else {
                return Err("load: `**` arguments are not allowed".to_owned());
            };
            let Expr::StringLiteral(literal) = &keyword.value else {
                return Err(format!(
                    "load: symbol for `{}` must be a string literal",
                    alias.as_str()
                ));
            };
            bindings.push(LoadBinding {
                local: alias.as_str().to_owned(),
                symbol: literal.value.to_str().to_owned(),
            });
        }

        if bindings.is_empty() {
            return Err("load statement must import at least 1 symbol".to_owned());
        }
        if let Some(private) = bindings.iter().find(|b| b.symbol.starts_with('_')) {
            return Err(format!(
                "load: names with leading underscores are not exported: {}",
                private.symbol
            ));
        }
        Ok(Self { module, bindings })
    }
}
