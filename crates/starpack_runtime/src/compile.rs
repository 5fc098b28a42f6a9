//! Lowering from the ruff syntax tree to the runtime IR
//!
//! The lowerer is also the resolver: it rejects the Python constructs that
//! Starlark does not have and enforces the [`Dialect`] restrictions on
//! top-level statements, loops and reassignment.

use std::{fmt::Display, rc::Rc};

use log::trace;
use ruff_python_ast::{
    self as ast, BoolOp, CmpOp, Expr as AstExpr, ModModule, Number, Operator, Stmt as AstStmt,
};
use ruff_text_size::Ranged;
use rustc_hash::FxHashSet;

use crate::{
    Dialect, Program, Result, RuntimeError,
    ir::{
        Argument, BinaryOp, Clause, CompareOp, Constant, Expr, FunctionDef, Param, Stmt, Target,
        UnaryOp,
    },
    syntax::{LoadStatement, line_column, load_call},
};

/// Compile a parsed module into a program
pub fn compile(path: &str, module: &ModModule, dialect: &Dialect) -> Result<Program> {
    compile_with_source(path, module, None, dialect)
}

pub(crate) fn compile_with_source(
    path: &str,
    module: &ModModule,
    source: Option<&str>,
    dialect: &Dialect,
) -> Result<Program> {
    let mut lowerer = Lowerer::new(path, source, *dialect);
    let body = lowerer.lower_block(&module.body)?;
    trace!("Compiled {path}: {} top-level statements", body.len());
    Ok(Program::new(path, *dialect, body))
}

/// Lower a standalone expression, as typed at an interactive prompt
pub(crate) fn compile_expression(path: &str, expr: &AstExpr, dialect: &Dialect) -> Result<Expr> {
    Lowerer::new(path, None, *dialect).lower_expr(expr)
}

struct Lowerer<'a> {
    path: &'a str,
    source: Option<&'a str>,
    dialect: Dialect,
    function_depth: usize,
    /// Depth of `if`/`for`/`while` blocks in the current function
    block_depth: usize,
    loop_depth: usize,
    globals: FxHashSet<String>,
}

impl<'a> Lowerer<'a> {
    fn new(path: &'a str, source: Option<&'a str>, dialect: Dialect) -> Self {
        Self {
            path,
            source,
            dialect,
            function_depth: 0,
            block_depth: 0,
            loop_depth: 0,
            globals: FxHashSet::default(),
        }
    }

    fn error(&self, node: &impl Ranged, message: impl Display) -> RuntimeError {
        let message = match self.source {
            Some(source) => {
                let (line, column) = line_column(source, usize::from(node.start()));
                format!("{line}:{column}: {message}")
            }
            None => message.to_string(),
        };
        RuntimeError::Compile {
            path: self.path.to_owned(),
            message,
        }
    }

    const fn at_top_level(&self) -> bool {
        self.function_depth == 0
    }

    fn bind_global(&mut self, name: &str, node: &impl Ranged) -> Result<()> {
        if !self.at_top_level() {
            return Ok(());
        }
        if !self.globals.insert(name.to_owned()) && !self.dialect.allow_global_reassign {
            return Err(self.error(node, format!("cannot reassign global {name}")));
        }
        Ok(())
    }

    fn bind_target(&mut self, target: &Target, node: &impl Ranged) -> Result<()> {
        match target {
            Target::Name(name) => self.bind_global(name, node),
            Target::Index { .. } => Ok(()),
            Target::Tuple(targets) => targets
                .iter()
                .try_for_each(|target| self.bind_target(target, node)),
        }
    }

    fn check_top_level_block(&self, stmt: &AstStmt, keyword: &str) -> Result<()> {
        if self.at_top_level() && !self.dialect.allow_global_reassign {
            return Err(self.error(stmt, format!("{keyword} statement not within a function")));
        }
        Ok(())
    }

    fn lower_block(&mut self, body: &[AstStmt]) -> Result<Vec<Stmt>> {
        body.iter().map(|stmt| self.lower_stmt(stmt)).collect()
    }

    fn lower_nested_block(&mut self, body: &[AstStmt], is_loop: bool) -> Result<Vec<Stmt>> {
        self.block_depth += 1;
        if is_loop {
            self.loop_depth += 1;
        }
        let lowered = self.lower_block(body);
        if is_loop {
            self.loop_depth -= 1;
        }
        self.block_depth -= 1;
        lowered
    }

    fn lower_stmt(&mut self, stmt: &AstStmt) -> Result<Stmt> {
        match stmt {
            AstStmt::Expr(ast::StmtExpr { value, .. }) => {
                if let Some(call) = load_call(stmt) {
                    return self.lower_load(stmt, call);
                }
                Ok(Stmt::Expr(self.lower_expr(value)?))
            }
            AstStmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                let [target] = targets.as_slice() else {
                    return Err(self.error(stmt, "chained assignment is not supported"));
                };
                let target = self.lower_target(target)?;
                let value = self.lower_expr(value)?;
                self.bind_target(&target, stmt)?;
                Ok(Stmt::Assign { target, value })
            }
            AstStmt::AugAssign(ast::StmtAugAssign {
                target, op, value, ..
            }) => {
                let target = self.lower_target(target)?;
                if matches!(target, Target::Tuple(_)) {
                    return Err(self.error(stmt, "augmented assignment to a tuple"));
                }
                let op = self.lower_operator(*op, stmt)?;
                let value = self.lower_expr(value)?;
                self.bind_target(&target, stmt)?;
                Ok(Stmt::AugAssign { target, op, value })
            }
            AstStmt::AnnAssign(_) => Err(self.error(stmt, "type annotations are not supported")),
            AstStmt::FunctionDef(def) => {
                if def.is_async {
                    return Err(self.error(stmt, "async functions are not supported"));
                }
                if !def.decorator_list.is_empty() {
                    return Err(self.error(stmt, "decorators are not supported"));
                }
                if def.returns.is_some() || def.type_params.is_some() {
                    return Err(self.error(stmt, "type annotations are not supported"));
                }
                self.bind_global(def.name.as_str(), stmt)?;
                let function = self.lower_function(def.name.as_str(), &def.parameters, |this| {
                    this.lower_block(&def.body)
                })?;
                Ok(Stmt::Def(Rc::new(function)))
            }
            AstStmt::Return(ast::StmtReturn { value, .. }) => {
                if self.at_top_level() {
                    return Err(self.error(stmt, "return statement not within a function"));
                }
                let value = value.as_deref().map(|v| self.lower_expr(v)).transpose()?;
                Ok(Stmt::Return(value))
            }
            AstStmt::If(ast::StmtIf {
                test,
                body,
                elif_else_clauses,
                ..
            }) => {
                self.check_top_level_block(stmt, "if")?;
                let test = self.lower_expr(test)?;
                let body = self.lower_nested_block(body, false)?;
                let mut orelse = Vec::new();
                for clause in elif_else_clauses.iter().rev() {
                    let clause_body = self.lower_nested_block(&clause.body, false)?;
                    orelse = match &clause.test {
                        Some(test) => vec![Stmt::If {
                            test: self.lower_expr(test)?,
                            body: clause_body,
                            orelse,
                        }],
                        None => clause_body,
                    };
                }
                Ok(Stmt::If { test, body, orelse })
            }
            AstStmt::For(ast::StmtFor {
                is_async,
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                self.check_top_level_block(stmt, "for")?;
                if *is_async || !orelse.is_empty() {
                    return Err(self.error(stmt, "unsupported form of for loop"));
                }
                let target = self.lower_target(target)?;
                self.bind_target(&target, stmt)?;
                let iter = self.lower_expr(iter)?;
                let body = self.lower_nested_block(body, true)?;
                Ok(Stmt::For { target, iter, body })
            }
            AstStmt::While(ast::StmtWhile {
                test, body, orelse, ..
            }) => {
                if !self.dialect.allow_recursion {
                    return Err(self.error(stmt, "dialect does not support while loops"));
                }
                self.check_top_level_block(stmt, "while")?;
                if !orelse.is_empty() {
                    return Err(self.error(stmt, "while-else is not supported"));
                }
                let test = self.lower_expr(test)?;
                let body = self.lower_nested_block(body, true)?;
                Ok(Stmt::While { test, body })
            }
            AstStmt::Break(_) | AstStmt::Continue(_) if self.loop_depth == 0 => {
                Err(self.error(stmt, "break or continue not in a loop"))
            }
            AstStmt::Break(_) => Ok(Stmt::Break),
            AstStmt::Continue(_) => Ok(Stmt::Continue),
            AstStmt::Pass(_) => Ok(Stmt::Pass),
            AstStmt::ClassDef(_) => Err(self.error(stmt, "class definitions are not supported")),
            AstStmt::Import(_) | AstStmt::ImportFrom(_) => Err(self.error(
                stmt,
                "import statements are not supported; use load(\"module\", \"name\")",
            )),
            AstStmt::Global(_) | AstStmt::Nonlocal(_) => Err(self.error(
                stmt,
                "global and nonlocal declarations are not supported",
            )),
            _ => Err(self.error(stmt, "unsupported statement")),
        }
    }

    fn lower_load(&mut self, stmt: &AstStmt, call: &ast::ExprCall) -> Result<Stmt> {
        if !self.at_top_level() {
            return Err(self.error(stmt, "load statement within a function"));
        }
        if self.block_depth > 0 {
            return Err(self.error(stmt, "load statement within a conditional or loop"));
        }
        let load = LoadStatement::from_call(call).map_err(|message| self.error(stmt, message))?;
        for binding in &load.bindings {
            self.bind_global(&binding.local, stmt)?;
        }
        Ok(Stmt::Load {
            module: load.module,
            bindings: load
                .bindings
                .into_iter()
                .map(|binding| (binding.local, binding.symbol))
                .collect(),
        })
    }

    fn lower_function(
        &mut self,
        name: &str,
        parameters: &ast::Parameters,
        lower_body: impl FnOnce(&mut Self) -> Result<Vec<Stmt>>,
    ) -> Result<FunctionDef> {
        let mut params = Vec::new();
        let positional = parameters.posonlyargs.iter().chain(&parameters.args);
        for (with_default, keyword_only) in positional
            .map(|p| (p, false))
            .chain(parameters.kwonlyargs.iter().map(|p| (p, true)))
        {
            if with_default.parameter.annotation.is_some() {
                return Err(self.error(with_default, "type annotations are not supported"));
            }
            params.push(Param {
                name: with_default.parameter.name.as_str().to_owned(),
                default: with_default
                    .default
                    .as_deref()
                    .map(|d| self.lower_expr(d))
                    .transpose()?,
                keyword_only,
            });
        }

        let saved = (self.block_depth, self.loop_depth);
        self.function_depth += 1;
        self.block_depth = 0;
        self.loop_depth = 0;
        let body = lower_body(self);
        self.function_depth -= 1;
        (self.block_depth, self.loop_depth) = saved;

        Ok(FunctionDef {
            name: name.to_owned(),
            params,
            varargs: parameters
                .vararg
                .as_ref()
                .map(|p| p.name.as_str().to_owned()),
            kwargs: parameters
                .kwarg
                .as_ref()
                .map(|p| p.name.as_str().to_owned()),
            body: body?,
        })
    }

    fn lower_target(&mut self, expr: &AstExpr) -> Result<Target> {
        match expr {
            AstExpr::Name(name) => Ok(Target::Name(name.id.as_str().to_owned())),
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => {
                if matches!(slice.as_ref(), AstExpr::Slice(_)) {
                    return Err(self.error(expr, "cannot assign to a slice"));
                }
                Ok(Target::Index {
                    object: self.lower_expr(value)?,
                    key: self.lower_expr(slice)?,
                })
            }
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) | AstExpr::List(ast::ExprList { elts, .. }) => {
                Ok(Target::Tuple(
                    elts.iter()
                        .map(|elt| self.lower_target(elt))
                        .collect::<Result<_>>()?,
                ))
            }
            AstExpr::Attribute(_) => Err(self.error(expr, "cannot assign to a field")),
            _ => Err(self.error(expr, "invalid assignment target")),
        }
    }

    fn lower_operator(&self, op: Operator, node: &impl Ranged) -> Result<BinaryOp> {
        Ok(match op {
            Operator::Add => BinaryOp::Add,
            Operator::Sub => BinaryOp::Sub,
            Operator::Mult => BinaryOp::Mul,
            Operator::Div => BinaryOp::Div,
            Operator::FloorDiv => BinaryOp::FloorDiv,
            Operator::Mod => BinaryOp::Mod,
            Operator::BitAnd => BinaryOp::BitAnd,
            Operator::BitOr => BinaryOp::BitOr,
            Operator::BitXor => BinaryOp::BitXor,
            Operator::LShift => BinaryOp::Shl,
            Operator::RShift => BinaryOp::Shr,
            Operator::Pow => return Err(self.error(node, "operator ** is not supported")),
            Operator::MatMult => return Err(self.error(node, "operator @ is not supported")),
        })
    }

    fn lower_boxed(&mut self, expr: &AstExpr) -> Result<Box<Expr>> {
        self.lower_expr(expr).map(Box::new)
    }

    fn lower_exprs<'e>(&mut self, exprs: impl IntoIterator<Item = &'e AstExpr>) -> Result<Vec<Expr>> {
        exprs.into_iter().map(|e| self.lower_expr(e)).collect()
    }

    fn lower_expr(&mut self, expr: &AstExpr) -> Result<Expr> {
        Ok(match expr {
            AstExpr::BoolOp(ast::ExprBoolOp { op, values, .. }) => {
                let mut values = values.iter();
                let Some(first) = values.next() else {
                    return Err(self.error(expr, "empty boolean expression"));
                };
                let mut acc = self.lower_expr(first)?;
                for value in values {
                    let right = self.lower_boxed(value)?;
                    acc = match op {
                        BoolOp::And => Expr::And(Box::new(acc), right),
                        BoolOp::Or => Expr::Or(Box::new(acc), right),
                    };
                }
                acc
            }
            AstExpr::BinOp(ast::ExprBinOp {
                left, op, right, ..
            }) => Expr::Binary {
                op: self.lower_operator(*op, expr)?,
                left: self.lower_boxed(left)?,
                right: self.lower_boxed(right)?,
            },
            AstExpr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => Expr::Unary {
                op: match op {
                    ast::UnaryOp::Not => UnaryOp::Not,
                    ast::UnaryOp::USub => UnaryOp::Neg,
                    ast::UnaryOp::UAdd => UnaryOp::Pos,
                    ast::UnaryOp::Invert => UnaryOp::Invert,
                },
                operand: self.lower_boxed(operand)?,
            },
            AstExpr::Lambda(ast::ExprLambda {
                parameters, body, ..
            }) => {
                let empty = ast::Parameters::default();
                let parameters = parameters.as_deref().unwrap_or(&empty);
                let function = self.lower_function("lambda", parameters, |this| {
                    Ok(vec![Stmt::Return(Some(this.lower_expr(body)?))])
                })?;
                Expr::Lambda(Rc::new(function))
            }
            AstExpr::If(ast::ExprIf {
                test, body, orelse, ..
            }) => Expr::Conditional {
                test: self.lower_boxed(test)?,
                body: self.lower_boxed(body)?,
                orelse: self.lower_boxed(orelse)?,
            },
            AstExpr::Dict(ast::ExprDict { items, .. }) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    let Some(key) = &item.key else {
                        return Err(self.error(expr, "dict unpacking is not supported"));
                    };
                    entries.push((self.lower_expr(key)?, self.lower_expr(&item.value)?));
                }
                Expr::Dict(entries)
            }
            AstExpr::Set(ast::ExprSet { elts, .. }) => {
                if !self.dialect.allow_set {
                    return Err(self.error(expr, "dialect does not support sets"));
                }
                Expr::Set(self.lower_exprs(elts)?)
            }
            AstExpr::ListComp(ast::ExprListComp {
                elt, generators, ..
            }) => Expr::ListComp {
                element: self.lower_boxed(elt)?,
                clauses: self.lower_clauses(generators)?,
            },
            AstExpr::DictComp(ast::ExprDictComp {
                key,
                value,
                generators,
                ..
            }) => Expr::DictComp {
                key: self.lower_boxed(key)?,
                value: self.lower_boxed(value)?,
                clauses: self.lower_clauses(generators)?,
            },
            AstExpr::Compare(ast::ExprCompare {
                left,
                ops,
                comparators,
                ..
            }) => {
                let ([op], [right]) = (&**ops, &**comparators) else {
                    return Err(self.error(
                        expr,
                        "comparison operators do not associate; use parentheses",
                    ));
                };
                let op = match op {
                    CmpOp::Eq => CompareOp::Eq,
                    CmpOp::NotEq => CompareOp::NotEq,
                    CmpOp::Lt => CompareOp::Lt,
                    CmpOp::LtE => CompareOp::LtE,
                    CmpOp::Gt => CompareOp::Gt,
                    CmpOp::GtE => CompareOp::GtE,
                    CmpOp::In => CompareOp::In,
                    CmpOp::NotIn => CompareOp::NotIn,
                    CmpOp::Is | CmpOp::IsNot => {
                        return Err(self.error(expr, "`is` comparisons are not supported; use =="));
                    }
                };
                Expr::Compare {
                    op,
                    left: self.lower_boxed(left)?,
                    right: self.lower_boxed(right)?,
                }
            }
            AstExpr::Call(ast::ExprCall {
                func, arguments, ..
            }) => {
                let mut args = Vec::with_capacity(arguments.args.len() + arguments.keywords.len());
                for arg in &arguments.args {
                    args.push(match arg {
                        AstExpr::Starred(ast::ExprStarred { value, .. }) => {
                            Argument::Star(self.lower_expr(value)?)
                        }
                        other => Argument::Positional(self.lower_expr(other)?),
                    });
                }
                for keyword in &arguments.keywords {
                    let value = self.lower_expr(&keyword.value)?;
                    args.push(match &keyword.arg {
                        Some(name) => Argument::Keyword(name.as_str().to_owned(), value),
                        None => Argument::StarStar(value),
                    });
                }
                Expr::Call {
                    func: self.lower_boxed(func)?,
                    args,
                }
            }
            AstExpr::StringLiteral(literal) => {
                Expr::Constant(Constant::String(Rc::from(literal.value.to_str())))
            }
            AstExpr::NumberLiteral(ast::ExprNumberLiteral { value, .. }) => match value {
                Number::Int(int) => match int.as_i64() {
                    Some(i) => Expr::Constant(Constant::Int(i)),
                    None => return Err(self.error(expr, "integer literal too large")),
                },
                Number::Float(f) => Expr::Constant(Constant::Float(*f)),
                Number::Complex { .. } => {
                    return Err(self.error(expr, "complex numbers are not supported"));
                }
            },
            AstExpr::BooleanLiteral(ast::ExprBooleanLiteral { value, .. }) => {
                Expr::Constant(Constant::Bool(*value))
            }
            AstExpr::NoneLiteral(_) => Expr::Constant(Constant::None),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Expr::Attribute {
                object: self.lower_boxed(value)?,
                name: attr.as_str().to_owned(),
            },
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => {
                let object = self.lower_boxed(value)?;
                match slice.as_ref() {
                    AstExpr::Slice(ast::ExprSlice {
                        lower, upper, step, ..
                    }) => Expr::Slice {
                        object,
                        start: self.lower_optional(lower.as_deref())?,
                        stop: self.lower_optional(upper.as_deref())?,
                        step: self.lower_optional(step.as_deref())?,
                    },
                    key => Expr::Index {
                        object,
                        key: self.lower_boxed(key)?,
                    },
                }
            }
            AstExpr::Name(name) => Expr::Name(name.id.as_str().to_owned()),
            AstExpr::List(ast::ExprList { elts, .. }) => Expr::List(self.lower_exprs(elts)?),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) => Expr::Tuple(self.lower_exprs(elts)?),
            AstExpr::FString(_) | AstExpr::TString(_) => {
                return Err(self.error(expr, "f-strings are not supported"));
            }
            AstExpr::Starred(_) => return Err(self.error(expr, "unexpected starred expression")),
            AstExpr::Yield(_) | AstExpr::YieldFrom(_) | AstExpr::Await(_) => {
                return Err(self.error(expr, "generators and coroutines are not supported"));
            }
            _ => return Err(self.error(expr, "unsupported expression")),
        })
    }

    fn lower_optional(&mut self, expr: Option<&AstExpr>) -> Result<Option<Box<Expr>>> {
        expr.map(|e| self.lower_boxed(e)).transpose()
    }

    fn lower_clauses(&mut self, generators: &[ast::Comprehension]) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        for generator in generators {
            if generator.is_async {
                return Err(self.error(generator, "async comprehensions are not supported"));
            }
            clauses.push(Clause::For {
                target: self.lower_target(&generator.target)?,
                iter: self.lower_expr(&generator.iter)?,
            });
            for condition in &generator.ifs {
                clauses.push(Clause::If(self.lower_expr(condition)?));
            }
        }
        Ok(clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn compile_source(source: &str, dialect: Dialect) -> Result<Program> {
        parse("test.star", source)?.compile(&dialect)
    }

    fn compile_error(source: &str, dialect: Dialect) -> String {
        match compile_source(source, dialect) {
            Ok(_) => panic!("expected compile error for {source:?}"),
            Err(err) => err.to_string(),
        }
    }

    #[test]
    fn test_dialect_error_messages() {
        let messages = [
            "x = 1\nx = 2\n",
            "for x in []:\n    pass\n",
            "def f():\n    while False:\n        pass\n",
            "s = {1}\n",
        ]
        .map(|source| compile_error(source, Dialect::default()))
        .join("\n");
        insta::assert_snapshot!(messages, @r"
        test.star: 2:1: cannot reassign global x
        test.star: 1:1: for statement not within a function
        test.star: 2:5: dialect does not support while loops
        test.star: 1:5: dialect does not support sets
        ");
    }

    #[test]
    fn test_global_reassignment_requires_dialect_flag() {
        let source = "x = 1\nx = 2\n";
        let message = compile_error(source, Dialect::default());
        assert!(message.contains("cannot reassign global x"), "{message}");
        assert!(message.starts_with("test.star: 2:1:"), "{message}");

        let permissive = Dialect {
            allow_global_reassign: true,
            ..Dialect::default()
        };
        assert!(compile_source(source, permissive).is_ok());
    }

    #[test]
    fn test_top_level_control_flow_requires_dialect_flag() {
        let message = compile_error("for x in []:\n    pass\n", Dialect::default());
        assert!(message.contains("for statement not within a function"), "{message}");
        assert!(compile_source("def f():\n    for x in []:\n        pass\n", Dialect::default()).is_ok());
    }

    #[test]
    fn test_while_requires_recursion_flag() {
        let source = "def f():\n    while False:\n        pass\n";
        let message = compile_error(source, Dialect::default());
        assert!(message.contains("while loops"), "{message}");
        let dialect = Dialect {
            allow_recursion: true,
            ..Dialect::default()
        };
        assert!(compile_source(source, dialect).is_ok());
    }

    #[test]
    fn test_set_literal_requires_set_flag() {
        assert!(compile_error("s = {1, 2}", Dialect::default()).contains("sets"));
        let dialect = Dialect {
            allow_set: true,
            ..Dialect::default()
        };
        assert!(compile_source("s = {1, 2}", dialect).is_ok());
    }

    #[test]
    fn test_python_only_constructs_are_rejected() {
        for source in [
            "class A:\n    pass\n",
            "import os\n",
            "x = y = 1\n",
            "x = 1 < 2 < 3\n",
            "def f():\n    load(\"m\", \"x\")\n",
            "x = a is None\n",
            "x = f\"{y}\"\n",
        ] {
            compile_error(source, Dialect::permissive());
        }
    }

    #[test]
    fn test_load_binds_globals() {
        let message = compile_error("load(\"m\", \"x\")\nx = 1\n", Dialect::default());
        assert!(message.contains("cannot reassign global x"), "{message}");
    }
}
