//! Tree-walking evaluator for the IR

use std::{cell::RefCell, fmt, rc::Rc};

use log::trace;
use rustc_hash::FxHashSet;

use crate::{
    Dialect, FxIndexMap, Globals, Result,
    builtins,
    error::{ErrorKind, EvalError},
    ir::{Argument, BinaryOp, Clause, Constant, Expr, FunctionDef, Stmt, Target},
    methods, operators,
    value::{Dict, DictMap, Function, Set, SetItems, Value},
};

/// Maximum number of nested function calls on one thread
pub(crate) const MAX_CALL_DEPTH: usize = 256;

pub(crate) type EvalResult<T> = std::result::Result<T, EvalError>;

/// Receives the output of the `print` builtin
pub type PrintHandler = Rc<dyn Fn(&str)>;

/// Resolves the module named by a `load` statement to its globals
///
/// The runtime calls the loader synchronously, once per `load` statement
/// executed. Caching and cycle detection are the loader's business.
pub trait Loader {
    fn load(&mut self, module: &str) -> Result<Globals>;
}

/// Execution context for one program run
pub struct Thread<'a> {
    name: String,
    loader: Option<&'a mut dyn Loader>,
    print: Option<PrintHandler>,
    stack: Vec<Rc<FunctionDef>>,
}

impl<'a> Thread<'a> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loader: None,
            print: None,
            stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: &'a mut dyn Loader) -> Self {
        self.loader = Some(loader);
        self
    }

    #[must_use]
    pub fn with_print_handler(mut self, print: PrintHandler) -> Self {
        self.print = Some(print);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::print_stdout)]
    pub(crate) fn print(&self, message: &str) {
        match &self.print {
            Some(print) => print(message),
            None => println!("{message}"),
        }
    }
}

impl fmt::Debug for Thread<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.name)
            .field("has_loader", &self.loader.is_some())
            .field("depth", &self.stack.len())
            .finish()
    }
}

/// A lexical scope
pub(crate) struct Frame {
    bindings: RefCell<FxIndexMap<String, Value>>,
    parent: Option<Rc<Frame>>,
    is_module: bool,
}

impl Frame {
    pub(crate) fn new(parent: Option<Rc<Self>>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent,
            is_module: false,
        })
    }

    /// The top-level scope of a module, nested inside its predeclared names
    pub(crate) fn module(predeclared: &Globals) -> Rc<Self> {
        let outer = Rc::new(Self {
            bindings: RefCell::new(
                predeclared
                    .iter()
                    .map(|(name, value)| (name.to_owned(), value.clone()))
                    .collect(),
            ),
            parent: None,
            is_module: false,
        });
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: Some(outer),
            is_module: true,
        })
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        let mut frame = self;
        loop {
            if let Some(value) = frame.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            frame = frame.parent.as_deref()?;
        }
    }

    pub(crate) fn set(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_owned(), value);
    }

    pub(crate) fn bindings(&self) -> Vec<(String, Value)> {
        self.bindings
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub(crate) struct Evaluator<'t, 'a> {
    thread: &'t mut Thread<'a>,
    dialect: Dialect,
    /// Module-level names bound by `load`; these are not exported
    file_locals: FxHashSet<String>,
}

impl<'t, 'a> Evaluator<'t, 'a> {
    pub(crate) fn new(thread: &'t mut Thread<'a>, dialect: Dialect) -> Self {
        Self {
            thread,
            dialect,
            file_locals: FxHashSet::default(),
        }
    }

    pub(crate) fn thread(&self) -> &Thread<'a> {
        self.thread
    }

    pub(crate) const fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub(crate) fn is_file_local(&self, name: &str) -> bool {
        self.file_locals.contains(name)
    }

    pub(crate) fn exec_module(&mut self, body: &[Stmt], frame: &Rc<Frame>) -> EvalResult<()> {
        for stmt in body {
            self.exec(stmt, frame)?;
        }
        Ok(())
    }

    fn exec_block(&mut self, body: &[Stmt], frame: &Rc<Frame>) -> EvalResult<Flow> {
        for stmt in body {
            match self.exec(stmt, frame)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, frame: &Rc<Frame>) -> EvalResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, frame)?;
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(value, frame)?;
                self.assign(target, value, frame)?;
            }
            Stmt::AugAssign { target, op, value } => self.aug_assign(target, *op, value, frame)?,
            Stmt::Def(def) => {
                let function = self.make_function(def, frame)?;
                self.bind(frame, &def.name, function);
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::If { test, body, orelse } => {
                let branch = if self.eval(test, frame)?.truth() {
                    body
                } else {
                    orelse
                };
                return self.exec_block(branch, frame);
            }
            Stmt::For { target, iter, body } => {
                let items = operators::iterate(&self.eval(iter, frame)?)?;
                for item in items {
                    self.assign(target, item, frame)?;
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, frame)?.truth() {
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Pass => {}
            Stmt::Load { module, bindings } => self.exec_load(module, bindings, frame)?,
        }
        Ok(Flow::Normal)
    }

    fn exec_load(
        &mut self,
        module: &str,
        bindings: &[(String, String)],
        frame: &Rc<Frame>,
    ) -> EvalResult<()> {
        trace!("{}: load({module:?})", self.thread.name);
        let Some(loader) = self.thread.loader.as_mut() else {
            return Err(EvalError::new(
                ErrorKind::Load,
                format!("cannot load {module}: load not implemented by this thread"),
            ));
        };
        let globals = loader.load(module)?;
        for (local, symbol) in bindings {
            let Some(value) = globals.get(symbol) else {
                return Err(EvalError::new(
                    ErrorKind::Load,
                    format!("load: name {symbol} not found in module {module}"),
                ));
            };
            frame.set(local, value.clone());
            self.file_locals.insert(local.clone());
        }
        Ok(())
    }

    fn bind(&mut self, frame: &Frame, name: &str, value: Value) {
        if frame.is_module {
            self.file_locals.remove(name);
        }
        frame.set(name, value);
    }

    fn assign(&mut self, target: &Target, value: Value, frame: &Rc<Frame>) -> EvalResult<()> {
        match target {
            Target::Name(name) => self.bind(frame, name, value),
            Target::Index { object, key } => {
                let object = self.eval(object, frame)?;
                let key = self.eval(key, frame)?;
                operators::set_index(&object, key, value)?;
            }
            Target::Tuple(targets) => {
                let items = operators::iterate(&value)?;
                if items.len() != targets.len() {
                    let quantity = if items.len() > targets.len() {
                        "many"
                    } else {
                        "few"
                    };
                    return Err(EvalError::value(format!(
                        "too {quantity} values to unpack (got {}, want {})",
                        items.len(),
                        targets.len()
                    )));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item, frame)?;
                }
            }
        }
        Ok(())
    }

    fn aug_assign(
        &mut self,
        target: &Target,
        op: BinaryOp,
        value: &Expr,
        frame: &Rc<Frame>,
    ) -> EvalResult<()> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name, frame)?;
                let value = self.eval(value, frame)?;
                let result = augmented(op, current, &value)?;
                self.bind(frame, name, result);
            }
            Target::Index { object, key } => {
                let object = self.eval(object, frame)?;
                let key = self.eval(key, frame)?;
                let current = operators::index(&object, &key)?;
                let value = self.eval(value, frame)?;
                let result = augmented(op, current, &value)?;
                operators::set_index(&object, key, result)?;
            }
            Target::Tuple(_) => {
                return Err(EvalError::type_error(
                    "augmented assignment to a tuple",
                ));
            }
        }
        Ok(())
    }

    fn make_function(&mut self, def: &Rc<FunctionDef>, frame: &Rc<Frame>) -> EvalResult<Value> {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let default = match &param.default {
                Some(expr) => Some(self.eval(expr, frame)?),
                None => None,
            };
            defaults.push(default);
        }
        Ok(Value::Function(Rc::new(Function {
            def: Rc::clone(def),
            defaults,
            closure: Rc::clone(frame),
            dialect: self.dialect,
        })))
    }

    fn lookup(&self, name: &str, frame: &Frame) -> EvalResult<Value> {
        if let Some(value) = frame.lookup(name) {
            return Ok(value);
        }
        builtins::universe(name, &self.dialect)
            .ok_or_else(|| EvalError::name(format!("undefined: {name}")))
    }

    pub(crate) fn eval(&mut self, expr: &Expr, frame: &Rc<Frame>) -> EvalResult<Value> {
        Ok(match expr {
            Expr::Constant(constant) => match constant {
                Constant::None => Value::None,
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(i) => Value::Int(*i),
                Constant::Float(f) => Value::Float(*f),
                Constant::String(s) => Value::String(Rc::clone(s)),
            },
            Expr::Name(name) => self.lookup(name, frame)?,
            Expr::List(items) => Value::list(self.eval_all(items, frame)?),
            Expr::Tuple(items) => Value::tuple(self.eval_all(items, frame)?),
            Expr::Dict(entries) => {
                let mut map = DictMap::default();
                for (key, value) in entries {
                    let key = self.eval(key, frame)?;
                    key.check_hashable()?;
                    let value = self.eval(value, frame)?;
                    if let Some(key) = insert_unique(&mut map, key, value) {
                        return Err(EvalError::value(format!(
                            "duplicate key: {}",
                            key.repr()
                        )));
                    }
                }
                Value::Dict(Rc::new(Dict::new(map)))
            }
            Expr::Set(items) => {
                let mut set = SetItems::default();
                for item in self.eval_all(items, frame)? {
                    item.check_hashable()?;
                    set.insert(item);
                }
                Value::Set(Rc::new(Set::new(set)))
            }
            Expr::Unary { op, operand } => operators::unary(*op, &self.eval(operand, frame)?)?,
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, frame)?;
                let right = self.eval(right, frame)?;
                operators::binary(*op, &left, &right)?
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval(left, frame)?;
                let right = self.eval(right, frame)?;
                Value::Bool(operators::compare(*op, &left, &right)?)
            }
            Expr::And(left, right) => {
                let left = self.eval(left, frame)?;
                if left.truth() {
                    self.eval(right, frame)?
                } else {
                    left
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left, frame)?;
                if left.truth() {
                    left
                } else {
                    self.eval(right, frame)?
                }
            }
            Expr::Conditional { test, body, orelse } => {
                if self.eval(test, frame)?.truth() {
                    self.eval(body, frame)?
                } else {
                    self.eval(orelse, frame)?
                }
            }
            Expr::Call { func, args } => {
                let callee = self.eval(func, frame)?;
                let (positional, named) = self.eval_arguments(args, frame)?;
                self.call(&callee, positional, named)?
            }
            Expr::Index { object, key } => {
                let object = self.eval(object, frame)?;
                let key = self.eval(key, frame)?;
                operators::index(&object, &key)?
            }
            Expr::Slice {
                object,
                start,
                stop,
                step,
            } => {
                let object = self.eval(object, frame)?;
                let start = self.eval_optional(start.as_deref(), frame)?;
                let stop = self.eval_optional(stop.as_deref(), frame)?;
                let step = self.eval_optional(step.as_deref(), frame)?;
                operators::slice(&object, &start, &stop, &step)?
            }
            Expr::Attribute { object, name } => {
                let object = self.eval(object, frame)?;
                methods::attribute(object, name)?
            }
            Expr::Lambda(def) => self.make_function(def, frame)?,
            Expr::ListComp { element, clauses } => {
                let scope = Frame::new(Some(Rc::clone(frame)));
                let mut items = Vec::new();
                self.comprehension(clauses, &scope, &mut |this: &mut Self, scope: &Rc<Frame>| {
                    items.push(this.eval(element, scope)?);
                    Ok(())
                })?;
                Value::list(items)
            }
            Expr::DictComp {
                key,
                value,
                clauses,
            } => {
                let scope = Frame::new(Some(Rc::clone(frame)));
                let mut map = DictMap::default();
                self.comprehension(clauses, &scope, &mut |this: &mut Self, scope: &Rc<Frame>| {
                    let key = this.eval(key, scope)?;
                    key.check_hashable()?;
                    let value = this.eval(value, scope)?;
                    map.insert(key, value);
                    Ok(())
                })?;
                Value::Dict(Rc::new(Dict::new(map)))
            }
        })
    }

    fn eval_all(&mut self, exprs: &[Expr], frame: &Rc<Frame>) -> EvalResult<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr, frame)).collect()
    }

    fn eval_optional(&mut self, expr: Option<&Expr>, frame: &Rc<Frame>) -> EvalResult<Value> {
        match expr {
            Some(expr) => self.eval(expr, frame),
            None => Ok(Value::None),
        }
    }

    fn comprehension(
        &mut self,
        clauses: &[Clause],
        scope: &Rc<Frame>,
        emit: &mut dyn FnMut(&mut Self, &Rc<Frame>) -> EvalResult<()>,
    ) -> EvalResult<()> {
        let Some((clause, rest)) = clauses.split_first() else {
            return emit(self, scope);
        };
        match clause {
            Clause::For { target, iter } => {
                let items = operators::iterate(&self.eval(iter, scope)?)?;
                for item in items {
                    self.assign(target, item, scope)?;
                    self.comprehension(rest, scope, emit)?;
                }
            }
            Clause::If(condition) => {
                if self.eval(condition, scope)?.truth() {
                    self.comprehension(rest, scope, emit)?;
                }
            }
        }
        Ok(())
    }

    fn eval_arguments(
        &mut self,
        args: &[Argument],
        frame: &Rc<Frame>,
    ) -> EvalResult<(Vec<Value>, Vec<(String, Value)>)> {
        let mut positional = Vec::with_capacity(args.len());
        let mut named = Vec::new();
        for arg in args {
            match arg {
                Argument::Positional(expr) => positional.push(self.eval(expr, frame)?),
                Argument::Keyword(name, expr) => named.push((name.clone(), self.eval(expr, frame)?)),
                Argument::Star(expr) => {
                    positional.extend(operators::iterate(&self.eval(expr, frame)?)?);
                }
                Argument::StarStar(expr) => {
                    let value = self.eval(expr, frame)?;
                    let Value::Dict(dict) = &value else {
                        return Err(EvalError::type_error(format!(
                            "argument after ** must be a dict, not {}",
                            value.type_name()
                        )));
                    };
                    for (key, value) in dict.borrow().iter() {
                        let Some(key) = key.as_str() else {
                            return Err(EvalError::type_error("keywords must be strings"));
                        };
                        named.push((key.to_owned(), value.clone()));
                    }
                }
            }
        }
        Ok((positional, named))
    }

    /// Call any callable value
    pub(crate) fn call(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args, kwargs),
            Value::Builtin(builtin) => builtins::call(self, *builtin, args, kwargs),
            Value::Method(method) => methods::call(&method.receiver, &method.name, args, kwargs),
            other => Err(EvalError::type_error(format!(
                "invalid call of non-function ({})",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        if self.thread.stack.len() >= MAX_CALL_DEPTH {
            return Err(EvalError::new(
                ErrorKind::Recursion,
                format!("call stack depth exceeds {MAX_CALL_DEPTH}"),
            ));
        }
        if !function.dialect.allow_recursion
            && self
                .thread
                .stack
                .iter()
                .any(|active| Rc::ptr_eq(active, &function.def))
        {
            return Err(EvalError::new(
                ErrorKind::Recursion,
                format!("function {} called recursively", function.name()),
            ));
        }

        let scope =
            bind_parameters(function, args, kwargs).map_err(|e| e.in_function(function.name()))?;
        self.thread.stack.push(Rc::clone(&function.def));
        let caller_dialect = std::mem::replace(&mut self.dialect, function.dialect);
        let flow = self.exec_block(&function.def.body, &scope);
        self.dialect = caller_dialect;
        self.thread.stack.pop();

        match flow.map_err(|e| e.in_function(function.name()))? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::None),
        }
    }
}

fn augmented(op: BinaryOp, current: Value, value: &Value) -> EvalResult<Value> {
    // `list += iterable` extends in place
    if let (BinaryOp::Add, Value::List(list)) = (op, &current) {
        let items = operators::iterate(value)?;
        list.borrow_mut()?.extend(items);
        return Ok(current);
    }
    operators::binary(op, &current, value)
}

/// Insert a new key, handing the key back if it was already present
fn insert_unique(map: &mut DictMap, key: Value, value: Value) -> Option<Value> {
    if map.contains_key(&key) {
        return Some(key);
    }
    map.insert(key, value);
    None
}

fn bind_parameters(
    function: &Function,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> EvalResult<Rc<Frame>> {
    let def = &function.def;
    let scope = Frame::new(Some(Rc::clone(&function.closure)));
    let mut slots: Vec<Option<Value>> = vec![None; def.params.len()];
    let positional_count = def.params.iter().filter(|p| !p.keyword_only).count();

    let mut args = args.into_iter();
    for (slot, value) in slots.iter_mut().take(positional_count).zip(args.by_ref()) {
        *slot = Some(value);
    }
    let extra: Vec<Value> = args.collect();
    match &def.varargs {
        Some(name) => scope.set(name, Value::tuple(extra)),
        None if !extra.is_empty() => {
            return Err(EvalError::type_error(format!(
                "{}: got {} arguments, want at most {positional_count}",
                def.name,
                positional_count + extra.len()
            )));
        }
        None => {}
    }

    let mut extra_kwargs = DictMap::default();
    for (name, value) in kwargs {
        if let Some(index) = def.params.iter().position(|p| p.name == name) {
            if slots[index].is_some() {
                return Err(EvalError::type_error(format!(
                    "{}: got multiple values for parameter {name}",
                    def.name
                )));
            }
            slots[index] = Some(value);
        } else if def.kwargs.is_some() {
            if insert_unique(&mut extra_kwargs, Value::string(name.as_str()), value).is_some() {
                return Err(EvalError::type_error(format!(
                    "{}: got multiple values for keyword argument {name}",
                    def.name
                )));
            }
        } else {
            return Err(EvalError::type_error(format!(
                "{}: unexpected keyword argument {name}",
                def.name
            )));
        }
    }
    if let Some(name) = &def.kwargs {
        scope.set(name, Value::Dict(Rc::new(Dict::new(extra_kwargs))));
    }

    for ((param, slot), default) in def.params.iter().zip(slots).zip(&function.defaults) {
        let value = match (slot, default) {
            (Some(value), _) => value,
            (None, Some(default)) => default.clone(),
            (None, None) => {
                return Err(EvalError::type_error(format!(
                    "{}: missing argument for {}",
                    def.name, param.name
                )));
            }
        };
        scope.set(&param.name, value);
    }
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Program, RuntimeError, parse};

    fn run(source: &str, dialect: Dialect) -> Result<Globals> {
        let program = parse("test.star", source)?.compile(&dialect)?;
        let mut thread = Thread::new("test");
        program.init(&mut thread, &Globals::new()).into_result()
    }

    struct MapLoader(FxIndexMap<String, Globals>);

    impl Loader for MapLoader {
        fn load(&mut self, module: &str) -> Result<Globals> {
            self.0
                .get(module)
                .cloned()
                .ok_or_else(|| RuntimeError::load(module, std::io::Error::other("not found")))
        }
    }

    #[test]
    fn test_closures_capture_defining_scope() {
        let globals = run(
            "def adder(n):\n    return lambda x: x + n\nadd2 = adder(2)\nresult = add2(40)\n",
            Dialect::default(),
        )
        .expect("program should run");
        assert_eq!(globals.get("result"), Some(&Value::Int(42)));
    }

    #[test]
    fn test_keyword_and_default_arguments() {
        let globals = run(
            "def f(a, b = 10, *args, c = 3, **kwargs):\n    return [a, b, args, c, kwargs]\nr = f(1, c = 5, d = 6)\n",
            Dialect::default(),
        )
        .expect("program should run");
        assert_eq!(
            globals.get("r").map(Value::repr).as_deref(),
            Some(r#"[1, 10, (), 5, {"d": 6}]"#)
        );
    }

    #[test]
    fn test_recursion_is_rejected_without_dialect_flag() {
        let source = "def f(n):\n    return 0 if n == 0 else f(n - 1)\nx = f(3)\n";
        let err = run(source, Dialect::default()).expect_err("recursion should fail");
        assert_eq!(err.kind(), Some(ErrorKind::Recursion));

        let dialect = Dialect {
            allow_recursion: true,
            ..Dialect::default()
        };
        let globals = run(source, dialect).expect("recursion allowed");
        assert_eq!(globals.get("x"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_unbounded_recursion_hits_depth_limit() {
        let dialect = Dialect {
            allow_recursion: true,
            ..Dialect::default()
        };
        let err = run("def f():\n    return f()\nf()\n", dialect).expect_err("should overflow");
        assert_eq!(err.kind(), Some(ErrorKind::Recursion));
    }

    #[test]
    fn test_load_bindings_are_file_local() {
        let mut lib = Globals::new();
        lib.insert("PI", Value::Float(3.0));
        let mut loader = MapLoader(FxIndexMap::from_iter([("lib".to_owned(), lib)]));

        let program = parse("main.star", "load(\"lib\", pi = \"PI\")\ntwo_pi = pi * 2\n")
            .and_then(|module| module.compile(&Dialect::default()))
            .expect("compiles");
        let mut thread = Thread::new("exec main").with_loader(&mut loader);
        let globals = program
            .init(&mut thread, &Globals::new())
            .into_result()
            .expect("runs");

        assert_eq!(globals.names().collect::<Vec<_>>(), vec!["two_pi"]);
        assert_eq!(globals.get("two_pi"), Some(&Value::Float(6.0)));
    }

    #[test]
    fn test_missing_loaded_symbol() {
        let mut loader = MapLoader(FxIndexMap::from_iter([("lib".to_owned(), Globals::new())]));
        let program = parse("main.star", "load(\"lib\", \"missing\")\n")
            .and_then(|module| module.compile(&Dialect::default()))
            .expect("compiles");
        let mut thread = Thread::new("exec main").with_loader(&mut loader);
        let err = program
            .init(&mut thread, &Globals::new())
            .into_result()
            .expect_err("missing symbol");
        assert_eq!(err.kind(), Some(ErrorKind::Load));
        assert!(err.to_string().contains("missing"), "{err}");
    }

    #[test]
    fn test_error_stack_names_active_functions() {
        let err = run(
            "def inner():\n    return {}[\"k\"]\ndef outer():\n    return inner()\nouter()\n",
            Dialect::default(),
        )
        .expect_err("lookup should fail");
        assert_eq!(err.kind(), Some(ErrorKind::Lookup));
        assert!(err.to_string().ends_with("(in outer -> inner)"), "{err}");
    }

    #[test]
    fn test_comprehensions() {
        let globals = run(
            "squares = [x * x for x in range(5) if x % 2 == 0]\nindex = {k: v for v, k in enumerate([\"a\", \"b\"])}\n",
            Dialect::default(),
        )
        .expect("program should run");
        assert_eq!(globals.get("squares").map(Value::repr).as_deref(), Some("[0, 4, 16]"));
        assert_eq!(
            globals.get("index").map(Value::repr).as_deref(),
            Some(r#"{"a": 0, "b": 1}"#)
        );
    }

    #[test]
    fn test_print_handler_receives_output() {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&lines);
        let program = parse("p.star", "print(\"a\", 1)\n")
            .and_then(|module| module.compile(&Dialect::default()))
            .expect("compiles");
        let mut thread = Thread::new("print").with_print_handler(Rc::new(move |line: &str| {
            sink.borrow_mut().push(line.to_owned());
        }));
        program
            .init(&mut thread, &Globals::new())
            .into_result()
            .expect("runs");
        assert_eq!(*lines.borrow(), vec!["a 1".to_owned()]);
    }
}
