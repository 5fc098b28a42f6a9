//! Runtime values
//!
//! Scalars are stored inline; lists, dicts and sets are shared through `Rc`
//! and carry a frozen flag that [`Globals::freeze`] sets once a module has
//! finished executing.

use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use crate::{
    builtins::{Builtin, NativeModule},
    Dialect, FxIndexMap,
    error::EvalError,
    eval::Frame,
    ir::FunctionDef,
};

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    List(Rc<List>),
    Tuple(Rc<[Value]>),
    Dict(Rc<Dict>),
    Set(Rc<Set>),
    Function(Rc<Function>),
    Builtin(Builtin),
    Method(Rc<BoundMethod>),
    Module(Rc<NativeModule>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into())
    }

    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(List::new(items)))
    }

    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(items.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::Function(_) => "function",
            Self::Builtin(_) | Self::Method(_) => "builtin_function_or_method",
            Self::Module(_) => "module",
        }
    }

    /// Truth value used by `if`, `and`, `or` and `not`
    pub fn truth(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::List(list) => !list.borrow().is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::Dict(dict) => !dict.borrow().is_empty(),
            Self::Set(set) => !set.borrow().is_empty(),
            Self::Function(_) | Self::Builtin(_) | Self::Method(_) | Self::Module(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(dict) => Some(dict.as_ref()),
            _ => None,
        }
    }

    /// Whether two values are the same object rather than merely equal
    pub fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Method(a), Self::Method(b)) => Rc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => Rc::ptr_eq(a, b),
            (Self::String(a), Self::String(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => self == other,
        }
    }

    pub fn is_hashable(&self) -> bool {
        match self {
            Self::List(_) | Self::Dict(_) | Self::Set(_) => false,
            Self::Tuple(items) => items.iter().all(Self::is_hashable),
            _ => true,
        }
    }

    pub(crate) fn check_hashable(&self) -> Result<(), EvalError> {
        if self.is_hashable() {
            Ok(())
        } else {
            Err(EvalError::type_error(format!(
                "unhashable type: {}",
                self.type_name()
            )))
        }
    }

    /// Make this value and everything reachable from it immutable
    pub fn freeze(&self) {
        match self {
            Self::List(list) => {
                if !list.frozen.replace(true) {
                    for item in list.borrow().iter() {
                        item.freeze();
                    }
                }
            }
            Self::Dict(dict) => {
                if !dict.frozen.replace(true) {
                    for (key, value) in dict.borrow().iter() {
                        key.freeze();
                        value.freeze();
                    }
                }
            }
            Self::Set(set) => {
                set.frozen.set(true);
            }
            Self::Tuple(items) => {
                for item in items.iter() {
                    item.freeze();
                }
            }
            Self::Method(method) => method.receiver.freeze(),
            _ => {}
        }
    }

    /// Ordering used by `<`, `sorted`, `min` and `max`
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Tuple(a), Self::Tuple(b)) => compare_sequences(a, b),
            (Self::List(a), Self::List(b)) => compare_sequences(&a.borrow(), &b.borrow()),
            _ => None,
        }
    }

    /// The `repr()` form: strings are quoted
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out);
        out
    }

    fn write_repr(&self, out: &mut String) {
        match self {
            Self::String(s) => out.push_str(&format!("{:?}", &**s)),
            Self::List(list) => {
                out.push('[');
                write_items(out, list.borrow().iter());
                out.push(']');
            }
            Self::Tuple(items) => {
                out.push('(');
                write_items(out, items.iter());
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Self::Dict(dict) => {
                out.push('{');
                for (index, (key, value)) in dict.borrow().iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out);
                    out.push_str(": ");
                    value.write_repr(out);
                }
                out.push('}');
            }
            Self::Set(set) => {
                out.push_str("set([");
                write_items(out, set.borrow().iter());
                out.push_str("])");
            }
            other => out.push_str(&other.to_string()),
        }
    }
}

fn write_items<'a>(out: &mut String, items: impl Iterator<Item = &'a Value>) {
    for (index, item) in items.enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        item.write_repr(out);
    }
}

fn compare_sequences(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        match x.compare(y)? {
            Ordering::Equal => {}
            other => return Some(other),
        }
    }
    Some(a.len().cmp(&b.len()))
}

pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else if f.is_nan() {
        "nan".to_owned()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "+" } else { "-" };
        format!("{sign}inf")
    } else {
        format!("{f}")
    }
}

/// The `str()` form
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => f.write_str(&format_float(*x)),
            Self::String(s) => f.write_str(s),
            Self::Function(function) => write!(f, "<function {}>", function.name()),
            Self::Builtin(builtin) => write!(f, "<built-in function {}>", builtin.name()),
            Self::Method(method) => write!(
                f,
                "<built-in method {} of {} value>",
                method.name,
                method.receiver.type_name()
            ),
            Self::Module(module) => write!(f, "<module {}>", module.name),
            Self::List(_) | Self::Tuple(_) | Self::Dict(_) | Self::Set(_) => {
                f.write_str(&self.repr())
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl PartialEq for Value {
    #[allow(clippy::cast_precision_loss)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Self::Dict(a), Self::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Self::Set(a), Self::Set(b)) => {
                Rc::ptr_eq(a, b) || {
                    let (a, b) = (a.borrow(), b.borrow());
                    a.len() == b.len() && a.iter().all(|item| b.contains(item))
                }
            }
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Method(a), Self::Method(b)) => Rc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::None => 0u8.hash(state),
            Self::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Self::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Self::Float(f) => {
                // Integral floats hash like the equal int so `1 == 1.0` keys collide.
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    2u8.hash(state);
                    (*f as i64).hash(state);
                } else {
                    3u8.hash(state);
                    f.to_bits().hash(state);
                }
            }
            Self::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Self::Tuple(items) => {
                5u8.hash(state);
                for item in items.iter() {
                    item.hash(state);
                }
            }
            Self::Builtin(builtin) => {
                6u8.hash(state);
                builtin.hash(state);
            }
            Self::Module(module) => {
                7u8.hash(state);
                module.name.hash(state);
            }
            Self::Function(f) => std::ptr::hash(Rc::as_ptr(f), state),
            Self::Method(m) => std::ptr::hash(Rc::as_ptr(m), state),
            Self::List(l) => std::ptr::hash(Rc::as_ptr(l), state),
            Self::Dict(d) => std::ptr::hash(Rc::as_ptr(d), state),
            Self::Set(s) => std::ptr::hash(Rc::as_ptr(s), state),
        }
    }
}

#[derive(Default)]
pub struct List {
    items: RefCell<Vec<Value>>,
    frozen: Cell<bool>,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: RefCell::new(items),
            frozen: Cell::new(false),
        }
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.items.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> Result<RefMut<'_, Vec<Value>>, EvalError> {
        if self.frozen.get() {
            return Err(EvalError::frozen("list"));
        }
        Ok(self.items.borrow_mut())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }
}

pub(crate) type DictMap = FxIndexMap<Value, Value>;

#[derive(Default)]
pub struct Dict {
    entries: RefCell<DictMap>,
    frozen: Cell<bool>,
}

impl Dict {
    pub(crate) fn new(entries: DictMap) -> Self {
        Self {
            entries: RefCell::new(entries),
            frozen: Cell::new(false),
        }
    }

    pub fn borrow(&self) -> Ref<'_, FxIndexMap<Value, Value>> {
        self.entries.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> Result<RefMut<'_, DictMap>, EvalError> {
        if self.frozen.get() {
            return Err(EvalError::frozen("dict"));
        }
        Ok(self.entries.borrow_mut())
    }

    /// Look up a string key
    pub fn get_str(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(&Value::string(key)).cloned()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }
}

pub(crate) type SetItems = IndexSet<Value, FxBuildHasher>;

#[derive(Default)]
pub struct Set {
    items: RefCell<SetItems>,
    frozen: Cell<bool>,
}

impl Set {
    pub(crate) fn new(items: SetItems) -> Self {
        Self {
            items: RefCell::new(items),
            frozen: Cell::new(false),
        }
    }

    pub fn borrow(&self) -> Ref<'_, IndexSet<Value, FxBuildHasher>> {
        self.items.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> Result<RefMut<'_, SetItems>, EvalError> {
        if self.frozen.get() {
            return Err(EvalError::frozen("set"));
        }
        Ok(self.items.borrow_mut())
    }
}

/// A user-defined function closed over the scope it was defined in
pub struct Function {
    pub(crate) def: Rc<FunctionDef>,
    pub(crate) defaults: Vec<Option<Value>>,
    pub(crate) closure: Rc<Frame>,
    pub(crate) dialect: Dialect,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.def.name
    }
}

/// A builtin method bound to its receiver, e.g. `items.append`
pub struct BoundMethod {
    pub(crate) receiver: Value,
    pub(crate) name: String,
}

/// The bindings produced by executing a module
#[derive(Clone, Default)]
pub struct Globals {
    bindings: FxIndexMap<String, Value>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Names in binding order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Deep-freeze every value bound in this module
    pub fn freeze(&self) {
        for value in self.bindings.values() {
            value.freeze();
        }
    }
}

impl fmt::Debug for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.bindings.iter()).finish()
    }
}

impl FromIterator<(String, Value)> for Globals {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl Extend<(String, Value)> for Globals {
    fn extend<T: IntoIterator<Item = (String, Value)>>(&mut self, iter: T) {
        self.bindings.extend(iter);
    }
}
