//! Builtin functions and the native `math`, `json` and `time` modules

mod json;
mod time;

use std::{cmp::Ordering, rc::Rc};

use crate::{
    Dialect, FxIndexMap,
    error::{ErrorKind, EvalError},
    eval::{EvalResult, Evaluator},
    methods, operators,
    value::{Dict, DictMap, Set, SetItems, Value},
};

/// A function implemented by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Abs,
    All,
    Any,
    Bool,
    Dict,
    Dir,
    Enumerate,
    Fail,
    Float,
    GetAttr,
    HasAttr,
    Int,
    Len,
    List,
    Max,
    Min,
    Print,
    Range,
    Repr,
    Reversed,
    Set,
    Sorted,
    Str,
    Tuple,
    Type,
    Zip,
    MathCeil,
    MathFabs,
    MathFloor,
    MathPow,
    MathSqrt,
    JsonEncode,
    JsonDecode,
    JsonIndent,
    TimeNow,
    TimeParseDuration,
    TimeParseTime,
}

/// Builtins bound in every module's universe
const UNIVERSE: [Builtin; 26] = [
    Builtin::Abs,
    Builtin::All,
    Builtin::Any,
    Builtin::Bool,
    Builtin::Dict,
    Builtin::Dir,
    Builtin::Enumerate,
    Builtin::Fail,
    Builtin::Float,
    Builtin::GetAttr,
    Builtin::HasAttr,
    Builtin::Int,
    Builtin::Len,
    Builtin::List,
    Builtin::Max,
    Builtin::Min,
    Builtin::Print,
    Builtin::Range,
    Builtin::Repr,
    Builtin::Reversed,
    Builtin::Set,
    Builtin::Sorted,
    Builtin::Str,
    Builtin::Tuple,
    Builtin::Type,
    Builtin::Zip,
];

impl Builtin {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::All => "all",
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Dict => "dict",
            Self::Dir => "dir",
            Self::Enumerate => "enumerate",
            Self::Fail => "fail",
            Self::Float => "float",
            Self::GetAttr => "getattr",
            Self::HasAttr => "hasattr",
            Self::Int => "int",
            Self::Len => "len",
            Self::List => "list",
            Self::Max => "max",
            Self::Min => "min",
            Self::Print => "print",
            Self::Range => "range",
            Self::Repr => "repr",
            Self::Reversed => "reversed",
            Self::Set => "set",
            Self::Sorted => "sorted",
            Self::Str => "str",
            Self::Tuple => "tuple",
            Self::Type => "type",
            Self::Zip => "zip",
            Self::MathCeil => "ceil",
            Self::MathFabs => "fabs",
            Self::MathFloor => "floor",
            Self::MathPow => "pow",
            Self::MathSqrt => "sqrt",
            Self::JsonEncode => "encode",
            Self::JsonDecode => "decode",
            Self::JsonIndent => "indent",
            Self::TimeNow => "now",
            Self::TimeParseDuration => "parse_duration",
            Self::TimeParseTime => "parse_time",
        }
    }
}

/// A module implemented by the runtime, such as `math`
#[derive(Debug)]
pub struct NativeModule {
    pub(crate) name: String,
    members: FxIndexMap<String, Value>,
}

impl NativeModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<Value> {
        self.members.get(name).cloned()
    }

    pub(crate) fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }
}

impl NativeModule {
    fn new(
        name: &str,
        functions: &[Builtin],
        constants: impl IntoIterator<Item = (&'static str, f64)>,
    ) -> Self {
        let mut members: FxIndexMap<String, Value> = functions
            .iter()
            .map(|f| (f.name().to_owned(), Value::Builtin(*f)))
            .collect();
        for (constant, value) in constants {
            members.insert(constant.to_owned(), Value::Float(value));
        }
        Self {
            name: name.to_owned(),
            members,
        }
    }
}

fn native_module(name: &str) -> Option<NativeModule> {
    Some(match name {
        "math" => NativeModule::new(
            name,
            &[
                Builtin::MathCeil,
                Builtin::MathFabs,
                Builtin::MathFloor,
                Builtin::MathPow,
                Builtin::MathSqrt,
            ],
            [("e", std::f64::consts::E), ("pi", std::f64::consts::PI)],
        ),
        "json" => NativeModule::new(name, &json::FUNCTIONS, []),
        "time" => NativeModule::new(name, &time::FUNCTIONS, time::UNITS),
        _ => return None,
    })
}

/// Resolve a name that no enclosing scope binds
pub(crate) fn universe(name: &str, dialect: &Dialect) -> Option<Value> {
    if let Some(module) = native_module(name) {
        return Some(Value::Module(Rc::new(module)));
    }
    let builtin = UNIVERSE.into_iter().find(|b| b.name() == name)?;
    if builtin == Builtin::Set && !dialect.allow_set {
        return None;
    }
    Some(Value::Builtin(builtin))
}

/// Reject keyword arguments and check the positional count
pub(crate) fn check_args(
    name: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
    min: usize,
    max: usize,
) -> EvalResult<()> {
    if let Some((key, _)) = kwargs.first() {
        return Err(EvalError::type_error(format!(
            "{name}: unexpected keyword argument {key}"
        )));
    }
    if args.len() < min {
        return Err(EvalError::type_error(format!(
            "{name}: got {} arguments, want at least {min}",
            args.len()
        )));
    }
    if args.len() > max {
        return Err(EvalError::type_error(format!(
            "{name}: got {} arguments, want at most {max}",
            args.len()
        )));
    }
    Ok(())
}

/// Remove a named keyword argument
pub(crate) fn take_kwarg(kwargs: &mut Vec<(String, Value)>, key: &str) -> Option<Value> {
    let at = kwargs.iter().position(|(name, _)| name == key)?;
    Some(kwargs.remove(at).1)
}

pub(crate) fn string_arg<'v>(name: &str, value: &'v Value) -> EvalResult<&'v str> {
    value.as_str().ok_or_else(|| {
        EvalError::type_error(format!(
            "{name}: got {}, want string",
            value.type_name()
        ))
    })
}

pub(crate) fn int_arg(name: &str, value: &Value) -> EvalResult<i64> {
    value.as_int().ok_or_else(|| {
        EvalError::type_error(format!("{name}: got {}, want int", value.type_name()))
    })
}

fn number_arg(name: &str, value: &Value) -> EvalResult<f64> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(EvalError::type_error(format!(
            "{name}: got {}, want float or int",
            other.type_name()
        ))),
    }
}

fn joined(args: &[Value], sep: &str) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

fn separator(name: &str, kwargs: &mut Vec<(String, Value)>) -> EvalResult<String> {
    let sep = match take_kwarg(kwargs, "sep") {
        Some(sep) => string_arg(name, &sep)?.to_owned(),
        None => " ".to_owned(),
    };
    check_args(name, &[], kwargs, 0, 0)?;
    Ok(sep)
}

/// Convert a finite float to an int, truncating towards zero
fn float_to_int(f: f64) -> EvalResult<i64> {
    if !f.is_finite() || f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return Err(EvalError::value(format!(
            "cannot convert float {} to integer",
            crate::value::format_float(f)
        )));
    }
    Ok(f.trunc() as i64)
}

pub(crate) fn call(
    eval: &mut Evaluator<'_, '_>,
    builtin: Builtin,
    args: Vec<Value>,
    mut kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    let name = builtin.name();
    match builtin {
        Builtin::Print => {
            let sep = separator(name, &mut kwargs)?;
            eval.thread().print(&joined(&args, &sep));
            Ok(Value::None)
        }
        Builtin::Fail => {
            let sep = separator(name, &mut kwargs)?;
            Err(EvalError::new(ErrorKind::Fail, joined(&args, &sep)))
        }
        Builtin::Sorted => sorted(eval, args, kwargs),
        Builtin::Min | Builtin::Max => extreme(eval, builtin, args, kwargs),
        Builtin::Dict => dict(args, kwargs),
        Builtin::Enumerate => enumerate(args, kwargs),
        Builtin::JsonEncode | Builtin::JsonDecode | Builtin::JsonIndent => {
            json::call(builtin, &args, kwargs)
        }
        Builtin::TimeNow | Builtin::TimeParseDuration | Builtin::TimeParseTime => {
            time::call(builtin, &args, &kwargs)
        }
        _ => {
            let max = match builtin {
                Builtin::Range => 3,
                Builtin::GetAttr => 3,
                Builtin::HasAttr | Builtin::MathPow => 2,
                Builtin::Zip => usize::MAX,
                _ => 1,
            };
            let min = match builtin {
                Builtin::Bool
                | Builtin::Dir
                | Builtin::Float
                | Builtin::Int
                | Builtin::List
                | Builtin::Set
                | Builtin::Tuple
                | Builtin::Zip => 0,
                Builtin::GetAttr | Builtin::HasAttr | Builtin::MathPow => 2,
                _ => 1,
            };
            check_args(name, &args, &kwargs, min, max)?;
            call_positional(builtin, args)
        }
    }
}

fn call_positional(builtin: Builtin, args: Vec<Value>) -> EvalResult<Value> {
    let name = builtin.name();
    let first = args.first().cloned().unwrap_or(Value::None);
    Ok(match builtin {
        Builtin::Len => Value::Int(length(&first)? as i64),
        Builtin::Str => match first {
            Value::String(_) => first,
            other => Value::string(other.to_string()),
        },
        Builtin::Repr => Value::string(first.repr()),
        Builtin::Type => Value::string(first.type_name()),
        Builtin::Bool => Value::Bool(first.truth()),
        Builtin::Int if args.is_empty() => Value::Int(0),
        Builtin::Int => int(&first)?,
        Builtin::Float if args.is_empty() => Value::Float(0.0),
        Builtin::Float => float(&first)?,
        Builtin::List if args.is_empty() => Value::list(Vec::new()),
        Builtin::List => Value::list(operators::iterate(&first)?),
        Builtin::Tuple if args.is_empty() => Value::tuple(Vec::new()),
        Builtin::Tuple => Value::tuple(operators::iterate(&first)?),
        Builtin::Set => {
            let mut items = SetItems::default();
            if !args.is_empty() {
                for item in operators::iterate(&first)? {
                    item.check_hashable()?;
                    items.insert(item);
                }
            }
            Value::Set(Rc::new(Set::new(items)))
        }
        Builtin::Range => range(&args)?,
        Builtin::Reversed => {
            let mut items = operators::iterate(&first)?;
            items.reverse();
            Value::list(items)
        }
        Builtin::Zip => {
            let columns = args
                .iter()
                .map(operators::iterate)
                .collect::<EvalResult<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            Value::list(
                (0..rows)
                    .map(|row| Value::tuple(columns.iter().map(|c| c[row].clone()).collect()))
                    .collect(),
            )
        }
        Builtin::Abs => abs(&first)?,
        Builtin::Any => Value::Bool(operators::iterate(&first)?.iter().any(Value::truth)),
        Builtin::All => Value::Bool(operators::iterate(&first)?.iter().all(Value::truth)),
        Builtin::HasAttr => {
            let attr = string_arg(name, &args[1])?;
            Value::Bool(methods::attribute(first, attr).is_ok())
        }
        Builtin::GetAttr => {
            let attr = string_arg(name, &args[1])?;
            match (methods::attribute(first, attr), args.get(2)) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.clone(),
                (Err(err), None) => return Err(err),
            }
        }
        Builtin::Dir => Value::list(
            methods::attribute_names(&first)
                .into_iter()
                .map(Value::string)
                .collect(),
        ),
        Builtin::MathSqrt => Value::Float(number_arg(name, &first)?.sqrt()),
        Builtin::MathFabs => Value::Float(number_arg(name, &first)?.abs()),
        Builtin::MathFloor => Value::Int(float_to_int(number_arg(name, &first)?.floor())?),
        Builtin::MathCeil => Value::Int(float_to_int(number_arg(name, &first)?.ceil())?),
        Builtin::MathPow => {
            Value::Float(number_arg(name, &first)?.powf(number_arg(name, &args[1])?))
        }
        Builtin::Print
        | Builtin::Fail
        | Builtin::Sorted
        | Builtin::Min
        | Builtin::Max
        | Builtin::Dict
        | Builtin::Enumerate
        | Builtin::JsonEncode
        | Builtin::JsonDecode
        | Builtin::JsonIndent
        | Builtin::TimeNow
        | Builtin::TimeParseDuration
        | Builtin::TimeParseTime => {
            return Err(EvalError::type_error(format!("{name}: unsupported call form")));
        }
    })
}

fn abs(value: &Value) -> EvalResult<Value> {
    Ok(match value {
        Value::Int(i) => Value::Int(
            i.checked_abs()
                .ok_or_else(|| EvalError::value("integer overflow in abs"))?,
        ),
        Value::Float(f) => Value::Float(f.abs()),
        other => {
            return Err(EvalError::type_error(format!(
                "abs: got {}, want int or float",
                other.type_name()
            )));
        }
    })
}

fn length(value: &Value) -> EvalResult<usize> {
    Ok(match value {
        Value::String(s) => s.chars().count(),
        Value::List(list) => list.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(dict) => dict.borrow().len(),
        Value::Set(set) => set.borrow().len(),
        other => {
            return Err(EvalError::type_error(format!(
                "len: value of type {} has no len",
                other.type_name()
            )));
        }
    })
}

fn int(value: &Value) -> EvalResult<Value> {
    Ok(Value::Int(match value {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        Value::Float(f) => float_to_int(*f)?,
        Value::String(s) => {
            let text = s.trim();
            let (digits, radix) = match text.get(..2) {
                Some("0x" | "0X") => (&text[2..], 16),
                Some("0o" | "0O") => (&text[2..], 8),
                Some("0b" | "0B") => (&text[2..], 2),
                _ => (text, 10),
            };
            i64::from_str_radix(&digits.replace('_', ""), radix).map_err(|_| {
                EvalError::value(format!("int: invalid literal with base {radix}: {s:?}"))
            })?
        }
        other => {
            return Err(EvalError::type_error(format!(
                "int: cannot convert {} to int",
                other.type_name()
            )));
        }
    }))
}

fn float(value: &Value) -> EvalResult<Value> {
    Ok(Value::Float(match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EvalError::value(format!("invalid float literal: {s}")))?,
        other => {
            return Err(EvalError::type_error(format!(
                "float: cannot convert {} to float",
                other.type_name()
            )));
        }
    }))
}

fn range(args: &[Value]) -> EvalResult<Value> {
    let ints = args
        .iter()
        .map(|arg| int_arg("range", arg))
        .collect::<EvalResult<Vec<_>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(EvalError::type_error("range: want 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(EvalError::value("range: step argument must not be zero"));
    }
    let mut items = Vec::new();
    let mut at = start;
    while (step > 0 && at < stop) || (step < 0 && at > stop) {
        items.push(Value::Int(at));
        at = match at.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::list(items))
}

fn enumerate(args: Vec<Value>, mut kwargs: Vec<(String, Value)>) -> EvalResult<Value> {
    let start = take_kwarg(&mut kwargs, "start");
    check_args("enumerate", &args, &kwargs, 1, 2)?;
    let start = match start.as_ref().or_else(|| args.get(1)) {
        Some(start) => int_arg("enumerate", start)?,
        None => 0,
    };
    let items = operators::iterate(&args[0])?;
    let mut out = Vec::with_capacity(items.len());
    for (offset, item) in items.into_iter().enumerate() {
        let index = start
            .checked_add(offset as i64)
            .ok_or_else(|| EvalError::value("enumerate: index overflow"))?;
        out.push(Value::tuple(vec![Value::Int(index), item]));
    }
    Ok(Value::list(out))
}

fn dict(args: Vec<Value>, kwargs: Vec<(String, Value)>) -> EvalResult<Value> {
    check_args("dict", &args, &[], 0, 1)?;
    let mut entries = DictMap::default();
    if let Some(source) = args.first() {
        update_entries(&mut entries, source)?;
    }
    for (key, value) in kwargs {
        entries.insert(Value::string(key), value);
    }
    Ok(Value::Dict(Rc::new(Dict::new(entries))))
}

/// Merge a dict or an iterable of pairs into `entries`
pub(crate) fn update_entries(entries: &mut DictMap, source: &Value) -> EvalResult<()> {
    if let Value::Dict(other) = source {
        for (key, value) in other.borrow().iter() {
            entries.insert(key.clone(), value.clone());
        }
        return Ok(());
    }
    for pair in operators::iterate(source)? {
        let items = operators::iterate(&pair)?;
        let [key, value] = <[Value; 2]>::try_from(items).map_err(|items| {
            EvalError::value(format!(
                "dictionary update sequence element has length {}, want 2",
                items.len()
            ))
        })?;
        key.check_hashable()?;
        entries.insert(key, value);
    }
    Ok(())
}

fn key_function(name: &str, kwargs: &mut Vec<(String, Value)>) -> EvalResult<Option<Value>> {
    let key = take_kwarg(kwargs, "key").filter(|key| !matches!(key, Value::None));
    check_args(name, &[], kwargs, 0, 0)?;
    Ok(key)
}

/// Pair each item with its sort key
fn keyed(
    eval: &mut Evaluator<'_, '_>,
    items: Vec<Value>,
    key: Option<&Value>,
) -> EvalResult<Vec<(Value, Value)>> {
    items
        .into_iter()
        .map(|item| {
            let sort_key = match key {
                Some(key) => eval.call(key, vec![item.clone()], Vec::new())?,
                None => item.clone(),
            };
            Ok((sort_key, item))
        })
        .collect()
}

fn incomparable(name: &str, a: &Value, b: &Value) -> EvalError {
    EvalError::type_error(format!(
        "{name}: cannot compare {} with {}",
        a.type_name(),
        b.type_name()
    ))
}

fn sorted(
    eval: &mut Evaluator<'_, '_>,
    args: Vec<Value>,
    mut kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    let reverse = take_kwarg(&mut kwargs, "reverse").is_some_and(|r| r.truth());
    let key = key_function("sorted", &mut kwargs)?;
    check_args("sorted", &args, &[], 1, 1)?;
    let mut pairs = keyed(eval, operators::iterate(&args[0])?, key.as_ref())?;

    let mut error = None;
    pairs.sort_by(|(a, _), (b, _)| {
        let ordering = if reverse { b.compare(a) } else { a.compare(b) };
        ordering.unwrap_or_else(|| {
            error.get_or_insert_with(|| incomparable("sorted", a, b));
            Ordering::Equal
        })
    });
    if let Some(err) = error {
        return Err(err);
    }
    Ok(Value::list(pairs.into_iter().map(|(_, item)| item).collect()))
}

fn extreme(
    eval: &mut Evaluator<'_, '_>,
    builtin: Builtin,
    args: Vec<Value>,
    mut kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    let name = builtin.name();
    let key = key_function(name, &mut kwargs)?;
    check_args(name, &args, &[], 1, usize::MAX)?;
    let items = match <[Value; 1]>::try_from(args) {
        Ok([iterable]) => operators::iterate(&iterable)?,
        Err(args) => args,
    };
    let wanted = if builtin == Builtin::Min {
        Ordering::Less
    } else {
        Ordering::Greater
    };

    let mut best: Option<(Value, Value)> = None;
    for (sort_key, item) in keyed(eval, items, key.as_ref())? {
        best = match best {
            None => Some((sort_key, item)),
            Some((best_key, best_item)) => {
                let ordering = sort_key
                    .compare(&best_key)
                    .ok_or_else(|| incomparable(name, &sort_key, &best_key))?;
                if ordering == wanted {
                    Some((sort_key, item))
                } else {
                    Some((best_key, best_item))
                }
            }
        };
    }
    best.map(|(_, item)| item)
        .ok_or_else(|| EvalError::value(format!("{name}: argument is an empty sequence")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Globals, Program, Thread, parse};

    fn eval_globals(source: &str) -> Globals {
        let dialect = Dialect {
            allow_set: true,
            ..Dialect::default()
        };
        let program: Program = parse("builtins.star", source)
            .and_then(|module| module.compile(&dialect))
            .expect("compiles");
        let mut thread = Thread::new("builtins");
        program
            .init(&mut thread, &Globals::new())
            .into_result()
            .expect("runs")
    }

    fn repr_of(globals: &Globals, name: &str) -> String {
        globals.get(name).map(Value::repr).unwrap_or_default()
    }

    #[test]
    fn test_sequence_builtins() {
        let globals = eval_globals(
            "r = range(1, 10, 3)\ns = sorted([3, 1, 2], reverse = True)\nk = sorted([\"bb\", \"a\"], key = len)\nz = zip([1, 2], (\"a\", \"b\", \"c\"))\ne = enumerate([\"x\"], 1)\n",
        );
        assert_eq!(repr_of(&globals, "r"), "[1, 4, 7]");
        assert_eq!(repr_of(&globals, "s"), "[3, 2, 1]");
        assert_eq!(repr_of(&globals, "k"), r#"["a", "bb"]"#);
        assert_eq!(repr_of(&globals, "z"), r#"[(1, "a"), (2, "b")]"#);
        assert_eq!(repr_of(&globals, "e"), r#"[(1, "x")]"#);
    }

    #[test]
    fn test_conversions() {
        let globals = eval_globals(
            "i = int(\"0x1f\")\nt = int(-2.7)\nf = float(\"1.5\")\nb = bool([])\nd = dict([(\"a\", 1)], b = 2)\n",
        );
        assert_eq!(repr_of(&globals, "i"), "31");
        assert_eq!(repr_of(&globals, "t"), "-2");
        assert_eq!(repr_of(&globals, "f"), "1.5");
        assert_eq!(repr_of(&globals, "b"), "False");
        assert_eq!(repr_of(&globals, "d"), r#"{"a": 1, "b": 2}"#);
    }

    #[test]
    fn test_min_max_and_math() {
        let globals = eval_globals(
            "lo = min(3, 1, 2)\nhi = max([\"a\", \"ccc\", \"bb\"], key = len)\nroot = math.sqrt(16)\nfl = math.floor(2.5)\n",
        );
        assert_eq!(repr_of(&globals, "lo"), "1");
        assert_eq!(repr_of(&globals, "hi"), r#""ccc""#);
        assert_eq!(repr_of(&globals, "root"), "4.0");
        assert_eq!(repr_of(&globals, "fl"), "2");
    }

    #[test]
    fn test_json_module() {
        let globals = eval_globals(
            "text = json.encode({\"a\": [1, 2.5, None, True], \"b\": (\"x\",)})\nback = json.decode(text)\nnums = json.decode(\"[1, 1.0, -3e2]\")\npretty = json.indent('{\"k\": [1]}', indent = \"  \")\n",
        );
        assert_eq!(
            globals.get("text").and_then(Value::as_str),
            Some(r#"{"a":[1,2.5,null,true],"b":["x"]}"#)
        );
        assert_eq!(
            repr_of(&globals, "back"),
            r#"{"a": [1, 2.5, None, True], "b": ["x"]}"#
        );
        assert_eq!(repr_of(&globals, "nums"), "[1, 1.0, -300.0]");
        assert_eq!(
            globals.get("pretty").and_then(Value::as_str),
            Some("{\n  \"k\": [\n    1\n  ]\n}")
        );
    }

    #[test]
    fn test_json_rejects_unencodable_values() {
        let program = parse("json.star", "json.encode({1: 2})\n")
            .and_then(|module| module.compile(&Dialect::default()))
            .expect("compiles");
        let err = program
            .init(&mut Thread::new("json"), &Globals::new())
            .into_result()
            .expect_err("int key");
        assert_eq!(err.kind(), Some(ErrorKind::Type));

        let program = parse("json.star", "json.decode(\"{\")\n")
            .and_then(|module| module.compile(&Dialect::default()))
            .expect("compiles");
        let err = program
            .init(&mut Thread::new("json"), &Globals::new())
            .into_result()
            .expect_err("truncated object");
        assert_eq!(err.kind(), Some(ErrorKind::Value));
    }

    #[test]
    fn test_time_module() {
        let globals = eval_globals(
            "d = time.parse_duration(\"1h30m\")\nh = time.hour\nt = time.parse_time(\"1970-01-02T00:00:01.5Z\")\nnow = time.now()\n",
        );
        assert_eq!(repr_of(&globals, "d"), "5400.0");
        assert_eq!(repr_of(&globals, "t"), "86401.5");
        assert!(matches!(globals.get("now"), Some(Value::Float(now)) if *now > 0.0));
        assert_eq!(repr_of(&globals, "h"), "3600.0");
    }

    #[test]
    fn test_set_builtin_follows_dialect() {
        assert!(universe("set", &Dialect::default()).is_none());
        assert!(
            universe(
                "set",
                &Dialect {
                    allow_set: true,
                    ..Dialect::default()
                }
            )
            .is_some()
        );
        assert!(universe("len", &Dialect::default()).is_some());
    }
}
