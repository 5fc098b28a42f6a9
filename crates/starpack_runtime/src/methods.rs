//! Builtin methods of lists, dicts, strings and sets

use std::{fmt::Write, rc::Rc};

use crate::{
    builtins::{check_args, int_arg, string_arg, update_entries},
    error::EvalError,
    eval::EvalResult,
    operators,
    value::{BoundMethod, DictMap, Set, SetItems, Value},
};

const LIST_METHODS: &[&str] = &[
    "append", "clear", "extend", "index", "insert", "pop", "remove",
];
const DICT_METHODS: &[&str] = &[
    "clear",
    "get",
    "items",
    "keys",
    "pop",
    "setdefault",
    "update",
    "values",
];
const STRING_METHODS: &[&str] = &[
    "count",
    "endswith",
    "find",
    "format",
    "join",
    "lower",
    "lstrip",
    "replace",
    "rstrip",
    "split",
    "startswith",
    "strip",
    "upper",
];
const SET_METHODS: &[&str] = &["add", "discard", "remove", "union"];

fn method_table(value: &Value) -> &'static [&'static str] {
    match value {
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::String(_) => STRING_METHODS,
        Value::Set(_) => SET_METHODS,
        _ => &[],
    }
}

/// Names visible through `dir(value)`, sorted
pub(crate) fn attribute_names(value: &Value) -> Vec<String> {
    let mut names: Vec<String> = match value {
        Value::Module(module) => module.member_names().map(str::to_owned).collect(),
        other => method_table(other).iter().map(|m| (*m).to_owned()).collect(),
    };
    names.sort();
    names
}

/// `value.name`
pub(crate) fn attribute(value: Value, name: &str) -> EvalResult<Value> {
    if let Value::Module(module) = &value {
        return module.member(name).ok_or_else(|| {
            EvalError::type_error(format!("module {} has no .{name} field or method", module.name))
        });
    }
    if method_table(&value).contains(&name) {
        return Ok(Value::Method(Rc::new(BoundMethod {
            receiver: value,
            name: name.to_owned(),
        })));
    }
    Err(EvalError::type_error(format!(
        "{} has no .{name} field or method",
        value.type_name()
    )))
}

pub(crate) fn call(
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    let qualified = format!("{}.{name}", receiver.type_name());
    match receiver {
        Value::List(_) => list_method(receiver, name, &qualified, &args, &kwargs),
        Value::Dict(_) => dict_method(receiver, name, &qualified, &args, kwargs),
        Value::String(s) => string_method(s, name, &qualified, &args, &kwargs),
        Value::Set(_) => set_method(receiver, name, &qualified, &args, &kwargs),
        other => Err(EvalError::type_error(format!(
            "{} has no .{name} method",
            other.type_name()
        ))),
    }
}

fn unknown_method(receiver: &Value, name: &str) -> EvalError {
    EvalError::type_error(format!(
        "{} has no .{name} method",
        receiver.type_name()
    ))
}

/// Resolve a list index for `insert`, clamping like slice bounds
fn clamp_index(index: i64, len: usize) -> usize {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    index.clamp(0, len) as usize
}

fn list_method(
    receiver: &Value,
    name: &str,
    qualified: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> EvalResult<Value> {
    let Value::List(list) = receiver else {
        return Err(unknown_method(receiver, name));
    };
    match name {
        "append" => {
            check_args(qualified, args, kwargs, 1, 1)?;
            list.borrow_mut()?.push(args[0].clone());
        }
        "clear" => {
            check_args(qualified, args, kwargs, 0, 0)?;
            list.borrow_mut()?.clear();
        }
        "extend" => {
            check_args(qualified, args, kwargs, 1, 1)?;
            let items = operators::iterate(&args[0])?;
            list.borrow_mut()?.extend(items);
        }
        "index" => {
            check_args(qualified, args, kwargs, 1, 1)?;
            let position = list.borrow().iter().position(|item| *item == args[0]);
            return position.map(|at| Value::Int(at as i64)).ok_or_else(|| {
                EvalError::value(format!("{qualified}: value {} not in list", args[0].repr()))
            });
        }
        "insert" => {
            check_args(qualified, args, kwargs, 2, 2)?;
            let index = int_arg(qualified, &args[0])?;
            let mut items = list.borrow_mut()?;
            let at = clamp_index(index, items.len());
            items.insert(at, args[1].clone());
        }
        "pop" => {
            check_args(qualified, args, kwargs, 0, 1)?;
            let index = match args.first() {
                Some(index) => int_arg(qualified, index)?,
                None => -1,
            };
            let mut items = list.borrow_mut()?;
            let len = items.len() as i64;
            let at = if index < 0 { index + len } else { index };
            if !(0..len).contains(&at) {
                return Err(EvalError::lookup(format!(
                    "{qualified}: index {index} out of range [{}:{len}]",
                    -len
                )));
            }
            return Ok(items.remove(at as usize));
        }
        "remove" => {
            check_args(qualified, args, kwargs, 1, 1)?;
            let mut items = list.borrow_mut()?;
            let Some(at) = items.iter().position(|item| *item == args[0]) else {
                return Err(EvalError::value(format!(
                    "{qualified}: element {} not found",
                    args[0].repr()
                )));
            };
            items.remove(at);
        }
        _ => return Err(unknown_method(receiver, name)),
    }
    Ok(Value::None)
}

fn dict_method(
    receiver: &Value,
    name: &str,
    qualified: &str,
    args: &[Value],
    kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    let Value::Dict(dict) = receiver else {
        return Err(unknown_method(receiver, name));
    };
    if name != "update" {
        check_args(qualified, &[], &kwargs, 0, 0)?;
    }
    Ok(match name {
        "clear" => {
            check_args(qualified, args, &[], 0, 0)?;
            dict.borrow_mut()?.clear();
            Value::None
        }
        "get" => {
            check_args(qualified, args, &[], 1, 2)?;
            args[0].check_hashable()?;
            dict.borrow()
                .get(&args[0])
                .cloned()
                .or_else(|| args.get(1).cloned())
                .unwrap_or(Value::None)
        }
        "items" => {
            check_args(qualified, args, &[], 0, 0)?;
            Value::list(
                dict.borrow()
                    .iter()
                    .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                    .collect(),
            )
        }
        "keys" => {
            check_args(qualified, args, &[], 0, 0)?;
            Value::list(dict.borrow().keys().cloned().collect())
        }
        "values" => {
            check_args(qualified, args, &[], 0, 0)?;
            Value::list(dict.borrow().values().cloned().collect())
        }
        "pop" => {
            check_args(qualified, args, &[], 1, 2)?;
            args[0].check_hashable()?;
            let removed = dict.borrow_mut()?.shift_remove(&args[0]);
            match (removed, args.get(1)) {
                (Some(value), _) => value,
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(EvalError::lookup(format!(
                        "{qualified}: missing key {}",
                        args[0].repr()
                    )));
                }
            }
        }
        "setdefault" => {
            check_args(qualified, args, &[], 1, 2)?;
            args[0].check_hashable()?;
            if let Some(existing) = dict.borrow().get(&args[0]) {
                return Ok(existing.clone());
            }
            let value = args.get(1).cloned().unwrap_or(Value::None);
            dict.borrow_mut()?.insert(args[0].clone(), value.clone());
            value
        }
        "update" => {
            check_args(qualified, args, &[], 0, 1)?;
            let mut updates = DictMap::default();
            if let Some(source) = args.first() {
                update_entries(&mut updates, source)?;
            }
            for (key, value) in kwargs {
                updates.insert(Value::string(key), value);
            }
            dict.borrow_mut()?.extend(updates);
            Value::None
        }
        _ => return Err(unknown_method(receiver, name)),
    })
}

fn strip_chars<'s>(
    s: &'s str,
    qualified: &str,
    args: &[Value],
    strip: impl Fn(&'s str, &dyn Fn(char) -> bool) -> &'s str,
) -> EvalResult<Value> {
    let stripped = match args.first() {
        None | Some(Value::None) => strip(s, &char::is_whitespace),
        Some(chars) => {
            let chars = string_arg(qualified, chars)?;
            strip(s, &|c: char| chars.contains(c))
        }
    };
    Ok(Value::string(stripped))
}

fn affix_matches(
    qualified: &str,
    pattern: &Value,
    matches: impl Fn(&str) -> bool,
) -> EvalResult<bool> {
    match pattern {
        Value::Tuple(options) => {
            for option in options.iter() {
                if matches(string_arg(qualified, option)?) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Ok(matches(string_arg(qualified, other)?)),
    }
}

fn string_method(
    s: &str,
    name: &str,
    qualified: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> EvalResult<Value> {
    if name == "format" {
        return format(s, args, kwargs).map(Value::string);
    }
    check_args(qualified, &[], kwargs, 0, 0)?;
    Ok(match name {
        "upper" => {
            check_args(qualified, args, &[], 0, 0)?;
            Value::string(s.to_uppercase())
        }
        "lower" => {
            check_args(qualified, args, &[], 0, 0)?;
            Value::string(s.to_lowercase())
        }
        "strip" | "lstrip" | "rstrip" => {
            check_args(qualified, args, &[], 0, 1)?;
            return match name {
                "strip" => strip_chars(s, qualified, args, |s, p| s.trim_matches(p)),
                "lstrip" => strip_chars(s, qualified, args, |s, p| s.trim_start_matches(p)),
                _ => strip_chars(s, qualified, args, |s, p| s.trim_end_matches(p)),
            };
        }
        "split" => {
            check_args(qualified, args, &[], 0, 2)?;
            let limit = match args.get(1) {
                Some(limit) => usize::try_from(int_arg(qualified, limit)?).ok(),
                None => None,
            };
            let parts: Vec<&str> = match args.first() {
                None | Some(Value::None) => match limit {
                    Some(limit) => split_whitespace_n(s, limit),
                    None => s.split_whitespace().collect(),
                },
                Some(sep) => {
                    let sep = string_arg(qualified, sep)?;
                    if sep.is_empty() {
                        return Err(EvalError::value(format!("{qualified}: empty separator")));
                    }
                    match limit {
                        Some(limit) => s.splitn(limit + 1, sep).collect(),
                        None => s.split(sep).collect(),
                    }
                }
            };
            Value::list(parts.into_iter().map(Value::string).collect())
        }
        "join" => {
            check_args(qualified, args, &[], 1, 1)?;
            let mut parts = Vec::new();
            for item in operators::iterate(&args[0])? {
                parts.push(string_arg(qualified, &item)?.to_owned());
            }
            Value::string(parts.join(s))
        }
        "startswith" => {
            check_args(qualified, args, &[], 1, 1)?;
            Value::Bool(affix_matches(qualified, &args[0], |p| s.starts_with(p))?)
        }
        "endswith" => {
            check_args(qualified, args, &[], 1, 1)?;
            Value::Bool(affix_matches(qualified, &args[0], |p| s.ends_with(p))?)
        }
        "replace" => {
            check_args(qualified, args, &[], 2, 3)?;
            let old = string_arg(qualified, &args[0])?;
            let new = string_arg(qualified, &args[1])?;
            match args.get(2).map(|count| int_arg(qualified, count)).transpose()? {
                Some(count) if count >= 0 => {
                    Value::string(s.replacen(old, new, count as usize))
                }
                _ => Value::string(s.replace(old, new)),
            }
        }
        "find" => {
            check_args(qualified, args, &[], 1, 1)?;
            let needle = string_arg(qualified, &args[0])?;
            Value::Int(
                s.find(needle)
                    .map_or(-1, |byte| s[..byte].chars().count() as i64),
            )
        }
        "count" => {
            check_args(qualified, args, &[], 1, 1)?;
            let needle = string_arg(qualified, &args[0])?;
            if needle.is_empty() {
                Value::Int(s.chars().count() as i64 + 1)
            } else {
                Value::Int(s.matches(needle).count() as i64)
            }
        }
        _ => return Err(EvalError::type_error(format!("string has no .{name} method"))),
    })
}

fn split_whitespace_n(s: &str, limit: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() == limit {
            parts.push(rest);
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        parts.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    parts
}

/// `"{} {name} {0}".format(...)`
fn format(template: &str, args: &[Value], kwargs: &[(String, Value)]) -> EvalResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(EvalError::value("format: unmatched '{'")),
                    }
                }
                let (field, conversion) = match field.split_once('!') {
                    Some((field, conversion)) => (field.to_owned(), Some(conversion.to_owned())),
                    None => (field, None),
                };
                let value = if field.is_empty() {
                    let value = args.get(auto_index).cloned();
                    auto_index += 1;
                    value.ok_or_else(|| {
                        EvalError::lookup(format!("format: tuple index out of range ({auto_index})"))
                    })?
                } else if let Ok(index) = field.parse::<usize>() {
                    args.get(index).cloned().ok_or_else(|| {
                        EvalError::lookup(format!("format: tuple index out of range ({index})"))
                    })?
                } else {
                    kwargs
                        .iter()
                        .find(|(name, _)| *name == field)
                        .map(|(_, value)| value.clone())
                        .ok_or_else(|| EvalError::lookup(format!("format: keyword {field} not found")))?
                };
                match conversion.as_deref() {
                    Some("r") => out.push_str(&value.repr()),
                    None | Some("s") => {
                        let _ = write!(out, "{value}");
                    }
                    Some(other) => {
                        return Err(EvalError::value(format!(
                            "format: unknown conversion {other:?}"
                        )));
                    }
                }
            }
            '}' => return Err(EvalError::value("format: single '}' in format")),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn set_method(
    receiver: &Value,
    name: &str,
    qualified: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> EvalResult<Value> {
    let Value::Set(set) = receiver else {
        return Err(unknown_method(receiver, name));
    };
    check_args(qualified, args, kwargs, 1, 1)?;
    let item = &args[0];
    match name {
        "add" => {
            item.check_hashable()?;
            set.borrow_mut()?.insert(item.clone());
        }
        "discard" => {
            item.check_hashable()?;
            set.borrow_mut()?.shift_remove(item);
        }
        "remove" => {
            item.check_hashable()?;
            if !set.borrow_mut()?.shift_remove(item) {
                return Err(EvalError::lookup(format!(
                    "{qualified}: missing key {}",
                    item.repr()
                )));
            }
        }
        "union" => {
            let mut items: SetItems = set.borrow().clone();
            for other in operators::iterate(item)? {
                other.check_hashable()?;
                items.insert(other);
            }
            return Ok(Value::Set(Rc::new(Set::new(items))));
        }
        _ => return Err(unknown_method(receiver, name)),
    }
    Ok(Value::None)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Dialect, ErrorKind, Globals, Thread, parse};

    fn run(source: &str) -> crate::Result<Globals> {
        let program = parse("methods.star", source)?.compile(&Dialect::permissive())?;
        let mut thread = Thread::new("methods");
        program.init(&mut thread, &Globals::new()).into_result()
    }

    fn repr_of(globals: &Globals, name: &str) -> String {
        globals.get(name).map(Value::repr).unwrap_or_default()
    }

    #[test]
    fn test_list_methods() {
        let globals = run(
            "xs = [3, 1]\nxs.append(2)\nxs.insert(0, 9)\nlast = xs.pop()\nxs.remove(1)\nwhere = xs.index(3)\n",
        )
        .expect("runs");
        assert_eq!(repr_of(&globals, "xs"), "[9, 3]");
        assert_eq!(repr_of(&globals, "last"), "2");
        assert_eq!(repr_of(&globals, "where"), "1");
    }

    #[test]
    fn test_dict_methods() {
        let globals = run(
            "d = {\"a\": 1}\nd.update(b = 2)\ng = d.get(\"z\", 0)\np = d.pop(\"a\")\ns = d.setdefault(\"c\", 3)\nitems = d.items()\n",
        )
        .expect("runs");
        assert_eq!(repr_of(&globals, "g"), "0");
        assert_eq!(repr_of(&globals, "p"), "1");
        assert_eq!(repr_of(&globals, "s"), "3");
        assert_eq!(repr_of(&globals, "items"), r#"[("b", 2), ("c", 3)]"#);
    }

    #[test]
    fn test_string_methods() {
        let globals = run(
            "parts = \" a b  c \".split()\njoined = \"-\".join(parts)\nf = \"{} is {n}\".format(\"x\", n = 1)\nstripped = \"xxhixx\".strip(\"x\")\nfound = \"hello\".find(\"l\")\n",
        )
        .expect("runs");
        assert_eq!(repr_of(&globals, "parts"), r#"["a", "b", "c"]"#);
        assert_eq!(repr_of(&globals, "joined"), r#""a-b-c""#);
        assert_eq!(repr_of(&globals, "f"), r#""x is 1""#);
        assert_eq!(repr_of(&globals, "stripped"), r#""hi""#);
        assert_eq!(repr_of(&globals, "found"), "2");
    }

    #[test]
    fn test_frozen_globals_reject_mutation() {
        let globals = run("xs = [1]\n").expect("runs");
        let xs = globals.get("xs").cloned().expect("xs is bound");
        let program = parse("mutate.star", "xs.append(2)\n")
            .and_then(|module| module.compile(&Dialect::permissive()))
            .expect("compiles");
        let mut predeclared = Globals::new();
        predeclared.insert("xs", xs);
        let mut thread = Thread::new("mutate");
        let err = program
            .init(&mut thread, &predeclared)
            .into_result()
            .expect_err("frozen list");
        assert_eq!(err.kind(), Some(ErrorKind::Frozen));
    }

    #[test]
    fn test_dir_lists_methods() {
        let names = attribute_names(&Value::list(Vec::new()));
        assert_eq!(names.first().map(String::as_str), Some("append"));
        assert!(attribute(Value::Int(1), "append").is_err());
    }
}
