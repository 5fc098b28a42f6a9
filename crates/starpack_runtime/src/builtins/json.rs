//! The `json` module

use std::rc::Rc;

use serde::Serialize;
use serde_json::{Map, Number, Value as Json, ser::PrettyFormatter};

use super::{Builtin, check_args, string_arg, take_kwarg};
use crate::{
    error::EvalError,
    eval::EvalResult,
    value::{Dict, Value, format_float},
};

pub(super) const FUNCTIONS: [Builtin; 3] = [
    Builtin::JsonEncode,
    Builtin::JsonDecode,
    Builtin::JsonIndent,
];

/// Containers nested deeper than this are rejected, which also stops
/// self-referencing lists
const MAX_DEPTH: usize = 512;

pub(super) fn call(
    builtin: Builtin,
    args: &[Value],
    mut kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    let name = format!("json.{}", builtin.name());
    match builtin {
        Builtin::JsonEncode => {
            check_args(&name, args, &kwargs, 1, 1)?;
            Ok(Value::string(to_json(&args[0], 0)?.to_string()))
        }
        Builtin::JsonDecode => {
            check_args(&name, args, &kwargs, 1, 1)?;
            Ok(from_json(parse(&name, &args[0])?))
        }
        Builtin::JsonIndent => {
            let indent = match take_kwarg(&mut kwargs, "indent") {
                Some(indent) => string_arg(&name, &indent)?.to_owned(),
                None => "\t".to_owned(),
            };
            check_args(&name, args, &kwargs, 1, 1)?;
            let json = parse(&name, &args[0])?;
            let mut out = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(
                &mut out,
                PrettyFormatter::with_indent(indent.as_bytes()),
            );
            json.serialize(&mut serializer)
                .map_err(|err| EvalError::value(format!("{name}: {err}")))?;
            let text = String::from_utf8(out)
                .map_err(|err| EvalError::value(format!("{name}: {err}")))?;
            Ok(Value::string(text))
        }
        _ => Err(EvalError::type_error(format!(
            "{name}: unsupported call form"
        ))),
    }
}

fn parse(name: &str, text: &Value) -> EvalResult<Json> {
    serde_json::from_str(string_arg(name, text)?)
        .map_err(|err| EvalError::value(format!("{name}: {err}")))
}

fn to_json(value: &Value, depth: usize) -> EvalResult<Json> {
    if depth > MAX_DEPTH {
        return Err(EvalError::value("json.encode: value is nested too deeply"));
    }
    let array = |items: &[Value]| {
        items
            .iter()
            .map(|item| to_json(item, depth + 1))
            .collect::<EvalResult<Vec<_>>>()
            .map(Json::Array)
    };
    Ok(match value {
        Value::None => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => Number::from_f64(*f).map(Json::Number).ok_or_else(|| {
            EvalError::value(format!(
                "json.encode: cannot encode non-finite float {}",
                format_float(*f)
            ))
        })?,
        Value::String(s) => Json::String(s.to_string()),
        Value::List(list) => array(&list.borrow())?,
        Value::Tuple(items) => array(items)?,
        Value::Dict(dict) => {
            let mut object = Map::new();
            for (key, item) in dict.borrow().iter() {
                let key = key.as_str().ok_or_else(|| {
                    EvalError::type_error(format!(
                        "json.encode: dict has {} key, want string",
                        key.type_name()
                    ))
                })?;
                object.insert(key.to_owned(), to_json(item, depth + 1)?);
            }
            Json::Object(object)
        }
        other => {
            return Err(EvalError::type_error(format!(
                "json.encode: cannot encode {}",
                other.type_name()
            )));
        }
    })
}

/// Integers become int, every other number float; objects keep their key order
fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::None,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => n
            .as_i64()
            .map_or_else(|| Value::Float(n.as_f64().unwrap_or(f64::NAN)), Value::Int),
        Json::String(s) => Value::string(s),
        Json::Array(items) => Value::list(items.into_iter().map(from_json).collect()),
        Json::Object(object) => Value::Dict(Rc::new(Dict::new(
            object
                .into_iter()
                .map(|(key, item)| (Value::string(key), from_json(item)))
                .collect(),
        ))),
    }
}
