//! Unary, binary, comparison, indexing and slicing operators

use std::{cmp::Ordering, fmt::Write, rc::Rc};

use crate::{
    error::EvalError,
    eval::EvalResult,
    ir::{BinaryOp, CompareOp, UnaryOp},
    value::{Dict, Set, SetItems, Value},
};

pub(crate) fn unary(op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    Ok(match (op, operand) {
        (UnaryOp::Not, value) => Value::Bool(!value.truth()),
        (UnaryOp::Neg, Value::Int(i)) => Value::Int(
            i.checked_neg()
                .ok_or_else(|| EvalError::value("integer overflow in negation"))?,
        ),
        (UnaryOp::Neg, Value::Float(f)) => Value::Float(-f),
        (UnaryOp::Pos, Value::Int(_) | Value::Float(_)) => operand.clone(),
        (UnaryOp::Invert, Value::Int(i)) => Value::Int(!i),
        (op, value) => {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Not => "not ",
                UnaryOp::Invert => "~",
            };
            return Err(EvalError::type_error(format!(
                "unknown unary op: {symbol}{}",
                value.type_name()
            )));
        }
    })
}

pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    use BinaryOp::{Add, BitAnd, BitOr, BitXor, Div, FloorDiv, Mod, Mul, Sub};

    Ok(match (op, left, right) {
        (_, Value::Int(a), Value::Int(b)) => int_binary(op, *a, *b)?,
        (
            Add | Sub | Mul | Div | FloorDiv | Mod,
            Value::Int(_) | Value::Float(_),
            Value::Int(_) | Value::Float(_),
        ) => float_binary(op, to_f64(left), to_f64(right))?,
        (Add, Value::String(a), Value::String(b)) => Value::string(format!("{a}{b}")),
        (Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Value::list(items)
        }
        (Add, Value::Tuple(a), Value::Tuple(b)) => {
            Value::tuple(a.iter().chain(b.iter()).cloned().collect())
        }
        (Mul, Value::String(s), Value::Int(n)) | (Mul, Value::Int(n), Value::String(s)) => {
            Value::string(s.repeat(repeat_count(*n)))
        }
        (Mul, Value::List(list), Value::Int(n)) | (Mul, Value::Int(n), Value::List(list)) => {
            Value::list(repeated(&list.borrow(), *n))
        }
        (Mul, Value::Tuple(items), Value::Int(n)) | (Mul, Value::Int(n), Value::Tuple(items)) => {
            Value::tuple(repeated(items, *n))
        }
        (Mod, Value::String(format), args) => Value::string(percent_format(format, args)?),
        (BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut entries = a.borrow().clone();
            entries.extend(b.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
            Value::Dict(Rc::new(Dict::new(entries)))
        }
        (BitOr | BitAnd | BitXor | Sub, Value::Set(a), Value::Set(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            let items: SetItems = match op {
                BitOr => a.union(&*b).cloned().collect(),
                BitAnd => a.intersection(&*b).cloned().collect(),
                BitXor => a.symmetric_difference(&*b).cloned().collect(),
                _ => a.difference(&*b).cloned().collect(),
            };
            Value::Set(Rc::new(Set::new(items)))
        }
        _ => {
            return Err(EvalError::type_error(format!(
                "unknown binary op: {} {} {}",
                left.type_name(),
                op.symbol(),
                right.type_name()
            )));
        }
    })
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn repeat_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn repeated(items: &[Value], n: i64) -> Vec<Value> {
    let count = repeat_count(n);
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

fn zero_division(op: BinaryOp) -> EvalError {
    let what = match op {
        BinaryOp::Mod => "modulo",
        _ => "division",
    };
    EvalError::value(format!("floating-point {what} by zero"))
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> EvalResult<Value> {
    let overflow = || EvalError::value(format!("integer overflow: {a} {} {b}", op.symbol()));
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(zero_division(op));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinaryOp::FloorDiv | BinaryOp::Mod if b == 0 => {
            return Err(EvalError::value(format!(
                "integer {} by zero",
                if op == BinaryOp::Mod { "modulo" } else { "division" }
            )));
        }
        // Rounds towards negative infinity; the remainder takes the divisor's sign.
        BinaryOp::FloorDiv => a.checked_div(b).map(|q| {
            if a % b != 0 && (a < 0) != (b < 0) {
                q - 1
            } else {
                q
            }
        }),
        BinaryOp::Mod => a.checked_rem(b).map(|r| {
            if r != 0 && (r < 0) != (b < 0) {
                r + b
            } else {
                r
            }
        }),
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        BinaryOp::Shl | BinaryOp::Shr if b < 0 => {
            return Err(EvalError::value("negative shift count"));
        }
        BinaryOp::Shl => {
            if a == 0 {
                Some(0)
            } else {
                u32::try_from(b)
                    .ok()
                    .and_then(|shift| a.checked_shl(shift))
                    .filter(|shifted| shifted >> b == a)
            }
        }
        BinaryOp::Shr => Some(a >> b.min(63)),
    };
    result.map(Value::Int).ok_or_else(overflow)
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> EvalResult<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => {
            return Err(zero_division(op));
        }
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => {
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        _ => {
            return Err(EvalError::type_error(format!(
                "unknown binary op: float {} float",
                op.symbol()
            )));
        }
    };
    Ok(Value::Float(result))
}

/// `"%s and %d" % (a, b)`
fn percent_format(format: &str, args: &Value) -> EvalResult<String> {
    let args: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    let mut args = args.into_iter();
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(verb) = chars.next() else {
            return Err(EvalError::value("incomplete format"));
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| EvalError::type_error("not enough arguments for format string"))?;
        match (verb, &arg) {
            ('s', arg) => {
                let _ = write!(out, "{arg}");
            }
            ('r', arg) => out.push_str(&arg.repr()),
            ('d' | 'i', Value::Int(i)) => {
                let _ = write!(out, "{i}");
            }
            ('d' | 'i', Value::Float(f)) => {
                let _ = write!(out, "{}", f.trunc() as i64);
            }
            ('d' | 'i', other) => {
                return Err(EvalError::type_error(format!(
                    "%{verb} format requires integer: {}",
                    other.type_name()
                )));
            }
            (verb, _) => {
                return Err(EvalError::value(format!("unknown conversion %{verb}")));
            }
        }
    }
    if args.next().is_some() {
        return Err(EvalError::type_error("too many arguments for format string"));
    }
    Ok(out)
}

pub(crate) fn compare(op: CompareOp, left: &Value, right: &Value) -> EvalResult<bool> {
    Ok(match op {
        CompareOp::Eq => left == right,
        CompareOp::NotEq => left != right,
        CompareOp::In => contains(right, left)?,
        CompareOp::NotIn => !contains(right, left)?,
        CompareOp::Lt => ordering(op, left, right)?.is_lt(),
        CompareOp::LtE => ordering(op, left, right)?.is_le(),
        CompareOp::Gt => ordering(op, left, right)?.is_gt(),
        CompareOp::GtE => ordering(op, left, right)?.is_ge(),
    })
}

fn ordering(op: CompareOp, left: &Value, right: &Value) -> EvalResult<Ordering> {
    left.compare(right).ok_or_else(|| {
        EvalError::type_error(format!(
            "{} {} {} not implemented",
            left.type_name(),
            op.symbol(),
            right.type_name()
        ))
    })
}

/// `item in container`
pub(crate) fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    Ok(match container {
        Value::List(list) => list.borrow().contains(item),
        Value::Tuple(items) => items.contains(item),
        Value::Dict(dict) => {
            item.check_hashable()?;
            dict.borrow().contains_key(item)
        }
        Value::Set(set) => {
            item.check_hashable()?;
            set.borrow().contains(item)
        }
        Value::String(haystack) => match item {
            Value::String(needle) => haystack.contains(&**needle),
            other => {
                return Err(EvalError::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                )));
            }
        },
        other => {
            return Err(EvalError::type_error(format!(
                "unknown binary op: {} in {}",
                item.type_name(),
                other.type_name()
            )));
        }
    })
}

/// Resolve a possibly negative index against a sequence length
fn sequence_index(key: &Value, len: usize, type_name: &str) -> EvalResult<usize> {
    let Value::Int(index) = key else {
        return Err(EvalError::type_error(format!(
            "{type_name} index: got {}, want int",
            key.type_name()
        )));
    };
    let signed_len = len as i64;
    let resolved = if *index < 0 { index + signed_len } else { *index };
    if (0..signed_len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(EvalError::lookup(format!(
            "{type_name} index {index} out of range [{}:{len}]",
            -signed_len
        )))
    }
}

/// `object[key]`
pub(crate) fn index(object: &Value, key: &Value) -> EvalResult<Value> {
    match object {
        Value::List(list) => {
            let items = list.borrow();
            let at = sequence_index(key, items.len(), "list")?;
            Ok(items[at].clone())
        }
        Value::Tuple(items) => {
            let at = sequence_index(key, items.len(), "tuple")?;
            Ok(items[at].clone())
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let at = sequence_index(key, chars.len(), "string")?;
            Ok(Value::string(chars[at].to_string()))
        }
        Value::Dict(dict) => {
            key.check_hashable()?;
            dict.borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::lookup(format!("key {} not in dict", key.repr())))
        }
        other => Err(EvalError::type_error(format!(
            "unhandled index operation {}[{}]",
            other.type_name(),
            key.type_name()
        ))),
    }
}

/// `object[key] = value`
pub(crate) fn set_index(object: &Value, key: Value, value: Value) -> EvalResult<()> {
    match object {
        Value::List(list) => {
            let mut items = list.borrow_mut()?;
            let at = sequence_index(&key, items.len(), "list")?;
            items[at] = value;
        }
        Value::Dict(dict) => {
            key.check_hashable()?;
            dict.borrow_mut()?.insert(key, value);
        }
        other => {
            return Err(EvalError::type_error(format!(
                "{} value does not support item assignment",
                other.type_name()
            )));
        }
    }
    Ok(())
}

fn slice_bound(value: &Value) -> EvalResult<Option<i64>> {
    match value {
        Value::None => Ok(None),
        Value::Int(i) => Ok(Some(*i)),
        other => Err(EvalError::type_error(format!(
            "invalid slice operand {}",
            other.type_name()
        ))),
    }
}

/// Positions selected by `[start:stop:step]` over a sequence of `len` items
fn slice_positions(len: usize, start: &Value, stop: &Value, step: &Value) -> EvalResult<Vec<usize>> {
    let step = slice_bound(step)?.unwrap_or(1);
    if step == 0 {
        return Err(EvalError::value("zero is not a valid slice step"));
    }
    let len = len as i64;
    let clamp = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };
    let (start, stop) = if step > 0 {
        (
            slice_bound(start)?.map_or(0, |s| clamp(s, 0, len)),
            slice_bound(stop)?.map_or(len, |s| clamp(s, 0, len)),
        )
    } else {
        (
            slice_bound(start)?.map_or(len - 1, |s| clamp(s, -1, len - 1)),
            slice_bound(stop)?.map_or(-1, |s| clamp(s, -1, len - 1)),
        )
    };

    let mut positions = Vec::new();
    let mut at = start;
    while (step > 0 && at < stop) || (step < 0 && at > stop) {
        positions.push(at as usize);
        at += step;
    }
    Ok(positions)
}

/// `object[start:stop:step]`
pub(crate) fn slice(object: &Value, start: &Value, stop: &Value, step: &Value) -> EvalResult<Value> {
    match object {
        Value::List(list) => {
            let items = list.borrow();
            let positions = slice_positions(items.len(), start, stop, step)?;
            Ok(Value::list(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let positions = slice_positions(items.len(), start, stop, step)?;
            Ok(Value::tuple(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let positions = slice_positions(chars.len(), start, stop, step)?;
            Ok(Value::string(positions.into_iter().map(|i| chars[i]).collect::<String>()))
        }
        other => Err(EvalError::type_error(format!(
            "invalid slice operand {}",
            other.type_name()
        ))),
    }
}

/// Snapshot the elements of an iterable value
pub(crate) fn iterate(value: &Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::List(list) => Ok(list.borrow().clone()),
        Value::Tuple(items) => Ok(items.to_vec()),
        Value::Dict(dict) => Ok(dict.borrow().keys().cloned().collect()),
        Value::Set(set) => Ok(set.borrow().iter().cloned().collect()),
        other => Err(EvalError::type_error(format!(
            "{} value is not iterable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ErrorKind;

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_floor_division_and_modulo_round_down() {
        assert_eq!(binary(BinaryOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).ok(), Some(Value::Int(-4)));
        assert_eq!(binary(BinaryOp::Mod, &Value::Int(-7), &Value::Int(2)).ok(), Some(Value::Int(1)));
        assert_eq!(binary(BinaryOp::Mod, &Value::Int(7), &Value::Int(-2)).ok(), Some(Value::Int(-1)));
        assert_eq!(binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).ok(), Some(Value::Float(3.5)));
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let err = binary(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1)).expect_err("overflow");
        assert_eq!(err.kind, ErrorKind::Value);
        assert!(binary(BinaryOp::Shl, &Value::Int(1), &Value::Int(64)).is_err());
        assert!(binary(BinaryOp::FloorDiv, &Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn test_percent_format() {
        let args = Value::tuple(vec![Value::string("pi"), Value::Float(3.25)]);
        let formatted = binary(BinaryOp::Mod, &Value::string("%s = %r%%"), &args).expect("formats");
        assert_eq!(formatted.as_str(), Some("pi = 3.25%"));
    }

    #[test]
    fn test_slices() {
        let list = ints(&[0, 1, 2, 3, 4]);
        let reversed = slice(&list, &Value::None, &Value::None, &Value::Int(-1)).expect("slice");
        assert_eq!(reversed, ints(&[4, 3, 2, 1, 0]));
        let middle = slice(&list, &Value::Int(1), &Value::Int(-1), &Value::None).expect("slice");
        assert_eq!(middle, ints(&[1, 2, 3]));
        let text = slice(&Value::string("hello"), &Value::Int(1), &Value::Int(3), &Value::None)
            .expect("slice");
        assert_eq!(text.as_str(), Some("el"));
    }

    #[test]
    fn test_missing_dict_key_is_lookup_error() {
        let dict = Value::Dict(Rc::default());
        let err = index(&dict, &Value::string("geo")).expect_err("missing key");
        assert_eq!(err.kind, ErrorKind::Lookup);
        assert_eq!(err.message, r#"key "geo" not in dict"#);
    }

    #[test]
    fn test_index_out_of_range_is_lookup_error() {
        let err = index(&ints(&[1]), &Value::Int(3)).expect_err("out of range");
        assert_eq!(err.kind, ErrorKind::Lookup);
        assert_eq!(index(&ints(&[1, 2]), &Value::Int(-1)).ok(), Some(Value::Int(2)));
    }

    #[test]
    fn test_membership() {
        assert_eq!(compare(CompareOp::In, &Value::Int(2), &ints(&[1, 2])).ok(), Some(true));
        assert_eq!(
            compare(CompareOp::NotIn, &Value::string("z"), &Value::string("abc")).ok(),
            Some(true)
        );
        assert!(compare(CompareOp::Lt, &Value::Int(1), &Value::string("a")).is_err());
    }
}
