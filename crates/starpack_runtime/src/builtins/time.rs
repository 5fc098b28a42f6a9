//! The `time` module. Instants are float seconds since the Unix epoch and
//! durations are float seconds.

use chrono::{DateTime, Utc};

use super::{Builtin, check_args, string_arg};
use crate::{error::EvalError, eval::EvalResult, value::Value};

pub(super) const FUNCTIONS: [Builtin; 3] = [
    Builtin::TimeNow,
    Builtin::TimeParseDuration,
    Builtin::TimeParseTime,
];

pub(super) const UNITS: [(&str, f64); 6] = [
    ("nanosecond", 1e-9),
    ("microsecond", 1e-6),
    ("millisecond", 1e-3),
    ("second", 1.0),
    ("minute", 60.0),
    ("hour", 3600.0),
];

pub(super) fn call(builtin: Builtin, args: &[Value], kwargs: &[(String, Value)]) -> EvalResult<Value> {
    let name = format!("time.{}", builtin.name());
    match builtin {
        Builtin::TimeNow => {
            check_args(&name, args, kwargs, 0, 0)?;
            Ok(Value::Float(Utc::now().timestamp_micros() as f64 / 1e6))
        }
        Builtin::TimeParseDuration => {
            check_args(&name, args, kwargs, 1, 1)?;
            let text = string_arg(&name, &args[0])?;
            parse_duration(text)
                .map(Value::Float)
                .ok_or_else(|| EvalError::value(format!("{name}: invalid duration {text:?}")))
        }
        Builtin::TimeParseTime => {
            check_args(&name, args, kwargs, 1, 1)?;
            let text = string_arg(&name, &args[0])?;
            let time = DateTime::parse_from_rfc3339(text)
                .map_err(|err| EvalError::value(format!("{name}: {text:?}: {err}")))?;
            Ok(Value::Float(
                time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9,
            ))
        }
        _ => Err(EvalError::type_error(format!(
            "{name}: unsupported call form"
        ))),
    }
}

/// Parse a signed sequence of decimal numbers with units, such as `"1h30m"`,
/// `"-1.5s"` or `"300ms"`, into seconds
fn parse_duration(text: &str) -> Option<f64> {
    let (sign, mut rest) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };
    if rest == "0" {
        return Some(0.0);
    }
    if rest.is_empty() {
        return None;
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut nanos = 0.0;
    while !rest.is_empty() {
        let (number, tail) = rest.split_at(rest.find(|c| !is_number(c)).unwrap_or(rest.len()));
        let (unit, tail) = tail.split_at(tail.find(is_number).unwrap_or(tail.len()));
        if number.is_empty() || number == "." {
            return None;
        }
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 6e10,
            "h" => 3.6e12,
            _ => return None,
        };
        nanos += number.parse::<f64>().ok()? * scale;
        rest = tail;
    }
    Some(sign * nanos / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let seconds = |text| parse_duration(text).map(|s| s.to_string());
        assert_eq!(seconds("1h30m").as_deref(), Some("5400"));
        assert_eq!(seconds("-1.5s").as_deref(), Some("-1.5"));
        assert_eq!(seconds("300ms").as_deref(), Some("0.3"));
        assert_eq!(seconds("2us500ns").as_deref(), Some("0.0000025"));
        assert_eq!(seconds("0").as_deref(), Some("0"));
        for invalid in ["", "-", "5", "1d", "h", "1.2.3s", ".s"] {
            assert_eq!(parse_duration(invalid), None, "{invalid:?}");
        }
    }
}
