//! Built-in function library for `function` steps.
//!
//! A small dispatch table of math, string, date, and JSON helpers. Args
//! arrive as rendered strings; numeric helpers coerce them.

use chrono::Utc;
use serde_json::{Value, json};

/// A function step could not be dispatched.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("unknown function '{0}'")]
    Unknown(String),

    #[error("function '{function}': {reason}")]
    BadArgs { function: String, reason: String },
}

/// Dispatch a built-in by name.
pub fn call(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
    match name {
        // math
        "add" => fold_numbers(name, args, 0.0, |acc, n| acc + n),
        "sub" => binary_number(name, args, |a, b| a - b),
        "mul" => fold_numbers(name, args, 1.0, |acc, n| acc * n),
        "div" => {
            let (a, b) = two_numbers(name, args)?;
            if b == 0.0 {
                return Err(bad(name, "division by zero"));
            }
            Ok(number(a / b))
        }

        // string
        "upper" => Ok(json!(one_str(name, args)?.to_uppercase())),
        "lower" => Ok(json!(one_str(name, args)?.to_lowercase())),
        "trim" => Ok(json!(one_str(name, args)?.trim())),
        "concat" => Ok(json!(
            args.iter().map(as_text).collect::<Vec<_>>().join("")
        )),
        "length" => match args {
            [Value::Array(items)] => Ok(json!(items.len())),
            [value] => Ok(json!(as_text(value).chars().count())),
            _ => Err(bad(name, "expected one argument")),
        },
        "replace" => match args {
            [s, from, to] => Ok(json!(as_text(s).replace(&as_text(from), &as_text(to)))),
            _ => Err(bad(name, "expected (text, from, to)")),
        },
        "split" => match args {
            [s, sep] => Ok(json!(
                as_text(s)
                    .split(&as_text(sep))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            )),
            _ => Err(bad(name, "expected (text, separator)")),
        },

        // date
        "now" => Ok(json!(Utc::now().to_rfc3339())),
        "today" => Ok(json!(Utc::now().format("%Y-%m-%d").to_string())),
        "timestamp" => Ok(json!(Utc::now().timestamp())),

        // json
        "parse" => {
            let text = one_str(name, args)?;
            serde_json::from_str::<Value>(&text)
                .map_err(|e| bad(name, format!("invalid json: {e}")))
        }
        "stringify" => match args {
            [value] => Ok(json!(value.to_string())),
            _ => Err(bad(name, "expected one argument")),
        },
        "get" => match args {
            [value, path] => {
                let parsed = coerce_json(value);
                let mut current = parsed;
                for segment in as_text(path).split('.') {
                    current = match current {
                        Value::Object(mut map) => map
                            .remove(segment)
                            .ok_or_else(|| bad(name, format!("no field '{segment}'")))?,
                        _ => return Err(bad(name, format!("no field '{segment}'"))),
                    };
                }
                Ok(current)
            }
            _ => Err(bad(name, "expected (value, dotted.path)")),
        },
        "keys" => match args {
            [value] => match coerce_json(value) {
                Value::Object(map) => Ok(json!(map.keys().cloned().collect::<Vec<_>>())),
                _ => Err(bad(name, "expected an object")),
            },
            _ => Err(bad(name, "expected one argument")),
        },
        "count" => match args {
            [value] => match coerce_json(value) {
                Value::Array(items) => Ok(json!(items.len())),
                Value::Object(map) => Ok(json!(map.len())),
                _ => Err(bad(name, "expected an array or object")),
            },
            _ => Err(bad(name, "expected one argument")),
        },

        other => Err(FunctionError::Unknown(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

fn bad(function: &str, reason: impl Into<String>) -> FunctionError {
    FunctionError::BadArgs {
        function: function.to_string(),
        reason: reason.into(),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(function: &str, value: &Value) -> Result<f64, FunctionError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| bad(function, "number out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| bad(function, format!("'{s}' is not a number"))),
        other => Err(bad(function, format!("'{other}' is not a number"))),
    }
}

/// A string argument holding JSON is parsed; everything else passes as-is.
fn coerce_json(value: &Value) -> Value {
    if let Value::String(s) = value {
        if let Ok(parsed) = serde_json::from_str::<Value>(s) {
            return parsed;
        }
    }
    value.clone()
}

/// Render an f64 as an integer when it is one, keeping `add("1","2")` == 3.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn one_str(function: &str, args: &[Value]) -> Result<String, FunctionError> {
    match args {
        [value] => Ok(as_text(value)),
        _ => Err(bad(function, "expected one argument")),
    }
}

fn two_numbers(function: &str, args: &[Value]) -> Result<(f64, f64), FunctionError> {
    match args {
        [a, b] => Ok((as_number(function, a)?, as_number(function, b)?)),
        _ => Err(bad(function, "expected two arguments")),
    }
}

fn binary_number(
    function: &str,
    args: &[Value],
    op: fn(f64, f64) -> f64,
) -> Result<Value, FunctionError> {
    let (a, b) = two_numbers(function, args)?;
    Ok(number(op(a, b)))
}

fn fold_numbers(
    function: &str,
    args: &[Value],
    init: f64,
    op: fn(f64, f64) -> f64,
) -> Result<Value, FunctionError> {
    if args.is_empty() {
        return Err(bad(function, "expected at least one argument"));
    }
    let mut acc = init;
    for arg in args {
        acc = op(acc, as_number(function, arg)?);
    }
    Ok(number(acc))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_coerces_string_args() {
        assert_eq!(call("add", &[json!("1"), json!("2")]).unwrap(), json!(3));
        assert_eq!(call("mul", &[json!(3), json!("4")]).unwrap(), json!(12));
        assert_eq!(call("sub", &[json!(5), json!(2)]).unwrap(), json!(3));
        assert_eq!(call("div", &[json!(7), json!(2)]).unwrap(), json!(3.5));
    }

    #[test]
    fn division_by_zero_is_rejected() {
        assert!(call("div", &[json!(1), json!(0)]).is_err());
    }

    #[test]
    fn string_helpers() {
        assert_eq!(call("upper", &[json!("hi")]).unwrap(), json!("HI"));
        assert_eq!(
            call("concat", &[json!("a"), json!("b"), json!(1)]).unwrap(),
            json!("ab1")
        );
        assert_eq!(
            call("split", &[json!("a,b"), json!(",")]).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(call("length", &[json!("abc")]).unwrap(), json!(3));
    }

    #[test]
    fn json_helpers_accept_json_strings() {
        let nested = json!(r#"{"user": {"name": "ada"}}"#);
        assert_eq!(
            call("get", &[nested.clone(), json!("user.name")]).unwrap(),
            json!("ada")
        );
        assert_eq!(call("count", &[json!(r#"[1,2,3]"#)]).unwrap(), json!(3));
        assert_eq!(
            call("keys", &[json!(r#"{"a":1,"b":2}"#)]).unwrap(),
            json!(["a", "b"])
        );
    }

    #[test]
    fn unknown_function_is_an_error() {
        assert!(matches!(
            call("frobnicate", &[]),
            Err(FunctionError::Unknown(_))
        ));
    }

    #[test]
    fn date_helpers_produce_plausible_output() {
        let now = call("now", &[]).unwrap();
        assert!(now.as_str().unwrap().contains('T'));
        let today = call("today", &[]).unwrap();
        assert_eq!(today.as_str().unwrap().len(), 10);
        assert!(call("timestamp", &[]).unwrap().as_i64().unwrap() > 1_700_000_000);
    }
}
