//! Global objects, property access and methods available to expressions.

use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::dom::Node;
use crate::error::EvalError;
use crate::value::{format_number, parse_number, Function, Value};

static GLOBALS: OnceLock<IndexMap<&'static str, Value>> = OnceLock::new();

/// A global identifier such as `Math` or `parseInt`.
pub(crate) fn global(name: &str) -> Option<Value> {
    GLOBALS.get_or_init(build_globals).get(name).cloned()
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn num(args: &[Value], index: usize) -> f64 {
    arg(args, index).to_number()
}

fn math_fn(name: &'static str, f: fn(f64) -> f64) -> (&'static str, Value) {
    (name, Function::named(name, move |args| Ok(Value::Number(f(num(args, 0))))).into())
}

fn native<F>(name: &'static str, f: F) -> (&'static str, Value)
where
    F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    (name, Function::named(name, f).into())
}

fn namespace(entries: Vec<(&'static str, Value)>) -> Value {
    Value::object(entries)
}

fn build_globals() -> IndexMap<&'static str, Value> {
    let math = namespace(vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        math_fn("abs", f64::abs),
        math_fn("floor", f64::floor),
        math_fn("ceil", f64::ceil),
        math_fn("round", |n| (n + 0.5).floor()),
        math_fn("trunc", f64::trunc),
        math_fn("sqrt", f64::sqrt),
        math_fn("sign", |n| if n == 0.0 || n.is_nan() { n } else { n.signum() }),
        native("pow", |args| Ok(Value::Number(num(args, 0).powf(num(args, 1))))),
        native("min", |args| {
            Ok(Value::Number(
                args.iter()
                    .map(Value::to_number)
                    .fold(f64::INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) }),
            ))
        }),
        native("max", |args| {
            Ok(Value::Number(
                args.iter()
                    .map(Value::to_number)
                    .fold(f64::NEG_INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) }),
            ))
        }),
    ]);

    let json = namespace(vec![
        native("stringify", |args| {
            let value = arg(args, 0);
            if value.is_undefined() {
                return Ok(Value::Undefined);
            }
            let pretty = args.get(2).is_some_and(|v| !v.is_nullish());
            let text = if pretty {
                serde_json::to_string_pretty(&value)
            } else {
                serde_json::to_string(&value)
            };
            text.map(Value::String).map_err(|e| EvalError::Type {
                message: e.to_string(),
            })
        }),
        native("parse", |args| {
            serde_json::from_str::<serde_json::Value>(&arg(args, 0).to_string())
                .map(Value::from)
                .map_err(|e| EvalError::Type {
                    message: format!("JSON.parse: {e}"),
                })
        }),
    ]);

    let object = namespace(vec![
        native("keys", |args| {
            Ok(Value::array(entries_of(&arg(args, 0)).into_iter().map(|(k, _)| Value::String(k))))
        }),
        native("values", |args| {
            Ok(Value::array(entries_of(&arg(args, 0)).into_iter().map(|(_, v)| v)))
        }),
        native("entries", |args| {
            Ok(Value::array(
                entries_of(&arg(args, 0))
                    .into_iter()
                    .map(|(k, v)| Value::array([Value::String(k), v])),
            ))
        }),
    ]);

    let array = namespace(vec![
        native("isArray", |args| Ok(Value::Bool(arg(args, 0).as_sequence().is_some()))),
        native("from", |args| {
            let source = arg(args, 0);
            let items: Vec<Value> = match &source {
                Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                other => other.as_sequence().unwrap_or_default(),
            };
            Ok(Value::from(items))
        }),
    ]);

    IndexMap::from_iter([
        ("Math", math),
        ("JSON", json),
        ("Object", object),
        ("Array", array),
        native("String", |args| Ok(Value::String(arg(args, 0).to_string()))),
        native("Number", |args| Ok(Value::Number(if args.is_empty() { 0.0 } else { num(args, 0) }))),
        native("Boolean", |args| Ok(Value::Bool(arg(args, 0).is_truthy()))),
        native("parseInt", |args| {
            Ok(Value::Number(parse_int(&arg(args, 0).to_string(), args.get(1))))
        }),
        native("parseFloat", |args| Ok(Value::Number(parse_float(&arg(args, 0).to_string())))),
        native("isNaN", |args| Ok(Value::Bool(num(args, 0).is_nan()))),
    ])
}

fn entries_of(value: &Value) -> Vec<(String, Value)> {
    if let Some(items) = value.as_sequence() {
        return items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect();
    }
    value.as_entries().unwrap_or_default()
}

fn parse_int(text: &str, radix: Option<&Value>) -> f64 {
    let mut s = text.trim();
    let negative = s.starts_with('-');
    if negative || s.starts_with('+') {
        s = &s[1..];
    }

    let mut radix = match radix.map(Value::to_number) {
        Some(r) if r.is_finite() && r != 0.0 => r as u32,
        _ => 10,
    };
    if (radix == 16 || radix == 10) && (s.starts_with("0x") || s.starts_with("0X")) {
        radix = 16;
        s = &s[2..];
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    if negative {
        -value
    } else {
        value
    }
}

fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    for prefix in ["Infinity", "+Infinity", "-Infinity"] {
        if s.starts_with(prefix) {
            return parse_number(prefix);
        }
    }
    if !s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.')) {
        return f64::NAN;
    }
    (1..=s.len())
        .rev()
        .filter(|&end| s.is_char_boundary(end))
        .filter(|&end| s[..end].ends_with(|c: char| c.is_ascii_digit() || c == '.'))
        .find_map(|end| s[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// `target[key]`
pub(crate) fn get_property(target: &Value, key: &str) -> Result<Value, EvalError> {
    Ok(match target {
        Value::Undefined | Value::Null => {
            return Err(EvalError::PropertyOfNullish {
                target: target.to_string(),
                property: key.to_string(),
            })
        }
        Value::Reactive(r) => r.get(key),
        Value::Object(map) => map.get(key).cloned().unwrap_or_default(),
        Value::Array(items) => match key {
            "length" => Value::from(items.len()),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default(),
        },
        Value::String(s) => match key {
            "length" => Value::from(s.encode_utf16().count()),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default(),
        },
        Value::Signal(s) if key == "value" => s.get(),
        Value::Computed(c) if key == "value" => c.get(),
        Value::Signal(_) | Value::Computed(_) => get_property(&target.resolve(), key)?,
        Value::Node(node) => node_property(node, key),
        Value::Function(f) if key == "name" => Value::from(f.name()),
        _ => Value::Undefined,
    })
}

fn node_property(node: &Node, key: &str) -> Value {
    match key {
        "value" => Value::String(node.value()),
        "textContent" => Value::String(node.text_content()),
        "innerHTML" => Value::String(node.inner_html()),
        "outerHTML" => Value::String(node.outer_html()),
        "localName" => node.local_name().map(Value::String).unwrap_or(Value::Null),
        "tagName" => node
            .local_name()
            .map(|n| Value::String(n.to_uppercase()))
            .unwrap_or_default(),
        "id" | "className" => {
            let attribute = if key == "id" { "id" } else { "class" };
            Value::String(node.get_attribute(attribute).unwrap_or_default())
        }
        _ => Value::Undefined,
    }
}

/// `target.name(...args)`. `Ok(None)` when `optional` and the method is
/// missing.
pub(crate) fn call_method(
    target: &Value,
    name: &str,
    args: Vec<Value>,
    optional: bool,
) -> Result<Option<Value>, EvalError> {
    let builtin = match target {
        Value::String(s) => string_method(s, name, &args)?,
        Value::Number(n) => number_method(*n, name, &args),
        Value::Reactive(r) if r.is_array() => reactive_array_method(target, name, &args)?,
        Value::Array(_) => array_method(target, name, &args)?,
        _ => None,
    };
    if builtin.is_some() {
        return Ok(builtin);
    }

    match get_property(target, name)? {
        Value::Function(f) => f.call(&args).map(Some),
        v if optional && v.is_nullish() => Ok(None),
        _ => Err(EvalError::NotCallable {
            callee: name.to_string(),
        }),
    }
}

/// Call a function value.
pub(crate) fn call_value(callee: &Value, args: &[Value], described: &str) -> Result<Value, EvalError> {
    match callee {
        Value::Function(f) => f.call(args),
        _ => Err(EvalError::NotCallable {
            callee: described.to_string(),
        }),
    }
}

/// Resolve a possibly negative, possibly missing index argument.
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    match value {
        None | Some(Value::Undefined) => default,
        Some(v) => {
            let n = v.to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                (n as usize).min(len)
            }
        }
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
    let text = |i: usize| arg(args, i).to_string();
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let sub = |start: usize, end: usize| -> String { chars[start..end.max(start)].iter().collect() };

    let value = match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "trimStart" => Value::from(s.trim_start()),
        "trimEnd" => Value::from(s.trim_end()),
        "includes" => Value::Bool(s.contains(&text(0))),
        "startsWith" => Value::Bool(s.starts_with(&text(0))),
        "endsWith" => Value::Bool(s.ends_with(&text(0))),
        "indexOf" => Value::Number(
            s.find(&text(0))
                .map_or(-1.0, |byte| s[..byte].chars().count() as f64),
        ),
        "at" | "charAt" => {
            let index = relative_index(args.first(), len, 0);
            match chars.get(index) {
                Some(c) => Value::String(c.to_string()),
                None if name == "charAt" => Value::String(String::new()),
                None => Value::Undefined,
            }
        }
        "slice" => {
            let start = relative_index(args.first(), len, 0);
            let end = relative_index(args.get(1), len, len);
            Value::String(sub(start, end))
        }
        "substring" => {
            let clamp = |v: Option<&Value>, default: usize| match v {
                None | Some(Value::Undefined) => default,
                Some(v) => v.to_number().max(0.0).min(len as f64) as usize,
            };
            let (a, b) = (clamp(args.first(), 0), clamp(args.get(1), len));
            Value::String(sub(a.min(b), a.max(b)))
        }
        "split" => {
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::from(s)],
                Some(sep) => {
                    let sep = sep.to_string();
                    if sep.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::from).collect()
                    }
                }
            };
            Value::from(parts)
        }
        "replace" => Value::String(s.replacen(&text(0), &text(1), 1)),
        "replaceAll" => Value::String(s.replace(&text(0), &text(1))),
        "repeat" => {
            let count = num(args, 0);
            if count < 0.0 || count.is_infinite() {
                return Err(EvalError::Type {
                    message: format!("invalid repeat count {}", format_number(count)),
                });
            }
            Value::String(s.repeat(count as usize))
        }
        "padStart" | "padEnd" => {
            let target = num(args, 0).max(0.0) as usize;
            let fill = match args.get(1) {
                None | Some(Value::Undefined) => " ".to_string(),
                Some(v) => v.to_string(),
            };
            if target <= len || fill.is_empty() {
                Value::from(s)
            } else {
                let padding: String = fill.chars().cycle().take(target - len).collect();
                Value::String(if name == "padStart" {
                    padding + s
                } else {
                    s.to_string() + &padding
                })
            }
        }
        "concat" => Value::String(args.iter().fold(s.to_string(), |acc, v| acc + &v.to_string())),
        "toString" => Value::from(s),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "toFixed" => {
            let digits = num(args, 0);
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Some(Value::String(format!("{n:.digits$}")))
        }
        "toString" => Some(Value::String(format_number(n))),
        _ => None,
    }
}

fn callback<'a>(args: &'a [Value], method: &str) -> Result<&'a Function, EvalError> {
    args.first()
        .and_then(Value::as_function)
        .ok_or_else(|| EvalError::NotCallable {
            callee: format!("{method} callback"),
        })
}

fn array_method(target: &Value, name: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
    let items = target.as_sequence().unwrap_or_default();
    let len = items.len();
    let each = |f: &Function, i: usize, item: &Value| f.call(&[item.clone(), Value::from(i)]);

    let value = match name {
        "map" => {
            let f = callback(args, name)?;
            let mapped = items
                .iter()
                .enumerate()
                .map(|(i, item)| each(f, i, item))
                .collect::<Result<Vec<_>, _>>()?;
            Value::from(mapped)
        }
        "filter" => {
            let f = callback(args, name)?;
            let mut kept = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if each(f, i, item)?.is_truthy() {
                    kept.push(item.clone());
                }
            }
            Value::from(kept)
        }
        "find" | "findIndex" => {
            let f = callback(args, name)?;
            let mut found = None;
            for (i, item) in items.iter().enumerate() {
                if each(f, i, item)?.is_truthy() {
                    found = Some((i, item.clone()));
                    break;
                }
            }
            match (name, found) {
                ("find", Some((_, item))) => item,
                ("find", None) => Value::Undefined,
                (_, Some((i, _))) => Value::from(i),
                (_, None) => Value::Number(-1.0),
            }
        }
        "some" | "every" => {
            let f = callback(args, name)?;
            let want = name == "some";
            let mut result = !want;
            for (i, item) in items.iter().enumerate() {
                if each(f, i, item)?.is_truthy() == want {
                    result = want;
                    break;
                }
            }
            Value::Bool(result)
        }
        "forEach" => {
            let f = callback(args, name)?;
            for (i, item) in items.iter().enumerate() {
                each(f, i, item)?;
            }
            Value::Undefined
        }
        "reduce" => {
            let f = callback(args, name)?;
            let mut iter = items.iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(EvalError::Type {
                            message: "reduce of empty array with no initial value".to_string(),
                        })
                    }
                },
            };
            for (i, item) in iter {
                acc = f.call(&[acc, item.clone(), Value::from(i)])?;
            }
            acc
        }
        "join" => {
            let sep = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(v) => v.to_string(),
            };
            Value::String(
                items
                    .iter()
                    .map(Value::to_text)
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.iter().any(|v| same_value_zero(v, &needle)))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            Value::Number(
                items
                    .iter()
                    .position(|v| v.strict_equals(&needle))
                    .map_or(-1.0, |i| i as f64),
            )
        }
        "slice" => {
            let start = relative_index(args.first(), len, 0);
            let end = relative_index(args.get(1), len, len);
            Value::from(items.get(start..end.max(start)).unwrap_or_default().to_vec())
        }
        "concat" => {
            let mut out = items.clone();
            for extra in args {
                match extra.as_sequence() {
                    Some(more) => out.extend(more),
                    None => out.push(extra.clone()),
                }
            }
            Value::from(out)
        }
        "reverse" => Value::from(items.iter().rev().cloned().collect::<Vec<_>>()),
        "at" => {
            let index = relative_index(args.first(), len, 0);
            items.get(index).cloned().unwrap_or_default()
        }
        "toString" => Value::String(target.to_string()),
        "push" | "pop" | "shift" | "unshift" | "splice" => {
            return Err(EvalError::Type {
                message: format!("cannot {name} a plain array; wrap it with reactive()"),
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

fn reactive_array_method(target: &Value, name: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
    let Some(list) = target.as_reactive() else {
        return Ok(None);
    };
    let value = match name {
        "push" => {
            let mut len = list.len();
            for item in args {
                len = list.push(item.clone());
            }
            Value::from(len)
        }
        "unshift" => {
            for item in args.iter().rev() {
                list.unshift(item.clone());
            }
            Value::from(list.len())
        }
        "pop" => list.pop(),
        "shift" => list.shift(),
        "splice" => {
            let len = list.len();
            let start = relative_index(args.first(), len, 0);
            let delete_count = match args.get(1) {
                None => len - start,
                Some(v) => v.to_number().max(0.0) as usize,
            };
            let insert = args.iter().skip(2).cloned().collect();
            Value::from(list.splice(start, delete_count, insert))
        }
        _ => return array_method(target, name, args),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_reads_leading_digits() {
        assert_eq!(parse_int("42px", None), 42.0);
        assert_eq!(parse_int("-7", None), -7.0);
        assert_eq!(parse_int("0x1f", None), 31.0);
        assert!(parse_int("px", None).is_nan());
        assert_eq!(parse_int("101", Some(&Value::from(2))), 5.0);
    }

    #[test]
    fn parse_float_reads_longest_prefix() {
        assert_eq!(parse_float("3.25em"), 3.25);
        assert_eq!(parse_float("  -1e2x"), -100.0);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn relative_index_handles_negative_values() {
        assert_eq!(relative_index(Some(&Value::from(-1)), 5, 0), 4);
        assert_eq!(relative_index(Some(&Value::from(-10)), 5, 0), 0);
        assert_eq!(relative_index(Some(&Value::from(10)), 5, 0), 5);
        assert_eq!(relative_index(None, 5, 3), 3);
    }

    #[test]
    fn property_of_nullish_is_an_error() {
        assert_eq!(
            get_property(&Value::Undefined, "name"),
            Err(EvalError::PropertyOfNullish {
                target: "undefined".into(),
                property: "name".into(),
            })
        );
    }

    #[test]
    fn string_methods() {
        let call = |name: &str, args: Vec<Value>| {
            call_method(&Value::from("Hello World"), name, args, false)
                .unwrap()
                .unwrap()
        };
        assert_eq!(call("toUpperCase", vec![]), Value::from("HELLO WORLD"));
        assert_eq!(call("slice", vec![Value::from(-5)]), Value::from("World"));
        assert_eq!(call("indexOf", vec![Value::from("World")]), Value::from(6));
        assert_eq!(call("padStart", vec![Value::from(13), Value::from("*")]), Value::from("**Hello World"));
        assert_eq!(
            call("split", vec![Value::from(" ")]),
            Value::array(["Hello".into(), "World".into()])
        );
    }

    #[test]
    fn unknown_method_is_not_callable() {
        assert_eq!(
            call_method(&Value::from(1), "nope", vec![], false),
            Err(EvalError::NotCallable {
                callee: "nope".into()
            })
        );
        assert_eq!(call_method(&Value::object([("a", Value::Null)]), "a", vec![], true), Ok(None));
    }
}
