//! Classes of the built-in value types.
//!
//! The method names follow the conventions templates are usually written against,
//!     e.g. `$name.toUpperCase()` or `$list.size()`.
//! String positions are counted in characters.

use std::sync::{Arc, OnceLock};

use super::{Class, ClassBuilder};
use crate::error::Cause;
use crate::value::{Map, Value};

/// The class describing a value.
pub fn class_of(value: &Value) -> Arc<Class> {
    macro_rules! cached {
        ($build: expr) => {{
            static CLASS: OnceLock<Arc<Class>> = OnceLock::new();
            CLASS.get_or_init($build).clone()
        }};
    }
    match value {
        Value::Bool(_) => cached!(boolean_class),
        Value::Int(_) => cached!(integer_class),
        Value::Float(_) => cached!(float_class),
        Value::String(_) => cached!(string_class),
        Value::List(_) => cached!(list_class),
        Value::Map(_) => cached!(map_class),
        Value::Object(object) => object.class(),
    }
}

fn int_arg(args: &[Value], i: usize) -> Result<i64, Cause> {
    match args.get(i) {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(format!(
            "argument {} must be an integer, not a {}",
            i + 1,
            other.type_name()
        )
        .into()),
        None => Err(format!("missing argument {}", i + 1).into()),
    }
}

fn text_arg(args: &[Value], i: usize) -> Result<String, Cause> {
    args.get(i)
        .map(Value::to_text)
        .ok_or_else(|| format!("missing argument {}", i + 1).into())
}

/// Resolve a possibly negative index against a length.
pub(crate) fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let i = if i < 0 { len as i64 + i } else { i };
    if i < 0 || i as usize >= len {
        None
    } else {
        Some(i as usize)
    }
}

fn as_bool(value: &Value) -> Option<&bool> {
    match value {
        Value::Bool(b) => Some(b),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<&i64> {
    match value {
        Value::Int(i) => Some(i),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<&f64> {
    match value {
        Value::Float(f) => Some(f),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<&String> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn as_list(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::List(list) => Some(list),
        _ => None,
    }
}

fn as_map(value: &Value) -> Option<&Map> {
    match value {
        Value::Map(map) => Some(map),
        _ => None,
    }
}

fn boolean_class() -> Arc<Class> {
    ClassBuilder::<bool>::with_downcast("Boolean", as_bool)
        .getter("booleanValue", |b| Some(Value::Bool(*b)))
        .getter("toString", |b| Some(Value::String(b.to_string())))
        .build()
}

fn integer_class() -> Arc<Class> {
    ClassBuilder::<i64>::with_downcast("Integer", as_int)
        .getter("intValue", |i| Some(Value::Int(*i)))
        .getter("doubleValue", |i| Some(Value::Float(*i as f64)))
        .getter("toString", |i| Some(Value::String(i.to_string())))
        .build()
}

fn float_class() -> Arc<Class> {
    ClassBuilder::<f64>::with_downcast("Float", as_float)
        .getter("intValue", |f| Some(Value::Int(*f as i64)))
        .getter("doubleValue", |f| Some(Value::Float(*f)))
        .getter("toString", |f| Some(Value::String(Value::Float(*f).to_text())))
        .build()
}

fn string_class() -> Arc<Class> {
    ClassBuilder::<String>::with_downcast("String", as_string)
        .getter("length", |s| Some(Value::from(s.chars().count())))
        .getter("isEmpty", |s| Some(Value::Bool(s.is_empty())))
        .getter("toUpperCase", |s| Some(Value::String(s.to_uppercase())))
        .getter("toLowerCase", |s| Some(Value::String(s.to_lowercase())))
        .getter("trim", |s| Some(Value::String(s.trim().to_string())))
        .getter("toString", |s| Some(Value::String(s.clone())))
        .fallible_method("contains", Some(1), |s, args| {
            Ok(Some(Value::Bool(s.contains(text_arg(args, 0)?.as_str()))))
        })
        .fallible_method("startsWith", Some(1), |s, args| {
            Ok(Some(Value::Bool(s.starts_with(text_arg(args, 0)?.as_str()))))
        })
        .fallible_method("endsWith", Some(1), |s, args| {
            Ok(Some(Value::Bool(s.ends_with(text_arg(args, 0)?.as_str()))))
        })
        .fallible_method("equals", Some(1), |s, args| {
            Ok(Some(Value::Bool(*s == text_arg(args, 0)?)))
        })
        .fallible_method("equalsIgnoreCase", Some(1), |s, args| {
            Ok(Some(Value::Bool(
                s.to_lowercase() == text_arg(args, 0)?.to_lowercase(),
            )))
        })
        .fallible_method("concat", Some(1), |s, args| {
            Ok(Some(Value::String(format!("{s}{}", text_arg(args, 0)?))))
        })
        .fallible_method("indexOf", Some(1), |s, args| {
            let needle = text_arg(args, 0)?;
            let i = match s.find(needle.as_str()) {
                None => -1,
                Some(byte_index) => s[..byte_index].chars().count() as i64,
            };
            Ok(Some(Value::Int(i)))
        })
        .fallible_method("replace", Some(2), |s, args| {
            let from = text_arg(args, 0)?;
            let to = text_arg(args, 1)?;
            Ok(Some(Value::String(s.replace(from.as_str(), &to))))
        })
        .fallible_method("split", Some(1), |s, args| {
            let separator = text_arg(args, 0)?;
            let parts: Vec<Value> = if separator.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(separator.as_str()).map(Value::from).collect()
            };
            Ok(Some(Value::List(parts)))
        })
        .fallible_method("charAt", Some(1), |s, args| {
            let i = int_arg(args, 0)?;
            let len = s.chars().count();
            match usize::try_from(i).ok().and_then(|i| s.chars().nth(i)) {
                Some(c) => Ok(Some(Value::String(c.to_string()))),
                None => Err(format!("index {i} out of range for length {len}").into()),
            }
        })
        .fallible_method("substring", None, |s, args| {
            let chars: Vec<char> = s.chars().collect();
            let begin = int_arg(args, 0)?;
            let end = match args.len() {
                1 => chars.len() as i64,
                2 => int_arg(args, 1)?,
                n => return Err(format!("substring takes 1 or 2 arguments, not {n}").into()),
            };
            if begin < 0 || end > chars.len() as i64 || begin > end {
                return Err(format!(
                    "begin {begin}, end {end}, length {}",
                    chars.len()
                )
                .into());
            }
            Ok(Some(Value::String(
                chars[begin as usize..end as usize].iter().collect(),
            )))
        })
        .build()
}

fn list_class() -> Arc<Class> {
    ClassBuilder::<Vec<Value>>::with_downcast("List", as_list)
        .getter("size", |l| Some(Value::from(l.len())))
        .getter("isEmpty", |l| Some(Value::Bool(l.is_empty())))
        .fallible_method("get", Some(1), |l, args| {
            let i = int_arg(args, 0)?;
            Ok(resolve_index(i, l.len()).map(|i| l[i].clone()))
        })
        .method("contains", Some(1), |l, args| {
            Some(Value::Bool(l.iter().any(|v| v.loosely_equals(&args[0]))))
        })
        .method("indexOf", Some(1), |l, args| {
            let i = l.iter().position(|v| v.loosely_equals(&args[0]));
            Some(Value::Int(i.map_or(-1, |i| i as i64)))
        })
        .build()
}

fn map_class() -> Arc<Class> {
    ClassBuilder::<Map>::with_downcast("Map", as_map)
        .method("get", Some(1), |m, args| m.get(&args[0].to_text()).cloned())
        .getter("size", |m| Some(Value::from(m.len())))
        .getter("isEmpty", |m| Some(Value::Bool(m.is_empty())))
        .getter("keySet", |m| {
            Some(Value::List(m.keys().map(|k| Value::from(k.as_str())).collect()))
        })
        .getter("values", |m| Some(Value::List(m.values().cloned().collect())))
        .method("containsKey", Some(1), |m, args| {
            Some(Value::Bool(m.contains_key(&args[0].to_text())))
        })
        .map_like()
        .build()
}
