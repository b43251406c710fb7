//! Runtime values.
//!
//! A [Value] is what references, literals and expressions evaluate to.
//! There is no null value: an expression that has no value evaluates to `None`.

use std::fmt::Write;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::introspect::{Object, TypeKey};

#[cfg(feature = "serde")]
mod json;
#[cfg(feature = "serde")]
pub use json::json_object;

/// A map value; keys keep their insertion order.
pub type Map = IndexMap<String, Value>;

#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Map),
    Object(Arc<dyn Object>),
}

impl Value {
    /// Wrap a user object.
    pub fn object<T: Object>(object: T) -> Value {
        Value::Object(Arc::new(object))
    }

    /// Text form of the value, as printed by a reference.
    pub fn to_text(&self) -> String {
        let mut s = String::new();
        self.write_text(&mut s);
        s
    }

    fn write_text(&self, out: &mut String) {
        match self {
            Value::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            Value::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Float(f) => write_float(*f, out),
            Value::String(s) => out.push_str(s),
            Value::List(list) => {
                out.push('[');
                for (i, element) in list.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    element.write_text(out);
                }
                out.push(']');
            }
            Value::Map(map) => {
                out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push('=');
                    value.write_text(out);
                }
                out.push('}');
            }
            Value::Object(object) => out.push_str(&object.to_text()),
        }
    }

    /// Absent values and `false` are false; everything else is true.
    pub fn is_truthy(value: Option<&Value>) -> bool {
        !matches!(value, None | Some(Value::Bool(false)))
    }

    /// A human readable name of the value's type, used in diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Bool(_) => "Boolean".into(),
            Value::Int(_) => "Integer".into(),
            Value::Float(_) => "Float".into(),
            Value::String(_) => "String".into(),
            Value::List(_) => "List".into(),
            Value::Map(_) => "Map".into(),
            Value::Object(object) => object.class().name().to_string(),
        }
    }

    /// The concrete runtime type of the value.
    ///
    /// Accessor caches are keyed by this.
    pub fn type_key(&self) -> TypeKey {
        match self {
            Value::Bool(_) => TypeKey::of::<bool>(),
            Value::Int(_) => TypeKey::of::<i64>(),
            Value::Float(_) => TypeKey::of::<f64>(),
            Value::String(_) => TypeKey::of::<String>(),
            Value::List(_) => TypeKey::of::<Vec<Value>>(),
            Value::Map(_) => TypeKey::of::<Map>(),
            Value::Object(object) => object.type_key(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The value as a float if it is numeric.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Equality as tested by the `==` operator.
    ///
    /// Numbers compare by numeric value and values of the same kind compare structurally.
    /// Values of different kinds compare by their text forms, so `3 == "3"` holds.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, x)| b.get(k).map_or(false, |y| x.loosely_equals(y)))
            }
            (Value::Object(a), Value::Object(b)) if Arc::ptr_eq(a, b) => true,
            _ => self.to_text() == other.to_text(),
        }
    }

    /// Downcast an object value to its concrete type.
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        match self {
            Value::Object(object) => object.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }
}

fn write_float(f: f64, out: &mut String) {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        let _ = write!(out, "{f:.1}");
    } else {
        let _ = write!(out, "{f}");
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::List(list) => f.debug_list().entries(list).finish(),
            Value::Map(map) => f.debug_map().entries(map).finish(),
            Value::Object(object) => write!(f, "Object({})", object.class().name()),
        }
    }
}

/// Structural equality; objects are equal only to themselves.
///
/// Note that this is not the `==` operator of the template language,
///     which also compares integers with floats.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

macro_rules! value_from {
    ( $( $source: ty => $variant: ident $( as $cast: ty )?, )+ ) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(v $( as $cast )?)
                }
            }
        )+
    };
}

value_from!(
    bool => Bool,
    i64 => Int,
    i32 => Int as i64,
    u32 => Int as i64,
    f64 => Float,
    f32 => Float as f64,
    String => String,
    Map => Map,
);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
