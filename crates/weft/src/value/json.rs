//! Conversion between [Value] and JSON.
//!
//! JSON `null` has no counterpart: null map entries are skipped and null list elements dropped,
//!     so that a reference to them is simply undefined.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::{Map, Value};

impl Value {
    /// Convert a JSON value; `null` converts to `None`.
    pub fn from_json(json: serde_json::Value) -> Option<Value> {
        Some(match json {
            serde_json::Value::Null => return None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64()?),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(array) => {
                Value::List(array.into_iter().filter_map(Value::from_json).collect())
            }
            serde_json::Value::Object(object) => Value::Map(json_object(object)),
        })
    }
}

/// Convert a JSON object into a map, skipping null entries.
pub fn json_object(object: serde_json::Map<String, serde_json::Value>) -> Map {
    object
        .into_iter()
        .filter_map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
        .collect()
}

/// Objects serialize as their text form.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for element in list {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            Value::Object(object) => serializer.serialize_str(&object.to_text()),
        }
    }
}
