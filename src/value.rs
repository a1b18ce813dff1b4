//! Typed value model
//!
//! Values are stored on the wire as `tag:payload` envelopes; [`Value`] is the
//! in-memory side of that mapping. Built-in variants cover the usual scalar
//! and container types, while [`Value::Ext`] carries instances of
//! caller-registered types in their native string form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultDictError};

/// A typed value held by a dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    /// A value of a caller-registered type. `data` is the type's native
    /// string form as produced by its [`Extended`](crate::Extended) encoding.
    Ext { tag: String, data: String },
}

impl Value {
    /// The wire tag identifying which encoder/decoder governs this value.
    pub fn type_tag(&self) -> &str {
        match self {
            Value::Str(_) => "str",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Null => "none",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Ext { tag, .. } => tag,
        }
    }

    /// Human-readable variant name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "str",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Null => "none",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Ext { .. } => "ext",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
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
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Convert to a JSON value for container payload encoding.
    ///
    /// `Ext` values have no JSON form; embedding them in a list or dict is a
    /// serialization error.
    pub(crate) fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Int(i) => Ok(serde_json::Value::from(*i)),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| {
                    VaultDictError::Decode {
                        tag: "float".to_string(),
                        reason: format!("{} has no JSON representation", f),
                    }
                }),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Null => Ok(serde_json::Value::Null),
            Value::List(items) => Ok(serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json())
                    .collect::<Result<Vec<_>>>()?,
            )),
            Value::Dict(map) => {
                let mut object = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    object.insert(key.clone(), value.to_json()?);
                }
                Ok(serde_json::Value::Object(object))
            }
            Value::Ext { tag, .. } => Err(VaultDictError::Decode {
                tag: tag.clone(),
                reason: "extension values cannot be nested in containers".to_string(),
            }),
        }
    }

    /// Build a value from a JSON value decoded out of a container payload.
    pub(crate) fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(object) => Value::Dict(
                object
                    .into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Dict(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        match option {
            Some(value) => value.into(),
            None => Value::Null,
        }
    }
}

impl TryFrom<Value> for String {
    type Error = VaultDictError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(VaultDictError::TypeMismatch {
                expected: "str",
                found: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = VaultDictError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(VaultDictError::TypeMismatch {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = VaultDictError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            other => Err(VaultDictError::TypeMismatch {
                expected: "float",
                found: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = VaultDictError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(VaultDictError::TypeMismatch {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }
}
