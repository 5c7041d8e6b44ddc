//! Typed accessors over a decoded JSON object.
//!
//! The backend sends loosely typed mappings. Every decoder in this crate
//! reads them through [`Fields`], which enforces one rule set:
//!
//! - `required_*` accessors fail with [`ProtocolError::MissingField`] when the
//!   key is absent (or `null`) and with [`ProtocolError::InvalidField`] when the
//!   value has the wrong type.
//! - `optional_*` accessors return `None` for absent, `null` or mistyped
//!   values. They never substitute a default.
//! - `embedded_*` accessors run the second decode pass for fields that carry
//!   JSON encoded inside a string. An empty string counts as absent.
//!
//! Errors carry the dotted path of the offending field (`msgs.1.msg_id`).

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::{Map, Value};

/// A read-only view of a JSON object with path-aware accessors.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Fields<'a> {
    /// Creates a view over a top-level object.
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self {
            map,
            path: String::new(),
        }
    }

    /// Creates a view over a nested object located at `path`.
    pub fn nested(map: &'a Map<String, Value>, path: impl Into<String>) -> Self {
        Self {
            map,
            path: path.into(),
        }
    }

    /// Returns the dotted path of `key` relative to the response root.
    pub fn path_of(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    /// Returns the underlying map.
    pub fn as_map(&self) -> &'a Map<String, Value> {
        self.map
    }

    /// Returns true if `key` is present with a non-null value.
    pub fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Returns the raw value for `key`, treating `null` as absent.
    pub fn value(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    /// Reads a required string.
    pub fn required_str(&self, key: &str) -> ProtocolResult<String> {
        match self.value(key) {
            None => Err(ProtocolError::missing(self.path_of(key))),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(ProtocolError::invalid(self.path_of(key), "a string")),
        }
    }

    /// Reads an optional string.
    pub fn optional_str(&self, key: &str) -> Option<String> {
        self.value(key).and_then(Value::as_str).map(str::to_owned)
    }

    /// Reads a required boolean.
    pub fn required_bool(&self, key: &str) -> ProtocolResult<bool> {
        match self.value(key) {
            None => Err(ProtocolError::missing(self.path_of(key))),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ProtocolError::invalid(self.path_of(key), "a boolean")),
        }
    }

    /// Reads an optional boolean.
    pub fn optional_bool(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(Value::as_bool)
    }

    /// Reads an optional flag sent either as a boolean or as `0`/`1`.
    pub fn optional_flag(&self, key: &str) -> Option<bool> {
        match self.value(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Reads a required integer.
    pub fn required_i64(&self, key: &str) -> ProtocolResult<i64> {
        match self.value(key) {
            None => Err(ProtocolError::missing(self.path_of(key))),
            Some(v) => v
                .as_i64()
                .ok_or_else(|| ProtocolError::invalid(self.path_of(key), "an integer")),
        }
    }

    /// Reads an optional integer.
    pub fn optional_i64(&self, key: &str) -> Option<i64> {
        self.value(key).and_then(Value::as_i64)
    }

    /// Reads a required integer that must fit in 32 bits.
    pub fn required_i32(&self, key: &str) -> ProtocolResult<i32> {
        let value = self.required_i64(key)?;
        i32::try_from(value)
            .map_err(|_| ProtocolError::invalid(self.path_of(key), "a 32-bit integer"))
    }

    /// Reads an optional 32-bit integer.
    pub fn optional_i32(&self, key: &str) -> Option<i32> {
        self.optional_i64(key).and_then(|v| i32::try_from(v).ok())
    }

    /// Reads an optional nested object.
    pub fn optional_object(&self, key: &str) -> Option<Fields<'a>> {
        match self.value(key)? {
            Value::Object(map) => Some(Fields::nested(map, self.path_of(key))),
            _ => None,
        }
    }

    /// Reads a required array whose elements must all be objects.
    pub fn required_objects(&self, key: &str) -> ProtocolResult<Vec<Fields<'a>>> {
        match self.value(key) {
            None => Err(ProtocolError::missing(self.path_of(key))),
            Some(Value::Array(items)) => objects_in(items, &self.path_of(key)),
            Some(_) => Err(ProtocolError::invalid(self.path_of(key), "an array")),
        }
    }

    /// Reads an array of objects; an absent key yields an empty list.
    pub fn optional_objects(&self, key: &str) -> ProtocolResult<Vec<Fields<'a>>> {
        if self.contains(key) {
            self.required_objects(key)
        } else {
            Ok(Vec::new())
        }
    }

    /// Decodes a field holding a JSON object, either inline or encoded in a string.
    pub fn embedded_object(&self, key: &str) -> ProtocolResult<Option<Map<String, Value>>> {
        match self.embedded(key)? {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(ProtocolError::invalid(self.path_of(key), "a JSON object")),
        }
    }

    /// Decodes a field holding a JSON array, either inline or encoded in a string.
    pub fn embedded_array(&self, key: &str) -> ProtocolResult<Option<Vec<Value>>> {
        match self.embedded(key)? {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(ProtocolError::invalid(self.path_of(key), "a JSON array")),
        }
    }

    fn embedded(&self, key: &str) -> ProtocolResult<Option<Value>> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => serde_json::from_str(s).map(Some).map_err(|e| {
                ProtocolError::EmbeddedJson {
                    field: self.path_of(key),
                    message: e.to_string(),
                }
            }),
            Some(other) => Ok(Some(other.clone())),
        }
    }
}

/// Views every element of `items` as an object, failing on the first non-object.
pub fn objects_in<'a>(items: &'a [Value], path: &str) -> ProtocolResult<Vec<Fields<'a>>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(Fields::nested(map, format!("{}.{}", path, index))),
            _ => Err(ProtocolError::invalid(
                format!("{}.{}", path, index),
                "an object",
            )),
        })
        .collect()
}
