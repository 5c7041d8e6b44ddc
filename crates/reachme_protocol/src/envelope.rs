//! Top-level response validation.
//!
//! Every backend response is a JSON object with a mandatory `status` field.
//! `"error"` means the server refused the command and `error_reason` holds a
//! human-readable reason. Any other status is success.
//!
//! A [`ResponseBody`] can only be obtained from a successful response, so the
//! typed decoders never see a rejected payload.

use crate::error::{ProtocolError, ProtocolResult};
use crate::fields::Fields;
use serde_json::{Map, Value};

/// Status value the backend uses to signal a rejected command.
pub const STATUS_ERROR: &str = "error";

/// A validated, successful response body.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBody {
    map: Map<String, Value>,
}

impl ResponseBody {
    /// Parses raw bytes and validates the status field.
    pub fn from_slice(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::MalformedBody(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validates an already-parsed JSON value.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        let map = match value {
            Value::Object(map) => map,
            _ => return Err(ProtocolError::NotAnObject),
        };

        let fields = Fields::new(&map);
        let status = fields.required_str("status")?;
        if status == STATUS_ERROR {
            let reason = fields.optional_str("error_reason").unwrap_or_default();
            return Err(ProtocolError::ServerRejected(reason));
        }

        Ok(Self { map })
    }

    /// Returns a field accessor over the body.
    pub fn fields(&self) -> Fields<'_> {
        Fields::new(&self.map)
    }

    /// Returns the raw body.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    /// Consumes the body and returns the raw map.
    pub fn into_map(self) -> Map<String, Value> {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_status_accepted() {
        let body = ResponseBody::from_value(json!({"status": "ok", "x": 1})).unwrap();
        assert_eq!(body.fields().required_i64("x").unwrap(), 1);
    }

    #[test]
    fn error_status_carries_reason() {
        let err = ResponseBody::from_slice(
            br#"{"status":"error","error_reason":"expired_session"}"#,
        )
        .unwrap_err();
        assert_eq!(err, ProtocolError::ServerRejected("expired_session".into()));
    }

    #[test]
    fn error_without_reason() {
        let err = ResponseBody::from_value(json!({"status": "error"})).unwrap_err();
        assert_eq!(err, ProtocolError::ServerRejected(String::new()));
    }

    #[test]
    fn missing_status_is_decode_failure() {
        let err = ResponseBody::from_value(json!({"msgs": []})).unwrap_err();
        assert_eq!(err, ProtocolError::missing("status"));
    }

    #[test]
    fn non_object_and_garbage() {
        assert_eq!(
            ResponseBody::from_value(json!([1, 2])).unwrap_err(),
            ProtocolError::NotAnObject
        );
        assert!(matches!(
            ResponseBody::from_slice(b"<html>"),
            Err(ProtocolError::MalformedBody(_))
        ));
    }
}
