//! Error types for payload decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while validating or decoding a server payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// The server answered with `status == "error"`.
    #[error("server rejected request: {0}")]
    ServerRejected(String),

    /// The body was not valid JSON.
    #[error("malformed response body: {0}")]
    MalformedBody(String),

    /// The body was valid JSON but not an object.
    #[error("response body is not a JSON object")]
    NotAnObject,

    /// A required field was absent.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Dotted path of the field.
        field: String,
    },

    /// A field was present with an unexpected type or value.
    #[error("invalid field `{field}`: expected {expected}")]
    InvalidField {
        /// Dotted path of the field.
        field: String,
        /// Description of what was expected.
        expected: &'static str,
    },

    /// A JSON-in-string field failed its second decode pass.
    #[error("invalid embedded JSON in `{field}`: {message}")]
    EmbeddedJson {
        /// Dotted path of the field.
        field: String,
        /// Parser message.
        message: String,
    },

    /// A request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// Creates a missing field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid field error.
    pub fn invalid(field: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidField {
            field: field.into(),
            expected,
        }
    }

    /// Returns true if the server itself rejected the request.
    pub fn is_server_rejection(&self) -> bool {
        matches!(self, ProtocolError::ServerRejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::missing("msgs.0.msg_id");
        assert_eq!(err.to_string(), "missing required field `msgs.0.msg_id`");

        let err = ProtocolError::ServerRejected("expired_session".into());
        assert!(err.is_server_rejection());
        assert!(err.to_string().contains("expired_session"));
    }
}
