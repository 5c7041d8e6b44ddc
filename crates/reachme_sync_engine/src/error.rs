//! Error types for the sync engine.

use reachme_protocol::ProtocolError;
use reachme_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync step.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The request never produced a response.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The server answered with `status == "error"`.
    #[error("server rejected request: {0}")]
    ServerRejected(String),

    /// The response could not be decoded or applied.
    #[error("decode failure: {0}")]
    DecodeFailure(ProtocolError),

    /// The store refused the write.
    #[error("persistence failure: {0}")]
    PersistenceFailure(StoreError),

    /// No profile is in scope.
    #[error("not signed in")]
    NotSignedIn,

    /// A record refers to a phone number with no matching contact.
    #[error("no contact matches `{0}`")]
    UnknownContact(String),
}

impl SyncError {
    /// Creates a network failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure(message.into())
    }

    /// Returns true if the server itself refused the request.
    pub fn is_server_rejection(&self) -> bool {
        matches!(self, SyncError::ServerRejected(_))
    }

    /// Returns a single message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::NetworkFailure(message) => {
                format!("Could not reach the server: {}", message)
            }
            SyncError::ServerRejected(reason) if reason.is_empty() => {
                "The server rejected the request.".to_string()
            }
            SyncError::ServerRejected(reason) => reason.clone(),
            SyncError::DecodeFailure(_) => {
                "The server sent a response this app could not understand.".to_string()
            }
            SyncError::PersistenceFailure(_) => "Your data could not be saved.".to_string(),
            SyncError::NotSignedIn => "Please sign in again.".to_string(),
            SyncError::UnknownContact(phone) => format!("{} is not one of your numbers.", phone),
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::ServerRejected(reason) => SyncError::ServerRejected(reason),
            other => SyncError::DecodeFailure(other),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoProfile => SyncError::NotSignedIn,
            other => SyncError::PersistenceFailure(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_conversion() {
        let err: SyncError = ProtocolError::ServerRejected("expired_session".into()).into();
        assert!(err.is_server_rejection());
        assert_eq!(err.user_message(), "expired_session");

        let err: SyncError = ProtocolError::missing("msgs").into();
        assert!(matches!(err, SyncError::DecodeFailure(_)));
    }

    #[test]
    fn store_conversion() {
        let err: SyncError = StoreError::NoProfile.into();
        assert!(matches!(err, SyncError::NotSignedIn));

        let err: SyncError = StoreError::Locked.into();
        assert!(matches!(err, SyncError::PersistenceFailure(_)));
    }

    #[test]
    fn error_display() {
        let err = SyncError::network("connection reset");
        assert_eq!(err.to_string(), "network failure: connection reset");
        assert!(err.user_message().contains("connection reset"));

        let err = SyncError::ServerRejected(String::new());
        assert_eq!(err.user_message(), "The server rejected the request.");
    }
}
