//! Error types for the local store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or persisting local state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The snapshot could not be encoded.
    #[error("snapshot encode error: {0}")]
    Encode(String),

    /// The snapshot on disk could not be decoded.
    #[error("snapshot corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the store directory lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store directory does not exist and creation was not requested.
    #[error("store directory does not exist: {path}")]
    MissingDirectory {
        /// Directory that was looked up.
        path: String,
    },

    /// An operation needed a signed-in profile and none exists.
    #[error("no user profile in scope")]
    NoProfile,

    /// The backend refused the write.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The settings file could not be read or written.
    #[error("settings error: {0}")]
    Settings(String),
}

impl StoreError {
    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates a settings error.
    pub fn settings(message: impl Into<String>) -> Self {
        Self::Settings(message.into())
    }
}
