//! Error types for the push channel.

use crate::manager::PushState;
use reachme_sync_engine::SyncError;
use thiserror::Error;

/// Result type for push operations.
pub type PushResult<T> = Result<T, PushError>;

/// Errors that can occur on the push channel.
#[derive(Error, Debug)]
pub enum PushError {
    /// The stored MQTT settings can't build a session.
    #[error("push channel not configured: {0}")]
    NotConfigured(String),

    /// The broker refused or dropped the connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Subscribe, publish or disconnect failed on an open session.
    #[error("session error: {0}")]
    Session(String),

    /// The operation isn't valid in the current state.
    #[error("invalid state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        /// State the operation needs.
        expected: PushState,
        /// State the manager was in.
        actual: PushState,
    },

    /// The presence payload couldn't be encoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The triggered fetch failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] SyncError),
}

impl PushError {
    /// Creates a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Creates a configuration error.
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured(message.into())
    }
}
