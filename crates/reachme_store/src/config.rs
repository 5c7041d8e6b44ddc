//! Store configuration.

use serde::Deserialize;
use std::path::PathBuf;

/// Configuration for opening a [`crate::ProfileStore`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the snapshot; `None` keeps everything in memory.
    pub path: Option<PathBuf>,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Number of change events kept for polling.
    pub change_history: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            create_if_missing: true,
            change_history: 1024,
        }
    }
}

impl StoreConfig {
    /// Creates an in-memory configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for a store directory.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub fn with_create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the change history length.
    #[must_use]
    pub fn with_change_history(mut self, events: usize) -> Self {
        self.change_history = events;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.path.is_none());
        assert!(config.create_if_missing);
    }

    #[test]
    fn builder_and_json() {
        let config = StoreConfig::at("/tmp/rm").with_create_if_missing(false);
        assert_eq!(config.path.as_deref(), Some(std::path::Path::new("/tmp/rm")));
        assert!(!config.create_if_missing);

        let parsed: StoreConfig =
            serde_json::from_str(r#"{"path": "/var/rm", "change_history": 16}"#).unwrap();
        assert_eq!(parsed.change_history, 16);
        assert!(parsed.create_if_missing);
    }
}
