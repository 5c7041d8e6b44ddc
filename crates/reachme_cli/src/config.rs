//! CLI configuration file.

use reachme_store::{ContactMatch, StoreConfig};
use serde::Deserialize;
use std::path::Path;

/// Settings read from the `--config` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Store options; the path is always taken from the command line.
    pub store: StoreConfig,
    /// How server phone numbers are matched against contacts.
    pub contact_match: ContactMatch,
}

impl CliConfig {
    /// Loads the file at `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            None => Ok(Self::default()),
        }
    }

    /// Store options for a directory.
    pub fn store_at(&self, dir: &Path, create_if_missing: bool) -> StoreConfig {
        StoreConfig {
            path: Some(dir.to_path_buf()),
            create_if_missing,
            ..self.store.clone()
        }
    }
}
