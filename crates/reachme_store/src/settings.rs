//! Key-value settings: auth tokens, registration keys and feature flags.
//!
//! Values are plain strings; typed helpers parse on read. The settings store
//! is independent of the profile snapshot and survives sign-out unless keys
//! are removed explicitly.

use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Well-known setting keys.
pub mod keys {
    /// Mirror of the committed fetch watermark.
    pub const FETCH_AFTER_MSGS_ID: &str = "fetch_after_msgs_id";
    /// Session key returned by login.
    pub const USER_SECURE_KEY: &str = "user_secure_key";
    /// Backend user id returned by login.
    pub const IV_USER_ID: &str = "iv_user_id";
    /// Registration key returned by `join_user`.
    pub const REG_SECURE_KEY: &str = "reg_secure_key";
    /// Push application id.
    pub const PNS_APP_ID: &str = "pns_app_id";
    /// Documentation URL.
    pub const DOCS_URL: &str = "docs_url";
    /// Whether `join_user` created a new account.
    pub const IS_RM_NEW_USER: &str = "is_rm_new_user";
    /// Push device token.
    pub const CLOUD_SECURE_KEY: &str = "cloud_secure_key";
    /// VoIP push token.
    pub const VOIP_CLOUD_SECURE_KEY: &str = "voip_cloud_secure_key";

    /// Keys tied to a session, removed on sign-out.
    pub const SESSION: [&str; 5] = [
        FETCH_AFTER_MSGS_ID,
        USER_SECURE_KEY,
        IV_USER_ID,
        REG_SECURE_KEY,
        IS_RM_NEW_USER,
    ];
}

/// Persisted key-value settings.
pub trait SettingsStore: Send + Sync {
    /// Returns the value for `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Sets `key` to `value`.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Returns the value for `key` parsed as an integer.
    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Returns the value for `key` parsed as a boolean.
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Sets `key` from any displayable value.
    fn set_value(&self, key: &str, value: &dyn std::fmt::Display) -> StoreResult<()> {
        self.set(key, &value.to_string())
    }
}

/// Settings kept in memory.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemorySettings {
    /// Creates an empty settings store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// Settings persisted as a JSON object in a single file.
///
/// Every write rewrites the file through a temporary file and a rename.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FileSettings {
    /// Opens the settings file at `path`, starting empty if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is not a JSON object of strings.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let values = if path.exists() {
            let data = fs::read(path)?;
            if data.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&data).map_err(|e| StoreError::settings(e.to_string()))?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values: RwLock::new(values),
        })
    }

    /// Returns the path of the settings file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> StoreResult<()> {
        let data =
            serde_json::to_vec_pretty(values).map_err(|e| StoreError::settings(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut values = self.values.write();
        let previous = values.insert(key.to_string(), value.to_string());
        if let Err(err) = self.persist(&values) {
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut values = self.values.write();
        let Some(previous) = values.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.persist(&values) {
            values.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }
}
