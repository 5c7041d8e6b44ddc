//! Snapshot backends.
//!
//! Backends are opaque byte stores holding the latest encoded snapshot. The
//! store owns the encoding; a backend only loads and replaces bytes.
//!
//! ```text
//! <store_dir>/
//! ├─ LOCK               # Advisory lock for single-process access
//! ├─ profile.cbor       # Latest committed snapshot
//! └─ profile.cbor.tmp   # Write-then-rename staging file
//! ```

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const LOCK_FILE: &str = "LOCK";
const SNAPSHOT_FILE: &str = "profile.cbor";
const SNAPSHOT_TEMP: &str = "profile.cbor.tmp";

/// Durable storage for the encoded snapshot.
///
/// # Invariants
///
/// - `load` returns exactly the bytes of the last successful `save`
/// - a failed `save` leaves the previous snapshot intact
pub trait SnapshotBackend: Send + Sync {
    /// Loads the last saved snapshot, or `None` for a fresh store.
    fn load(&self) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the snapshot.
    fn save(&mut self, bytes: &[u8]) -> StoreResult<()>;
}

/// An in-memory backend for tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Option<Vec<u8>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a switch that makes every later `save` fail while set.
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_writes)
    }
}

impl SnapshotBackend for MemoryBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.clone())
    }

    fn save(&mut self, bytes: &[u8]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("injected failure".into()));
        }
        self.data = Some(bytes.to_vec());
        Ok(())
    }
}

/// A directory-backed snapshot file.
///
/// The backend holds an exclusive lock on the directory for its lifetime.
/// Saves write a temporary file, sync it and rename it over the snapshot.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(dir: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !dir.exists() {
            if create_if_missing {
                fs::create_dir_all(dir)?;
            } else {
                return Err(StoreError::MissingDirectory {
                    path: dir.display().to_string(),
                });
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl SnapshotBackend for FileBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        let mut data = Vec::new();
        File::open(&path)?.read_to_end(&mut data)?;
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(data))
    }

    fn save(&mut self, bytes: &[u8]) -> StoreResult<()> {
        let temp_path = self.dir.join(SNAPSHOT_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.snapshot_path())?;
        self.sync_directory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_round_trip_and_failure() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.load().unwrap(), None);

        backend.save(b"one").unwrap();
        let switch = backend.failure_switch();
        switch.store(true, Ordering::SeqCst);
        assert!(matches!(backend.save(b"two"), Err(StoreError::WriteFailed(_))));
        assert_eq!(backend.load().unwrap().as_deref(), Some(&b"one"[..]));
    }

    #[test]
    fn file_save_replaces_snapshot() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("store"), true).unwrap();
        assert_eq!(backend.load().unwrap(), None);

        backend.save(b"first").unwrap();
        backend.save(b"second").unwrap();
        assert_eq!(backend.load().unwrap().as_deref(), Some(&b"second"[..]));
        assert!(!dir.path().join("store").join(SNAPSHOT_TEMP).exists());
    }

    #[test]
    fn file_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let _first = FileBackend::open(dir.path(), true).unwrap();
        assert!(matches!(
            FileBackend::open(dir.path(), true),
            Err(StoreError::Locked)
        ));
    }

    #[test]
    fn missing_directory() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            FileBackend::open(&dir.path().join("absent"), false),
            Err(StoreError::MissingDirectory { .. })
        ));
    }
}
