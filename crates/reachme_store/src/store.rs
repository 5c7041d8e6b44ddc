//! The transactional profile store.
//!
//! ## Single-Writer Guarantee
//!
//! Only one write transaction runs at a time. A transaction mutates a private
//! copy of the graph; commit persists the copy, swaps it into the read
//! snapshot and then emits change events. If the closure returns an error or
//! the backend refuses the write, nothing becomes visible.
//!
//! Readers take an `Arc` of the current snapshot and never block writers.

use crate::backend::{FileBackend, MemoryBackend, SnapshotBackend};
use crate::change_feed::{diff_states, ChangeEvent, ChangeFeed};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::model::{StoreState, UserProfile};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;

/// The working copy handed to a write transaction.
#[derive(Debug)]
pub struct Transaction {
    state: StoreState,
}

impl Transaction {
    /// Returns the working copy.
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Returns true if a profile is in scope.
    pub fn has_profile(&self) -> bool {
        self.state.profile.is_some()
    }

    /// Returns the profile.
    ///
    /// # Errors
    ///
    /// Returns `NoProfile` if nobody is signed in.
    pub fn profile(&self) -> StoreResult<&UserProfile> {
        self.state.profile.as_ref().ok_or(StoreError::NoProfile)
    }

    /// Returns the profile, mutably.
    ///
    /// # Errors
    ///
    /// Returns `NoProfile` if nobody is signed in.
    pub fn profile_mut(&mut self) -> StoreResult<&mut UserProfile> {
        self.state.profile.as_mut().ok_or(StoreError::NoProfile)
    }

    /// Returns the profile for `user_id`, creating it if none exists.
    ///
    /// An existing profile for a different user is replaced and the
    /// watermark reset.
    pub fn profile_or_create(&mut self, user_id: &str) -> &mut UserProfile {
        if self
            .state
            .profile
            .as_ref()
            .is_some_and(|p| p.user_id != user_id)
        {
            self.delete_profile();
        }
        self.state
            .profile
            .get_or_insert_with(|| UserProfile::new(user_id))
    }

    /// Removes the profile and everything it owns. Returns true if one existed.
    pub fn delete_profile(&mut self) -> bool {
        self.state.watermark = 0;
        self.state.profile.take().is_some()
    }

    /// Returns the fetch watermark.
    pub fn watermark(&self) -> i64 {
        self.state.watermark
    }

    /// Raises the watermark to `candidate` if higher and returns the result.
    pub fn advance_watermark(&mut self, candidate: i64) -> i64 {
        self.state.watermark = self.state.watermark.max(candidate);
        self.state.watermark
    }
}

/// The local store for one signed-in user.
pub struct ProfileStore {
    backend: Mutex<Box<dyn SnapshotBackend>>,
    write_lock: Mutex<()>,
    snapshot: RwLock<Arc<StoreState>>,
    feed: ChangeFeed,
    sequence: AtomicU64,
}

impl ProfileStore {
    /// Opens an empty in-memory store.
    pub fn open_in_memory() -> Self {
        Self {
            backend: Mutex::new(Box::new(MemoryBackend::new())),
            write_lock: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(StoreState::default())),
            feed: ChangeFeed::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Opens a store as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be locked or the snapshot on
    /// disk cannot be decoded.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let backend: Box<dyn SnapshotBackend> = match &config.path {
            Some(path) => Box::new(FileBackend::open(path, config.create_if_missing)?),
            None => Box::new(MemoryBackend::new()),
        };
        Self::with_backend_and_history(backend, config.change_history)
    }

    /// Opens a store over an existing backend, loading its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded or decoded.
    pub fn with_backend(backend: impl SnapshotBackend + 'static) -> StoreResult<Self> {
        Self::with_backend_and_history(Box::new(backend), StoreConfig::default().change_history)
    }

    fn with_backend_and_history(
        backend: Box<dyn SnapshotBackend>,
        change_history: usize,
    ) -> StoreResult<Self> {
        let state = match backend.load()? {
            Some(bytes) => decode_state(&bytes)?,
            None => StoreState::default(),
        };
        tracing::debug!(
            messages = state.message_count(),
            watermark = state.watermark,
            "profile store opened"
        );

        Ok(Self {
            backend: Mutex::new(backend),
            write_lock: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(state)),
            feed: ChangeFeed::with_max_history(change_history),
            sequence: AtomicU64::new(0),
        })
    }

    /// Returns the current committed state.
    pub fn snapshot(&self) -> Arc<StoreState> {
        Arc::clone(&self.snapshot.read())
    }

    /// Runs `f` against the current committed state.
    pub fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&self.snapshot())
    }

    /// Returns the committed fetch watermark.
    pub fn watermark(&self) -> i64 {
        self.snapshot.read().watermark
    }

    /// Returns the sequence number of the last commit that changed anything.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Runs a write transaction.
    ///
    /// The closure works on a private copy of the graph. Returning `Ok`
    /// commits; returning `Err` discards the copy. A commit that changes
    /// nothing is not persisted.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or the persistence error converted into `E`.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.write_lock.lock();

        let before = self.snapshot();
        let mut txn = Transaction {
            state: StoreState::clone(&before),
        };
        let value = f(&mut txn)?;

        let next_sequence = self.sequence.load(Ordering::SeqCst) + 1;
        let events = diff_states(next_sequence, &before, &txn.state);
        if events.is_empty() {
            return Ok(value);
        }

        let bytes = encode_state(&txn.state)?;
        if let Err(err) = self.backend.lock().save(&bytes) {
            tracing::error!(error = %err, "failed to persist profile snapshot");
            return Err(err.into());
        }

        *self.snapshot.write() = Arc::new(txn.state);
        self.sequence.store(next_sequence, Ordering::SeqCst);
        tracing::debug!(
            sequence = next_sequence,
            changes = events.len(),
            "transaction committed"
        );
        self.feed.emit_batch(events);

        Ok(value)
    }

    /// Runs a write transaction on a background thread.
    ///
    /// `completion` receives `None` on commit or the error that aborted it.
    pub fn perform_background<F, C>(self: &Arc<Self>, work: F, completion: C) -> JoinHandle<()>
    where
        F: FnOnce(&mut Transaction) -> StoreResult<()> + Send + 'static,
        C: FnOnce(Option<StoreError>) + Send + 'static,
    {
        let store = Arc::clone(self);
        std::thread::spawn(move || {
            completion(store.transaction(work).err());
        })
    }

    /// Subscribes to committed changes.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Returns the change feed.
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

fn encode_state(state: &StoreState) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(state, &mut bytes).map_err(|e| StoreError::encode(e.to_string()))?;
    Ok(bytes)
}

fn decode_state(bytes: &[u8]) -> StoreResult<StoreState> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::corrupted(e.to_string()))
}
