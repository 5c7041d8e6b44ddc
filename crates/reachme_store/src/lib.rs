//! # ReachMe Store
//!
//! The local object graph and its transactional store.
//!
//! This crate provides:
//! - The entity model (`UserProfile` and everything it owns)
//! - `ProfileStore`: single-writer transactions over an `Arc` snapshot
//! - Snapshot backends (memory, CBOR file with lock and atomic rename)
//! - A change feed emitted after each commit
//! - A key-value `SettingsStore` for tokens and flags
//!
//! ## Key Invariants
//!
//! - Every entity is reachable only through the profile
//! - A failed transaction leaves no visible writes
//! - Messages and the fetch watermark commit together

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod change_feed;
mod config;
mod error;
pub mod model;
mod settings;
mod store;

pub use backend::{FileBackend, MemoryBackend, SnapshotBackend};
pub use change_feed::{diff_states, ChangeEvent, ChangeFeed, ChangeType, EntityRef};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use model::{
    Carrier, CarrierKey, ContactMatch, Message, MqttSettings, StoreState, SupportContact,
    UserContact, UserProfile, VoiceMail, VoipSettings, VolumeMode, NOT_SUPPORTED,
    SELECT_YOUR_CARRIER,
};
pub use settings::{keys, FileSettings, MemorySettings, SettingsStore};
pub use store::{ProfileStore, Transaction};
