//! # ReachMe Sync Engine
//!
//! Reconciliation of server responses into the local profile store, and the
//! async flows that drive it.
//!
//! This crate provides:
//! - The reconciler: one merge function per response kind
//! - `SyncCoordinator`: ordered flows (join, sign-in, fetches, updates)
//! - The message watermark (delta-fetch cursor)
//! - Transport abstraction with an HTTP implementation and a scripted mock
//!
//! ## Flow model
//!
//! Each flow is a chain of request → decode → merge steps. A step runs only
//! if the previous one succeeded; the first error ends the flow and is
//! returned to the caller. Nothing is retried automatically.
//!
//! ## Key Invariants
//!
//! - Stored messages are never overwritten by a fetch
//! - The watermark never decreases and commits with the messages it covers
//! - A response that fails to decode or merge leaves no visible writes
//! - Message fetches are serialized

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod http;
pub mod reconciler;
mod state;
mod transport;

pub use config::SyncConfig;
pub use coordinator::{FetchMode, SyncCoordinator};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport};
pub use reconciler::{MessageMerge, ProfileMerge, SettingsMerge};
pub use state::{SyncState, SyncStats};
pub use transport::{MockTransport, Transport};
