//! # ReachMe Push
//!
//! Push channel for ReachMe: a broker session that tells the client when
//! new messages are waiting.
//!
//! This crate provides:
//! - `PushSession`: the broker connection, with events on a tokio channel
//! - `PushManager`: connect, subscribe and presence as a state machine
//! - `EventDispatcher`: turns inbound messages into background fetches
//! - Notification previews derived from push payloads
//!
//! ## Key Invariants
//!
//! - Each inbound message triggers exactly one background fetch
//! - A payload that can't be previewed never blocks its fetch
//! - The subscribe topic is the client id

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod preview;
mod session;

pub use config::{PushConfig, DEFAULT_PORT};
pub use error::{PushError, PushResult};
pub use manager::{
    DispatchStats, EventDispatcher, FetchTrigger, NotificationSink, PushManager, PushState,
};
pub use preview::{derive_preview, NotificationPreview, PREVIEW_TITLE};
pub use session::{MockSession, PushEvent, PushSession, QoS, SessionCall};
