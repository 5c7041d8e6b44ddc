//! # ReachMe Protocol
//!
//! Payload decoding and request construction for the ReachMe backend.
//!
//! This crate provides:
//! - Top-level response validation (`status` / `error_reason`)
//! - Typed decoders for every response the sync layer merges
//! - The `custom_settings` tagged union
//! - `ApiRequest` builders for every server command
//!
//! ## Decoding rules
//!
//! - Required keys that are absent or mistyped fail with the dotted field path
//! - Optional keys decode to `None`, never to a default
//! - JSON-in-string fields get a second decode pass; an empty string is absent
//!
//! This is a pure crate with no I/O and no access to local state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod carriers;
pub mod custom_settings;
mod envelope;
mod error;
mod fields;
mod messages;
mod profile;
mod request;
mod settings;
mod ussd;

pub use auth::{JoinAction, JoinUserResponse, LoginResponse};
pub use carriers::{CarrierBranding, CarrierListResponse, CarrierRecord};
pub use custom_settings::{CarrierSelection, CustomSetting, PhoneDetails};
pub use envelope::{ResponseBody, STATUS_ERROR};
pub use error::{ProtocolError, ProtocolResult};
pub use fields::{objects_in, Fields};
pub use messages::{FetchMessagesResponse, MessageContact, MessageRecord};
pub use profile::{ContactRecord, Greeting, ProfileInfoResponse, VoicemailNotifications};
pub use request::{ApiRequest, Command, RequestContext, SimInfo};
pub use settings::{
    MqttRecord, SettingsResponse, SupportChannel, SupportContactRecord, VoicemailInfoRecord,
    VoipRecord,
};
pub use ussd::UssdCodes;
