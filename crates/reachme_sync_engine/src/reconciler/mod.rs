//! Merging decoded responses into the local graph.
//!
//! Every function here works on a [`Transaction`](reachme_store::Transaction)
//! and is meant to be the body of a single `ProfileStore::transaction` call
//! per API response. An error returned from any of them discards the working
//! copy, so a failed merge leaves nothing visible.
//!
//! ## Identity
//!
//! - Contacts by contact id
//! - Messages by server message id
//! - Carriers by `(country_code, network_id, vsms_node_id)` within a contact

mod carriers;
mod local;
mod messages;
mod profile;
mod settings;

pub use carriers::merge_carriers;
pub use local::{delete_message, delete_profile, mark_read, update_profile_details};
pub use messages::{merge_messages, MessageMerge};
pub use profile::{
    apply_phone_details, apply_profile_setting, merge_contacts, merge_login, merge_profile,
    store_login_keys, ProfileMerge,
};
pub use settings::{
    apply_carrier_selections, apply_custom_settings, collect_custom_settings, merge_settings,
    merge_voicemail, SettingsMerge,
};
