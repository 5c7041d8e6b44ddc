//! The local object graph.
//!
//! Everything hangs off a single [`UserProfile`]. Contacts are keyed by
//! contact id and messages by server message id, so uniqueness within a
//! profile is structural. Carriers live inside the contact that listed them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Network name shown when a carrier supports no ReachMe service.
pub const NOT_SUPPORTED: &str = "Not supported";

/// Network name of a placeholder carrier awaiting user choice.
pub const SELECT_YOUR_CARRIER: &str = "Select Your Carrier";

/// Audio routing preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMode {
    /// Earpiece.
    #[default]
    Receiver,
    /// Loudspeaker.
    Speaker,
}

/// How a server-sent phone number is matched against stored contact ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMatch {
    /// The contact id contains the needle, ignoring case.
    #[default]
    Substring,
    /// The contact id equals the needle.
    Exact,
}

impl ContactMatch {
    /// Returns true if `contact_id` matches `needle` under this mode.
    pub fn matches(&self, contact_id: &str, needle: &str) -> bool {
        match self {
            ContactMatch::Exact => contact_id == needle,
            ContactMatch::Substring => contact_id
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }
}

/// Identity of a carrier within a contact's candidate set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CarrierKey {
    /// Country code.
    pub country_code: Option<String>,
    /// Network id.
    pub network_id: Option<String>,
    /// VSMS node id.
    pub vsms_node_id: i32,
}

/// A network option for a country.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carrier {
    /// Carrier name.
    pub carrier_name: Option<String>,
    /// Network name.
    pub network_name: Option<String>,
    /// Country code.
    pub country_code: Option<String>,
    /// Network id.
    pub network_id: Option<String>,
    /// VSMS node id.
    pub vsms_node_id: i32,
    /// The `ussd_string` as received.
    pub ussd_string: Option<String>,
    /// International service supported.
    pub reach_me_intl: bool,
    /// Home service supported.
    pub reach_me_home: bool,
    /// Voicemail service supported.
    pub reach_me_voicemail: bool,
    /// True when any of the three ReachMe flags is set.
    pub is_reach_me_support: bool,
    /// Code activating unconditional forwarding.
    pub acti_uncf: Option<String>,
    /// Code deactivating unconditional forwarding.
    pub deacti_uncf: Option<String>,
    /// Code activating all forwarding.
    pub acti_all: Option<String>,
    /// Code deactivating both forwarding modes.
    pub deacti_both: Option<String>,
    /// Code activating conditional forwarding.
    pub acti_cnf: Option<String>,
    /// Code deactivating conditional forwarding.
    pub deacti_cnf: Option<String>,
    /// Free-form activation instructions.
    pub additional_acti_info: Option<String>,
    /// HLR call forwarding enabled.
    pub hlr_enabled: bool,
    /// VoIP enabled.
    pub voip_enabled: bool,
    /// Logo home URL.
    pub logo_home_url: Option<String>,
    /// Logo support URL.
    pub logo_support_url: Option<String>,
    /// Logo theme color.
    pub logo_theme_color: Option<String>,
    /// Carrier logo.
    pub logo_url: Option<String>,
    /// In-app promotion image.
    pub in_app_promo_image_url: Option<String>,
}

impl Carrier {
    /// Creates an empty carrier with the given identity.
    pub fn with_key(key: &CarrierKey) -> Self {
        Self {
            country_code: key.country_code.clone(),
            network_id: key.network_id.clone(),
            vsms_node_id: key.vsms_node_id,
            ..Default::default()
        }
    }

    /// Creates a placeholder selection for a carrier not in the candidate set.
    pub fn placeholder(key: &CarrierKey) -> Self {
        Self {
            network_name: Some(SELECT_YOUR_CARRIER.to_string()),
            ..Self::with_key(key)
        }
    }

    /// Returns the identity tuple.
    pub fn key(&self) -> CarrierKey {
        CarrierKey {
            country_code: self.country_code.clone(),
            network_id: self.network_id.clone(),
            vsms_node_id: self.vsms_node_id,
        }
    }

    /// Sets the three ReachMe flags and derives the support flag.
    ///
    /// A carrier with no ReachMe service gets the network name
    /// [`NOT_SUPPORTED`].
    pub fn set_capabilities(&mut self, intl: bool, home: bool, voicemail: bool) {
        self.reach_me_intl = intl;
        self.reach_me_home = home;
        self.reach_me_voicemail = voicemail;
        self.is_reach_me_support = intl || home || voicemail;
        if !self.is_reach_me_support {
            self.network_name = Some(NOT_SUPPORTED.to_string());
        }
    }
}

/// Voicemail counters and forwarding state for one line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceMail {
    /// Phone number.
    pub phone_number: Option<String>,
    /// Carrier country code.
    pub carrier_country_code: Option<String>,
    /// KVSMS key.
    pub kvsms_key: Option<String>,
    /// Network id.
    pub network_id: Option<String>,
    /// Whether the line's country supports voicemail.
    pub country_voicemail_support: bool,
    /// Voicemail enabled.
    pub enabled: bool,
    /// Available voicemail count.
    pub available_voicemail_count: i32,
    /// Missed call count.
    pub missed_call_count: i32,
    /// Real voicemail count.
    pub real_voicemail_count: i32,
    /// Real missed call count.
    pub real_missed_call_count: i32,
    /// New message count.
    pub new_message_count: i32,
    /// Old message count.
    pub old_message_count: i32,
    /// Last voicemail timestamp.
    pub last_voicemail_timestamp: i64,
    /// Last missed call timestamp.
    pub last_missed_call_timestamp: i64,
    /// VSMS node id.
    pub vsms_node_id: i32,
    /// Code activating unconditional forwarding.
    pub acti_uncf: Option<String>,
    /// Code deactivating unconditional forwarding.
    pub deacti_uncf: Option<String>,
    /// Code activating all forwarding.
    pub acti_all: Option<String>,
    /// Code deactivating both forwarding modes.
    pub deacti_both: Option<String>,
    /// Code activating conditional forwarding.
    pub acti_cnf: Option<String>,
    /// Code deactivating conditional forwarding.
    pub deacti_cnf: Option<String>,
    /// Free-form activation instructions.
    pub additional_acti_info: Option<String>,
    /// HLR call forwarding enabled.
    pub hlr_enabled: bool,
    /// VoIP enabled.
    pub voip_enabled: bool,
    /// Home service supported.
    pub rm_home: bool,
    /// International service supported.
    pub rm_intl: bool,
    /// Voicemail service supported.
    pub rm_vm: bool,
}

/// One of the user's phone lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    /// Phone number or identifier; unique within the profile.
    pub contact_id: String,
    /// Contact type.
    pub contact_type: Option<String>,
    /// Country code.
    pub country_code: Option<String>,
    /// Is primary.
    pub is_primary: bool,
    /// Blogger id.
    pub blogger_id: i64,
    /// User-chosen title.
    pub title_name: Option<String>,
    /// User-chosen image.
    pub image_name: Option<String>,
    /// Home service active.
    pub reach_me_home_active: bool,
    /// International service active.
    pub reach_me_intl_active: bool,
    /// Voicemail active.
    pub reach_me_voicemail_active: bool,
    /// Candidate carriers, unique by [`CarrierKey`].
    pub carriers: Vec<Carrier>,
    /// The carrier the user is on.
    pub selected_carrier: Option<Carrier>,
    /// Voicemail.
    pub voicemail: Option<VoiceMail>,
}

impl UserContact {
    /// Creates a contact with only its id set.
    pub fn new(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            ..Default::default()
        }
    }

    /// Looks a candidate carrier up by identity.
    pub fn carrier(&self, key: &CarrierKey) -> Option<&Carrier> {
        self.carriers.iter().find(|c| c.key() == *key)
    }

    /// Returns the candidate carrier with `key`, inserting an empty one if absent.
    pub fn carrier_entry(&mut self, key: &CarrierKey) -> &mut Carrier {
        let index = match self.carriers.iter().position(|c| c.key() == *key) {
            Some(index) => index,
            None => {
                self.carriers.push(Carrier::with_key(key));
                self.carriers.len() - 1
            }
        };
        &mut self.carriers[index]
    }

    /// Returns the voicemail record, creating it if absent.
    pub fn voicemail_entry(&mut self) -> &mut VoiceMail {
        self.voicemail.get_or_insert_with(VoiceMail::default)
    }
}

/// A support or feedback channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportContact {
    /// User id.
    pub user_id: Option<String>,
    /// Phone.
    pub phone: Option<String>,
    /// Profile pic URL.
    pub profile_pic_url: Option<String>,
    /// Thumbnail pic URL.
    pub thumbnail_pic_url: Option<String>,
    /// Show the account as an in-app user.
    pub show_as_iv_user: bool,
    /// Support type.
    pub support_type: Option<String>,
    /// Support id.
    pub support_id: Option<String>,
    /// Send email.
    pub send_email: bool,
    /// Reachable in-app.
    pub send_iv: bool,
    /// Send sms.
    pub send_sms: bool,
}

/// A synced message.
///
/// Content is immutable once stored. Read and delete state are the only
/// local mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned message id.
    pub message_id: i64,
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    /// Content.
    pub content: Option<String>,
    /// `t` (text), `a` (audio) or `i` (image).
    pub content_type: Option<String>,
    /// `r` (received) or `s` (sent).
    pub flow: Option<String>,
    /// From phone number.
    pub from_phone_number: Option<String>,
    /// Number the message was sent to.
    pub receive_phone_number: Option<String>,
    /// Contact type of the sender.
    pub from_user_type: Option<String>,
    /// Guid.
    pub guid: Option<String>,
    /// Misscall reason.
    pub misscall_reason: Option<String>,
    /// Sender name.
    pub sender_name: Option<String>,
    /// Source app type.
    pub source_app_type: Option<String>,
    /// Subtype.
    pub subtype: Option<String>,
    /// Message type.
    pub message_type: Option<String>,
    /// Media format.
    pub media_format: Option<String>,
    /// Backend user id of the sender.
    pub from_iv_user_id: i64,
    /// Id of a related message.
    pub linked_message_id: i64,
    /// Read count.
    pub read_count: i32,
    /// Download count.
    pub download_count: i32,
    /// Whether `content` is base64 encoded.
    pub is_base64: bool,
}

impl Message {
    /// Returns the message date as a UTC timestamp.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.date)
    }

    /// Returns true once the message has been read at least once.
    pub fn is_read(&self) -> bool {
        self.read_count > 0
    }
}

/// Push broker credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttSettings {
    /// Chat topic.
    pub chat_topic: Option<String>,
    /// Chat user.
    pub chat_user: Option<String>,
    /// Chat password.
    pub chat_password: Option<String>,
    /// Chat hostname.
    pub chat_hostname: Option<String>,
    /// Chat port ssl.
    pub chat_port_ssl: Option<String>,
    /// Mqtt hostname.
    pub mqtt_hostname: Option<String>,
    /// Mqtt password.
    pub mqtt_password: Option<String>,
    /// Mqtt user.
    pub mqtt_user: Option<String>,
    /// Mqtt port ssl.
    pub mqtt_port_ssl: Option<String>,
    /// Device id used to build the client id.
    pub device_id: i64,
}

/// VoIP account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoipSettings {
    /// Login.
    pub login: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Ip address.
    pub ip_address: Option<String>,
    /// Port.
    pub port: i32,
}

/// The signed-in user and everything they own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Login phone number.
    pub user_id: String,
    /// Backend user id.
    pub iv_user_id: i64,
    /// User name.
    pub user_name: Option<String>,
    /// Email.
    pub email: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State.
    pub state: Option<String>,
    /// Gender.
    pub gender: Option<String>,
    /// Birthday.
    pub birthday: Option<NaiveDate>,
    /// Profile pic URL.
    pub profile_pic_url: Option<String>,
    /// Thumbnail pic URL.
    pub thumbnail_pic_url: Option<String>,
    /// Invite sms text.
    pub invite_sms_text: Option<String>,
    /// ISO country of the SIM.
    pub country_iso_code: Option<String>,
    /// SIM operator MCC-MNC.
    pub sim_mcc_mnc: Option<String>,
    /// Facebook connect URL.
    pub fb_connect_url: Option<String>,
    /// Twitter connect URL.
    pub tw_connect_url: Option<String>,
    /// Facebook connected.
    pub fb_connected: bool,
    /// Twitter connected.
    pub tw_connected: bool,
    /// Post to Facebook.
    pub fb_post_enabled: bool,
    /// Post to Twitter.
    pub tw_post_enabled: bool,
    /// Greeting name uri.
    pub greeting_name_uri: Option<String>,
    /// Greeting name duration.
    pub greeting_name_duration: i32,
    /// Greeting welcome uri.
    pub greeting_welcome_uri: Option<String>,
    /// Greeting welcome duration.
    pub greeting_welcome_duration: i32,
    /// Voicemail email.
    pub voicemail_email: Option<String>,
    /// Time zone.
    pub time_zone: Option<String>,
    /// Mail voicemails.
    pub vsms_enabled: bool,
    /// Mail missed calls.
    pub mc_enabled: bool,
    /// Record mode.
    pub record_mode: Option<String>,
    /// Recording time.
    pub recording_time: Option<String>,
    /// Storage location.
    pub storage_location: Option<String>,
    /// Audio routing preference.
    pub volume_mode: VolumeMode,
    /// Id of the primary line.
    pub primary_contact_id: Option<String>,
    /// Phone lines keyed by contact id.
    pub contacts: BTreeMap<String, UserContact>,
    /// Support and feedback channels.
    pub support_contacts: Vec<SupportContact>,
    /// Messages keyed by server id.
    pub messages: BTreeMap<i64, Message>,
    /// Push broker credentials.
    pub mqtt: Option<MqttSettings>,
    /// VoIP account.
    pub voip: Option<VoipSettings>,
}

impl UserProfile {
    /// Creates a profile for a login phone number.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Looks a contact up by exact id.
    pub fn contact(&self, contact_id: &str) -> Option<&UserContact> {
        self.contacts.get(contact_id)
    }

    /// Looks a contact up by exact id, mutably.
    pub fn contact_mut(&mut self, contact_id: &str) -> Option<&mut UserContact> {
        self.contacts.get_mut(contact_id)
    }

    /// Returns the contact with `contact_id`, creating it if absent.
    pub fn contact_entry(&mut self, contact_id: &str) -> &mut UserContact {
        self.contacts
            .entry(contact_id.to_string())
            .or_insert_with(|| UserContact::new(contact_id))
    }

    /// Finds the first contact whose id matches `needle`.
    pub fn find_contact(&self, needle: &str, mode: ContactMatch) -> Option<&UserContact> {
        self.contacts
            .values()
            .find(|c| mode.matches(&c.contact_id, needle))
    }

    /// Returns the id of the first contact whose id matches `needle`.
    pub fn find_contact_id(&self, needle: &str, mode: ContactMatch) -> Option<String> {
        self.find_contact(needle, mode).map(|c| c.contact_id.clone())
    }

    /// Returns the primary contact.
    pub fn primary_contact(&self) -> Option<&UserContact> {
        self.primary_contact_id
            .as_deref()
            .and_then(|id| self.contacts.get(id))
    }

    /// Returns the primary contact, mutably.
    pub fn primary_contact_mut(&mut self) -> Option<&mut UserContact> {
        let id = self.primary_contact_id.clone()?;
        self.contacts.get_mut(&id)
    }

    /// Returns true if a message with `message_id` is stored.
    pub fn has_message(&self, message_id: i64) -> bool {
        self.messages.contains_key(&message_id)
    }

    /// Returns messages newest first.
    pub fn messages_by_date(&self) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self.messages.values().collect();
        messages.sort_by(|a, b| b.date.cmp(&a.date).then(b.message_id.cmp(&a.message_id)));
        messages
    }

    /// Returns messages matching `predicate`, newest first.
    pub fn filter_messages(&self, predicate: impl Fn(&Message) -> bool) -> Vec<&Message> {
        self.messages_by_date()
            .into_iter()
            .filter(|m| predicate(m))
            .collect()
    }

    /// Returns the number of unread received messages.
    pub fn unread_count(&self) -> usize {
        self.messages
            .values()
            .filter(|m| !m.is_read() && m.flow.as_deref() == Some("r"))
            .count()
    }

    /// Returns the highest stored message id.
    pub fn max_message_id(&self) -> Option<i64> {
        self.messages.keys().next_back().copied()
    }
}

/// The persisted root: the profile plus store-level metadata.
///
/// The watermark lives next to the messages so both commit together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    /// The signed-in profile.
    pub profile: Option<UserProfile>,
    /// Highest message id merged so far.
    pub watermark: i64,
}

impl StoreState {
    /// Returns the number of stored messages.
    pub fn message_count(&self) -> usize {
        self.profile.as_ref().map_or(0, |p| p.messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(vsms: i32) -> CarrierKey {
        CarrierKey {
            country_code: Some("91".into()),
            network_id: Some("404-10".into()),
            vsms_node_id: vsms,
        }
    }

    #[test]
    fn contact_match_modes() {
        assert!(ContactMatch::Substring.matches("+919900000001", "9900000001"));
        assert!(ContactMatch::Substring.matches("ABC", "b"));
        assert!(!ContactMatch::Exact.matches("+919900000001", "9900000001"));
        assert!(ContactMatch::Exact.matches("919900000001", "919900000001"));
    }

    #[test]
    fn carrier_entry_is_unique_by_key() {
        let mut contact = UserContact::new("919900000001");
        contact.carrier_entry(&key(1)).carrier_name = Some("A".into());
        contact.carrier_entry(&key(1)).carrier_name = Some("B".into());
        contact.carrier_entry(&key(2));

        assert_eq!(contact.carriers.len(), 2);
        assert_eq!(
            contact.carrier(&key(1)).unwrap().carrier_name.as_deref(),
            Some("B")
        );
    }

    #[test]
    fn capability_derivation() {
        let mut carrier = Carrier::with_key(&key(1));
        carrier.network_name = Some("Airtel".into());

        carrier.set_capabilities(false, false, false);
        assert!(!carrier.is_reach_me_support);
        assert_eq!(carrier.network_name.as_deref(), Some(NOT_SUPPORTED));

        carrier.set_capabilities(false, true, false);
        assert!(carrier.is_reach_me_support);
    }

    #[test]
    fn placeholder_carrier() {
        let carrier = Carrier::placeholder(&key(7));
        assert_eq!(carrier.key(), key(7));
        assert_eq!(carrier.network_name.as_deref(), Some(SELECT_YOUR_CARRIER));
    }

    #[test]
    fn profile_lookups() {
        let mut profile = UserProfile::new("919900000001");
        profile.contact_entry("919900000001").is_primary = true;
        profile.contact_entry("919900000002");
        profile.primary_contact_id = Some("919900000001".into());

        assert_eq!(
            profile.find_contact_id("9900000002", ContactMatch::Substring),
            Some("919900000002".into())
        );
        assert!(profile.find_contact("9900000002", ContactMatch::Exact).is_none());
        assert!(profile.primary_contact().unwrap().is_primary);

        for (id, date) in [(1, 300), (2, 100), (3, 200)] {
            profile.messages.insert(
                id,
                Message {
                    message_id: id,
                    date,
                    flow: Some("r".into()),
                    ..Default::default()
                },
            );
        }
        let order: Vec<i64> = profile.messages_by_date().iter().map(|m| m.message_id).collect();
        assert_eq!(order, vec![1, 3, 2]);
        assert_eq!(profile.unread_count(), 3);
        assert_eq!(profile.max_message_id(), Some(3));
    }

    #[test]
    fn message_timestamp() {
        let message = Message {
            date: 1_520_000_000_000,
            ..Default::default()
        };
        assert_eq!(message.sent_at().unwrap().timestamp(), 1_520_000_000);
    }
}
