//! `fetch_settings` response decoding.
//!
//! The settings response bundles several unrelated records: the support
//! contact list, custom settings, per-line voicemail counters, MQTT
//! credentials and the optional VoIP account.

use crate::custom_settings::CustomSetting;
use crate::envelope::ResponseBody;
use crate::error::{ProtocolError, ProtocolResult};
use crate::fields::{objects_in, Fields};
use crate::ussd::UssdCodes;

/// Routing flags for a support or feedback channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportChannel {
    /// Category name.
    pub category: Option<String>,
    /// Category id.
    pub category_id: Option<String>,
    /// Reachable by e-mail.
    pub send_email: bool,
    /// Reachable in-app.
    pub send_iv: bool,
    /// Reachable by SMS.
    pub send_sms: bool,
}

impl SupportChannel {
    fn decode(fields: &Fields<'_>, prefix: &str) -> ProtocolResult<Self> {
        Ok(Self {
            category: fields.optional_str(&format!("{}_catg", prefix)),
            category_id: fields.optional_str(&format!("{}_catg_id", prefix)),
            send_email: fields.required_bool(&format!("{}_send_email", prefix))?,
            send_iv: fields.required_bool(&format!("{}_send_iv", prefix))?,
            send_sms: fields.required_bool(&format!("{}_send_sms", prefix))?,
        })
    }
}

/// One entry of `iv_support_contact_ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportContactRecord {
    /// Backend user id of the support account.
    pub iv_user_id: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Picture URL.
    pub profile_pic_url: Option<String>,
    /// Thumbnail URL.
    pub thumbnail_pic_url: Option<String>,
    /// Show the account as an in-app user.
    pub show_as_iv_user: bool,
    /// Channel flags: `support_*` for the first entry, `feedback_*` for the second.
    pub channel: Option<SupportChannel>,
}

impl SupportContactRecord {
    /// Decodes the entry at `index`, which selects the channel key prefix.
    pub fn decode(fields: &Fields<'_>, index: usize) -> ProtocolResult<Self> {
        let channel = match index {
            0 => Some(SupportChannel::decode(fields, "support")?),
            1 => Some(SupportChannel::decode(fields, "feedback")?),
            _ => None,
        };
        Ok(Self {
            iv_user_id: fields.optional_str("iv_user_id"),
            phone: fields.optional_str("phone"),
            profile_pic_url: fields.optional_str("profile_pic_uri"),
            thumbnail_pic_url: fields.optional_str("thumbnail_profile_pic_uri"),
            show_as_iv_user: fields.required_bool("show_as_iv_user")?,
            channel,
        })
    }
}

/// Voicemail counters and forwarding state for one phone line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicemailInfoRecord {
    /// Phone number the record belongs to.
    pub phone: String,
    /// Carrier country code.
    pub carrier_country_code: Option<String>,
    /// KVSMS key.
    pub kvsms_key: Option<String>,
    /// Network id.
    pub network_id: Option<String>,
    /// Whether the line's country supports voicemail.
    pub country_voicemail_support: bool,
    /// Voicemail enabled, sent as `0`/`1`.
    pub enabled: Option<bool>,
    /// Available voicemail count.
    pub avs_count: i32,
    /// Missed call count.
    pub mca_count: i32,
    /// Real voicemail count.
    pub real_avs_count: i32,
    /// Real missed call count.
    pub real_mca_count: i32,
    /// New message count.
    pub new_message_count: i32,
    /// Old message count.
    pub old_message_count: i32,
    /// Timestamp of the last voicemail count.
    pub avs_timestamp: i64,
    /// Timestamp of the last missed call.
    pub mca_timestamp: i64,
    /// VSMS node id.
    pub vsms_node_id: i32,
    /// Forwarding codes and capability flags.
    pub ussd: Option<UssdCodes>,
}

impl VoicemailInfoRecord {
    /// Decodes one element of `voicemails_info`.
    pub fn decode(fields: &Fields<'_>) -> ProtocolResult<Self> {
        Ok(Self {
            phone: fields.required_str("phone")?,
            carrier_country_code: fields.optional_str("carrier_country_code"),
            kvsms_key: fields.optional_str("kvsms_key"),
            network_id: fields.optional_str("network_id"),
            country_voicemail_support: fields.required_bool("country_voicemail_support")?,
            enabled: fields.optional_flag("enabled"),
            avs_count: fields.required_i32("avs_cnt")?,
            mca_count: fields.required_i32("mca_cnt")?,
            real_avs_count: fields.required_i32("real_avs_cnt")?,
            real_mca_count: fields.required_i32("real_mca_cnt")?,
            new_message_count: fields.required_i32("new_msg_cnt")?,
            old_message_count: fields.required_i32("old_msg_cnt")?,
            avs_timestamp: fields.required_i64("avs_timestamp")?,
            mca_timestamp: fields.required_i64("mca_timestamp")?,
            vsms_node_id: fields.required_i32("vsms_node_id")?,
            ussd: UssdCodes::decode_field(fields, "ussd_string")?,
        })
    }
}

/// MQTT and chat broker credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttRecord {
    /// Topic presence updates are published to.
    pub chat_topic: Option<String>,
    /// Chat user.
    pub chat_user: Option<String>,
    /// Chat password.
    pub chat_password: Option<String>,
    /// Chat host.
    pub chat_hostname: Option<String>,
    /// Chat TLS port.
    pub chat_port_ssl: Option<String>,
    /// MQTT host.
    pub mqtt_hostname: Option<String>,
    /// MQTT password.
    pub mqtt_password: Option<String>,
    /// MQTT user.
    pub mqtt_user: Option<String>,
    /// MQTT TLS port.
    pub mqtt_port_ssl: Option<String>,
    /// Device id used to build the MQTT client id.
    pub device_id: i64,
}

impl MqttRecord {
    fn decode(fields: &Fields<'_>) -> ProtocolResult<Self> {
        Ok(Self {
            chat_topic: fields.optional_str("chat_topic"),
            chat_user: fields.optional_str("chat_user"),
            chat_password: fields.optional_str("chat_password"),
            chat_hostname: fields.optional_str("chat_hostname"),
            chat_port_ssl: fields.optional_str("chat_port_ssl"),
            mqtt_hostname: fields.optional_str("mqtt_hostname"),
            mqtt_password: fields.optional_str("mqtt_password"),
            mqtt_user: fields.optional_str("mqtt_user"),
            mqtt_port_ssl: fields.optional_str("mqtt_port_ssl"),
            device_id: fields.required_i64("iv_user_device_id")?,
        })
    }
}

/// VoIP account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoipRecord {
    /// Login.
    pub login: Option<String>,
    /// Password (`pwd`).
    pub password: Option<String>,
    /// Server address (`ip`).
    pub ip_address: Option<String>,
    /// Server port.
    pub port: Option<i32>,
}

impl VoipRecord {
    fn decode(fields: &Fields<'_>) -> Self {
        Self {
            login: fields.optional_str("login"),
            password: fields.optional_str("pwd"),
            ip_address: fields.optional_str("ip"),
            port: fields.optional_i32("port"),
        }
    }
}

/// Decoded `fetch_settings` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsResponse {
    /// Support contacts in server order; replaces the stored list.
    pub support_contacts: Vec<SupportContactRecord>,
    /// Custom settings.
    pub custom_settings: Vec<CustomSetting>,
    /// Per-line voicemail records; empty when not sent.
    pub voicemails: Vec<VoicemailInfoRecord>,
    /// Push broker credentials.
    pub mqtt: MqttRecord,
    /// VoIP account, when sent.
    pub voip: Option<VoipRecord>,
}

impl SettingsResponse {
    /// Decodes a validated response body.
    pub fn decode(body: &ResponseBody) -> ProtocolResult<Self> {
        let fields = body.fields();

        let support_items = fields
            .embedded_array("iv_support_contact_ids")?
            .unwrap_or_default();
        let support_fields = objects_in(&support_items, "iv_support_contact_ids")?;
        let support_contacts = support_fields
            .iter()
            .enumerate()
            .map(|(index, contact)| SupportContactRecord::decode(contact, index))
            .collect::<ProtocolResult<Vec<_>>>()?;

        if !fields.contains("custom_settings") {
            return Err(ProtocolError::missing("custom_settings"));
        }
        let custom_settings = CustomSetting::decode_list(&fields, "custom_settings")?;

        let voicemails = fields
            .optional_objects("voicemails_info")?
            .iter()
            .map(VoicemailInfoRecord::decode)
            .collect::<ProtocolResult<Vec<_>>>()?;

        Ok(Self {
            support_contacts,
            custom_settings,
            voicemails,
            mqtt: MqttRecord::decode(&fields)?,
            voip: fields.optional_object("voip_info").map(|v| VoipRecord::decode(&v)),
        })
    }
}
