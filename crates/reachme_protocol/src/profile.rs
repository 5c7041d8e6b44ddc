//! `get_profile_info` response decoding.

use crate::custom_settings::CustomSetting;
use crate::envelope::ResponseBody;
use crate::error::ProtocolResult;
use crate::fields::Fields;
use chrono::NaiveDate;

/// A recorded greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Location of the audio file.
    pub uri: Option<String>,
    /// Duration in seconds.
    pub duration: i32,
}

impl Greeting {
    fn decode_field(fields: &Fields<'_>, key: &str) -> ProtocolResult<Option<Self>> {
        let Some(map) = fields.embedded_object(key)? else {
            return Ok(None);
        };
        let greeting = Fields::nested(&map, fields.path_of(key));
        Ok(Some(Self {
            uri: greeting.optional_str("uri"),
            duration: greeting.required_i32("duration")?,
        }))
    }
}

/// Voicemail e-mail notification preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicemailNotifications {
    /// Destination address.
    pub email: Option<String>,
    /// Time zone used for timestamps in the mail.
    pub time_zone: Option<String>,
    /// Send voicemails by mail.
    pub vsms_enabled: bool,
    /// Send missed calls by mail.
    pub mc_enabled: bool,
}

impl VoicemailNotifications {
    fn decode_field(fields: &Fields<'_>, key: &str) -> ProtocolResult<Option<Self>> {
        let Some(map) = fields.embedded_object(key)? else {
            return Ok(None);
        };
        let voicemail = Fields::nested(&map, fields.path_of(key));
        Ok(Some(Self {
            email: voicemail.optional_str("email"),
            time_zone: voicemail.optional_str("time_zone"),
            vsms_enabled: voicemail.required_bool("vsms_enabled")?,
            mc_enabled: voicemail.required_bool("mc_enabled")?,
        }))
    }
}

/// One entry of `user_contacts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    /// Phone number or identifier; unique within a profile.
    pub contact_id: String,
    /// Contact type.
    pub contact_type: Option<String>,
    /// Country code.
    pub country_code: Option<String>,
    /// Whether this is the primary line.
    pub is_primary: bool,
    /// Blogger id.
    pub blogger_id: i64,
}

impl ContactRecord {
    /// Decodes one element of `user_contacts`.
    pub fn decode(fields: &Fields<'_>) -> ProtocolResult<Self> {
        Ok(Self {
            contact_id: fields.required_str("contact_id")?,
            contact_type: fields.optional_str("contact_type"),
            country_code: fields.optional_str("country_code"),
            is_primary: fields.required_bool("is_primary")?,
            blogger_id: fields.required_i64("blogger_id")?,
        })
    }
}

/// Decoded `get_profile_info` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInfoResponse {
    /// Display name (`screen_name`).
    pub screen_name: Option<String>,
    /// E-mail address.
    pub email: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State.
    pub state: Option<String>,
    /// Gender.
    pub gender: Option<String>,
    /// Full-size picture URL (`profile_pic_path`).
    pub profile_pic_url: Option<String>,
    /// Thumbnail URL (`thumbnail_profile_pic_uri`).
    pub thumbnail_pic_url: Option<String>,
    /// Text used when inviting by SMS.
    pub invite_sms_text: Option<String>,
    /// Post to Twitter.
    pub tw_post_enabled: bool,
    /// Post to Facebook.
    pub fb_post_enabled: bool,
    /// Birthday, when the server sent a valid calendar date.
    pub birthday: Option<NaiveDate>,
    /// Name greeting.
    pub greeting_name: Option<Greeting>,
    /// Welcome greeting.
    pub greeting_welcome: Option<Greeting>,
    /// Voicemail notification preferences.
    pub voicemail: Option<VoicemailNotifications>,
    /// Custom settings; empty when absent.
    pub custom_settings: Vec<CustomSetting>,
    /// The user's phone lines.
    pub contacts: Vec<ContactRecord>,
}

impl ProfileInfoResponse {
    /// Decodes a validated response body.
    pub fn decode(body: &ResponseBody) -> ProtocolResult<Self> {
        let fields = body.fields();
        let contacts = fields
            .required_objects("user_contacts")?
            .iter()
            .map(ContactRecord::decode)
            .collect::<ProtocolResult<Vec<_>>>()?;

        Ok(Self {
            screen_name: fields.optional_str("screen_name"),
            email: fields.optional_str("email"),
            city: fields.optional_str("city"),
            state: fields.optional_str("state"),
            gender: fields.optional_str("gender"),
            profile_pic_url: fields.optional_str("profile_pic_path"),
            thumbnail_pic_url: fields.optional_str("thumbnail_profile_pic_uri"),
            invite_sms_text: fields.optional_str("invite_sms_text"),
            tw_post_enabled: fields.required_bool("tw_post_enabled")?,
            fb_post_enabled: fields.required_bool("fb_post_enabled")?,
            birthday: decode_birthday(&fields),
            greeting_name: Greeting::decode_field(&fields, "greeting_name")?,
            greeting_welcome: Greeting::decode_field(&fields, "greeting_welcome")?,
            voicemail: VoicemailNotifications::decode_field(&fields, "voicemail")?,
            custom_settings: CustomSetting::decode_list(&fields, "custom_settings")?,
            contacts,
        })
    }

    /// Returns the primary contact record, if the server marked one.
    pub fn primary_contact(&self) -> Option<&ContactRecord> {
        self.contacts.iter().find(|c| c.is_primary)
    }
}

// The month is zero-based on the wire. Incomplete or impossible dates are dropped.
fn decode_birthday(fields: &Fields<'_>) -> Option<NaiveDate> {
    let dob = fields.optional_object("date_of_birth")?;
    let year = dob.optional_i32("year")?;
    let month = u32::try_from(dob.optional_i64("month")?).ok()?;
    let day = u32::try_from(dob.optional_i64("dayOfMonth")?).ok()?;
    NaiveDate::from_ymd_opt(year, month + 1, day)
}
