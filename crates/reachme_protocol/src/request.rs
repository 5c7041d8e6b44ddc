//! Outgoing request construction.
//!
//! Every request is a flat JSON object with a `cmd` field naming the server
//! command. Authentication and device fields are appended from a
//! [`RequestContext`] without overwriting parameters set explicitly.

use crate::custom_settings::CustomSetting;
use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Server commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Register or look up a phone number.
    JoinUser,
    /// Verify a one-time PIN.
    VerifyUser,
    /// Password sign-in.
    SignIn,
    /// Fetch profile and phone lines.
    GetProfileInfo,
    /// Fetch carriers for a country.
    ListCarriers,
    /// Fetch support contacts, custom settings, voicemail info and credentials.
    FetchSettings,
    /// Incremental message fetch.
    FetchMessages,
    /// Delete one message.
    DeleteMessage,
    /// Mark messages read.
    ReadMessages,
    /// Upload custom settings.
    UpdateSettings,
    /// End the session.
    SignOut,
    /// Register push tokens.
    SetDeviceInfo,
    /// Request a new password by SMS.
    GeneratePassword,
    /// Sign in with a generated password.
    VerifyPassword,
    /// Request a verification call.
    GenerateVerificationCode,
    /// Change voicemail settings.
    VoicemailSetting,
    /// Fetch the usage summary of a line.
    UsageSummary,
    /// Fetch the user's phone lines.
    FetchUserContacts,
    /// Change the display name or email.
    UpdateProfileInfo,
    /// Add, remove or verify a secondary phone line.
    ManageUserContact,
}

impl Command {
    /// Every command, in declaration order.
    pub const ALL: [Command; 20] = [
        Command::JoinUser,
        Command::VerifyUser,
        Command::SignIn,
        Command::GetProfileInfo,
        Command::ListCarriers,
        Command::FetchSettings,
        Command::FetchMessages,
        Command::DeleteMessage,
        Command::ReadMessages,
        Command::UpdateSettings,
        Command::SignOut,
        Command::SetDeviceInfo,
        Command::GeneratePassword,
        Command::VerifyPassword,
        Command::GenerateVerificationCode,
        Command::VoicemailSetting,
        Command::UsageSummary,
        Command::FetchUserContacts,
        Command::UpdateProfileInfo,
        Command::ManageUserContact,
    ];

    /// Returns the wire name sent in `cmd`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::JoinUser => "join_user",
            Command::VerifyUser => "verify_user",
            Command::SignIn => "sign_in",
            Command::GetProfileInfo => "get_profile_info",
            Command::ListCarriers => "list_carriers",
            Command::FetchSettings => "fetch_settings",
            Command::FetchMessages => "fetch_msgs",
            Command::DeleteMessage => "delete_msg",
            Command::ReadMessages => "read_msgs",
            Command::UpdateSettings => "update_settings",
            Command::SignOut => "sign_out",
            Command::SetDeviceInfo => "set_device_info",
            Command::GeneratePassword => "generate_pwd",
            Command::VerifyPassword => "verify_pwd",
            Command::GenerateVerificationCode => "generate_verification_code",
            Command::VoicemailSetting => "voicemail_setting",
            Command::UsageSummary => "usage_summary",
            Command::FetchUserContacts => "fetch_user_contacts",
            Command::UpdateProfileInfo => "update_profile_info",
            Command::ManageUserContact => "manage_user_contact",
        }
    }

    /// Looks a command up by wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication and client identification appended to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestContext {
    /// Stable device identifier.
    pub device_id: String,
    /// Session key, once signed in.
    pub user_secure_key: Option<String>,
    /// Backend user id, once signed in.
    pub iv_user_id: Option<i64>,
    /// Application identifier.
    pub app_id: String,
    /// Client application version.
    pub client_app_ver: String,
    /// Client operating system.
    pub client_os: String,
}

impl RequestContext {
    /// Creates a context for an anonymous device.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Default::default()
        }
    }

    /// Sets the application identifier.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Sets the client version and operating system.
    pub fn with_client(mut self, version: impl Into<String>, os: impl Into<String>) -> Self {
        self.client_app_ver = version.into();
        self.client_os = os.into();
        self
    }

    /// Sets the session credentials.
    pub fn with_session(mut self, user_secure_key: impl Into<String>, iv_user_id: i64) -> Self {
        self.user_secure_key = Some(user_secure_key.into());
        self.iv_user_id = Some(iv_user_id);
        self
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        let mut fields = vec![("device_id", Value::from(self.device_id.clone()))];
        if let Some(key) = &self.user_secure_key {
            fields.push(("user_secure_key", Value::from(key.clone())));
        }
        if let Some(id) = self.iv_user_id {
            fields.push(("iv_user_id", Value::from(id)));
        }
        if !self.app_id.is_empty() {
            fields.push(("app_id", Value::from(self.app_id.clone())));
        }
        if !self.client_app_ver.is_empty() {
            fields.push(("client_app_ver", Value::from(self.client_app_ver.clone())));
        }
        if !self.client_os.is_empty() {
            fields.push(("client_os", Value::from(self.client_os.clone())));
        }
        fields
    }
}

/// SIM identification sent by registration and sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInfo {
    /// ISO country of the SIM.
    pub country_iso: String,
    /// Operator MCC-MNC; sent as `"na"` when unknown.
    pub mcc_mnc: Option<String>,
}

impl SimInfo {
    fn mcc_mnc_or_na(&self) -> String {
        self.mcc_mnc.clone().unwrap_or_else(|| "na".to_string())
    }
}

/// A request ready to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    command: Command,
    params: Map<String, Value>,
}

impl ApiRequest {
    /// Creates a request with no parameters.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            params: Map::new(),
        }
    }

    /// Sets a parameter.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Sets every parameter from `params`.
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params.extend(params);
        self
    }

    /// Appends the context fields that are not already set.
    pub fn with_context(mut self, context: &RequestContext) -> Self {
        for (key, value) in context.fields() {
            self.params.entry(key).or_insert(value);
        }
        self
    }

    /// Returns the command.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Returns a parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Returns the full JSON body, including `cmd`.
    pub fn to_value(&self) -> Value {
        let mut body = self.params.clone();
        body.insert("cmd".to_string(), Value::from(self.command.as_str()));
        Value::Object(body)
    }

    /// Encodes the body as JSON bytes.
    pub fn to_body(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(&self.to_value()).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// `join_user` for a phone number.
    pub fn join_user(phone_num: &str, device_id: &str, sim: &SimInfo) -> Self {
        Self::new(Command::JoinUser)
            .param("phone_num", phone_num)
            .param("phone_num_edited", true)
            .param("opr_info_edited", true)
            .param("device_id", device_id)
            .param("sim_country_iso", sim.country_iso.as_str())
            .param("sim_opr_mcc_mnc", sim.mcc_mnc_or_na())
            .param("sim_serial_num", "")
    }

    /// `verify_user` with the PIN received by SMS.
    pub fn verify_user(reg_secure_key: &str, pin: &str, cloud_secure_key: Option<&str>) -> Self {
        let request = Self::new(Command::VerifyUser)
            .param("reg_secure_key", reg_secure_key)
            .param("pin", pin);
        match cloud_secure_key {
            Some(key) => request.param("cloud_secure_key", key),
            None => request,
        }
    }

    /// `sign_in` with a password.
    pub fn sign_in(login_id: &str, password: &str, device_id: &str, sim: &SimInfo) -> Self {
        Self::new(Command::SignIn)
            .param("login_id", login_id)
            .param("pwd", password)
            .param("device_id", device_id)
            .param("sim_country_iso", sim.country_iso.as_str())
            .param("sim_opr_mcc_mnc", sim.mcc_mnc_or_na())
    }

    /// `verify_pwd` with a generated password.
    pub fn verify_password(login_id: &str, password: &str, device_id: &str) -> Self {
        Self::new(Command::VerifyPassword)
            .param("pwd", password)
            .param("login_id", login_id)
            .param("device_id", device_id)
    }

    /// `generate_pwd`.
    pub fn generate_password(login_id: &str) -> Self {
        Self::new(Command::GeneratePassword).param("login_id", login_id)
    }

    /// `generate_verification_code`, delivered by voice call.
    pub fn generate_verification_code(reg_secure_key: Option<&str>, sim: &SimInfo) -> Self {
        Self::new(Command::GenerateVerificationCode)
            .param("sim_opr_mcc_mnc", sim.mcc_mnc_or_na())
            .param("reg_secure_key", reg_secure_key.map(str::to_owned))
            .param("send_pin_by", "obd")
    }

    /// `list_carriers` for a country.
    pub fn list_carriers(country_code: &str) -> Self {
        Self::new(Command::ListCarriers)
            .param("country_code", country_code)
            .param("fetch_voicemails_info", true)
    }

    /// `fetch_settings`.
    pub fn fetch_settings() -> Self {
        Self::new(Command::FetchSettings).param("fetch_voicemails_info", true)
    }

    /// `fetch_msgs` after the given watermark.
    ///
    /// Foreground fetches also ask for the opponent contact ids; background
    /// fetches are tagged with `status: "bg"`.
    pub fn fetch_messages(after_msg_id: i64, max_rows: u32, background: bool) -> Self {
        let request = Self::new(Command::FetchMessages)
            .param("fetch_after_msgs_id", after_msg_id)
            .param("fetch_max_rows", max_rows);
        if background {
            request.param("status", "bg")
        } else {
            request.param("fetch_opponent_contactids", true)
        }
    }

    /// `delete_msg`.
    pub fn delete_message(msg_id: i64, message_type: &str) -> Self {
        Self::new(Command::DeleteMessage)
            .param("msg_id", msg_id)
            .param("type", message_type)
    }

    /// `read_msgs`.
    pub fn read_messages(msg_ids: &[i64], ids_type: &str) -> Self {
        Self::new(Command::ReadMessages)
            .param("msg_ids", msg_ids.to_vec())
            .param("msg_ids_type", ids_type)
    }

    /// `update_settings` with the full custom settings list.
    pub fn update_settings(settings: &[CustomSetting], fb_post: bool, tw_post: bool) -> Self {
        let custom: Vec<Value> = settings
            .iter()
            .filter(|s| !matches!(s, CustomSetting::Unknown(_)))
            .map(CustomSetting::to_json)
            .collect();
        Self::new(Command::UpdateSettings)
            .param("custom_settings", custom)
            .param("fb_post_enabled", fb_post)
            .param("tw_post_enabled", tw_post)
    }

    /// `set_device_info` with whichever push tokens are known.
    pub fn set_device_info(device_token: Option<&str>, voip_token: Option<&str>) -> Self {
        let mut request = Self::new(Command::SetDeviceInfo);
        if let Some(token) = device_token {
            request = request.param("cloud_secure_key", token);
        }
        if let Some(token) = voip_token {
            request = request.param("voip_cloud_secure_key", token);
        }
        request
    }

    /// `usage_summary` for a line.
    pub fn usage_summary(phone: &str) -> Self {
        Self::new(Command::UsageSummary).param("phone", phone)
    }

    /// `update_profile_info` with whichever fields changed.
    pub fn update_profile_info(screen_name: Option<&str>, email: Option<&str>) -> Self {
        let mut request = Self::new(Command::UpdateProfileInfo);
        if let Some(name) = screen_name {
            request = request.param("screen_name", name);
        }
        if let Some(email) = email {
            request = request.param("email", email);
        }
        request
    }

    /// `manage_user_contact` with caller-supplied parameters.
    pub fn manage_user_contact(params: Map<String, Value>) -> Self {
        Self::new(Command::ManageUserContact).params(params)
    }

    /// `voicemail_setting` with caller-supplied parameters.
    pub fn voicemail_setting(params: Map<String, Value>) -> Self {
        Self::new(Command::VoicemailSetting).params(params)
    }

    /// `fetch_user_contacts`.
    pub fn fetch_user_contacts() -> Self {
        Self::new(Command::FetchUserContacts)
    }
}
