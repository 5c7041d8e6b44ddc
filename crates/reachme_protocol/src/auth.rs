//! Authentication responses: `join_user`, `sign_in`, `verify_user`, `verify_pwd`.

use crate::envelope::ResponseBody;
use crate::error::ProtocolResult;

/// Next step the server asks for after `join_user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinAction {
    /// The account has a password; sign in with it.
    PasswordSet,
    /// A one-time PIN was sent; verify it.
    OtpSent,
    /// The account is active on another device which must set a password first.
    SetPrimaryPassword,
    /// An action this client does not know.
    Unknown(String),
}

impl JoinAction {
    /// Maps the wire value of `action`.
    pub fn from_wire(action: &str) -> Self {
        match action {
            "pwd_set" => Self::PasswordSet,
            "otp_sent" => Self::OtpSent,
            "set_primary_pwd" => Self::SetPrimaryPassword,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Decoded `join_user` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinUserResponse {
    /// Whether the backend created a new account.
    pub is_new_user: bool,
    /// Requested next step.
    pub action: JoinAction,
    /// Registration key used by `verify_user`.
    pub reg_secure_key: Option<String>,
    /// Push application id.
    pub pns_app_id: Option<String>,
    /// Documentation URL.
    pub docs_url: Option<String>,
}

impl JoinUserResponse {
    /// Decodes a validated response body.
    pub fn decode(body: &ResponseBody) -> ProtocolResult<Self> {
        let fields = body.fields();
        Ok(Self {
            is_new_user: fields.required_bool("is_rm_new_user")?,
            action: JoinAction::from_wire(&fields.required_str("action")?),
            reg_secure_key: fields.optional_str("reg_secure_key"),
            pns_app_id: fields.optional_str("pns_app_id"),
            docs_url: fields.optional_str("docs_url"),
        })
    }
}

/// Fields shared by every response that completes a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    /// Session key sent with every later request.
    pub user_secure_key: Option<String>,
    /// Backend user id.
    pub iv_user_id: i64,
    /// Facebook connect URL.
    pub fb_connect_url: Option<String>,
    /// Whether Facebook is connected.
    pub fb_connected: bool,
    /// Twitter connect URL.
    pub tw_connect_url: Option<String>,
    /// Whether Twitter is connected.
    pub tw_connected: bool,
    /// Display name, sent by `sign_in`.
    pub screen_name: Option<String>,
    /// Push application id.
    pub pns_app_id: Option<String>,
    /// Documentation URL.
    pub docs_url: Option<String>,
}

impl LoginResponse {
    /// Decodes a validated response body.
    pub fn decode(body: &ResponseBody) -> ProtocolResult<Self> {
        let fields = body.fields();
        Ok(Self {
            user_secure_key: fields.optional_str("user_secure_key"),
            iv_user_id: fields.required_i64("iv_user_id")?,
            fb_connect_url: fields.optional_str("fb_connect_url"),
            fb_connected: fields.required_bool("fb_connected")?,
            tw_connect_url: fields.optional_str("tw_connect_url"),
            tw_connected: fields.required_bool("tw_connected")?,
            screen_name: fields.optional_str("screen_name"),
            pns_app_id: fields.optional_str("pns_app_id"),
            docs_url: fields.optional_str("docs_url"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use serde_json::json;

    #[test]
    fn join_actions() {
        let body = ResponseBody::from_value(json!({
            "status": "ok",
            "is_rm_new_user": true,
            "action": "otp_sent",
            "reg_secure_key": "reg-1"
        }))
        .unwrap();
        let join = JoinUserResponse::decode(&body).unwrap();
        assert!(join.is_new_user);
        assert_eq!(join.action, JoinAction::OtpSent);
        assert_eq!(join.reg_secure_key.as_deref(), Some("reg-1"));

        assert_eq!(JoinAction::from_wire("pwd_set"), JoinAction::PasswordSet);
        assert_eq!(
            JoinAction::from_wire("brand_new"),
            JoinAction::Unknown("brand_new".into())
        );
    }

    #[test]
    fn login_requires_connection_flags() {
        let body = ResponseBody::from_value(json!({
            "status": "ok",
            "user_secure_key": "usk",
            "iv_user_id": 4242,
            "fb_connected": false
        }))
        .unwrap();
        assert_eq!(
            LoginResponse::decode(&body).unwrap_err(),
            ProtocolError::missing("tw_connected")
        );
    }
}
