//! Decode command implementation.

use crate::ResponseKind;
use reachme_protocol::{
    CarrierListResponse, FetchMessagesResponse, JoinUserResponse, LoginResponse,
    ProfileInfoResponse, ProtocolResult, ResponseBody, SettingsResponse,
};
use std::path::Path;

/// Runs the decode command.
pub fn run(kind: ResponseKind, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let body = read_body(file)?;
    println!("{}", summarize(kind, &body)?);
    Ok(())
}

/// Reads and validates a response body.
pub fn read_body(file: &Path) -> Result<ResponseBody, Box<dyn std::error::Error>> {
    let bytes =
        std::fs::read(file).map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
    Ok(ResponseBody::from_slice(&bytes)?)
}

/// Decodes `body` as `kind` and describes what it holds.
pub fn summarize(kind: ResponseKind, body: &ResponseBody) -> ProtocolResult<String> {
    let summary = match kind {
        ResponseKind::Messages => {
            let response = FetchMessagesResponse::decode(body)?;
            format!(
                "{} messages, watermark {}",
                response.messages.len(),
                response
                    .high_watermark()
                    .map_or_else(|| "unchanged".to_string(), |w| w.to_string())
            )
        }
        ResponseKind::Profile => {
            let response = ProfileInfoResponse::decode(body)?;
            format!(
                "{} contacts, {} custom settings",
                response.contacts.len(),
                response.custom_settings.len()
            )
        }
        ResponseKind::Settings => {
            let response = SettingsResponse::decode(body)?;
            format!(
                "{} support contacts, {} custom settings, {} voicemail records",
                response.support_contacts.len(),
                response.custom_settings.len(),
                response.voicemails.len()
            )
        }
        ResponseKind::Carriers => {
            let response = CarrierListResponse::decode(body)?;
            format!("{} carriers", response.carriers.len())
        }
        ResponseKind::Login => {
            let response = LoginResponse::decode(body)?;
            format!("iv user {}", response.iv_user_id)
        }
        ResponseKind::Join => {
            let response = JoinUserResponse::decode(body)?;
            format!(
                "action {:?}, new user: {}",
                response.action, response.is_new_user
            )
        }
    };
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reachme_testkit::prelude::*;

    fn body(value: serde_json::Value) -> ResponseBody {
        ResponseBody::from_value(value).unwrap()
    }

    #[test]
    fn summaries() {
        let messages = body(fetch_messages_json(&[1, 2, 3], Some(9)));
        assert_eq!(
            summarize(ResponseKind::Messages, &messages).unwrap(),
            "3 messages, watermark 9"
        );

        let carriers = body(carrier_list_json(vec![carrier_json("Airtel", 3, true, true, true)]));
        assert_eq!(
            summarize(ResponseKind::Carriers, &carriers).unwrap(),
            "1 carriers"
        );
    }

    #[test]
    fn wrong_kind_is_a_decode_error() {
        let login = body(login_json(4242));
        assert!(summarize(ResponseKind::Messages, &login).is_err());
    }

    #[test]
    fn rejected_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejected.json");
        std::fs::write(&path, error_json("expired_session").to_string()).unwrap();
        assert!(read_body(&path).is_err());
    }
}
