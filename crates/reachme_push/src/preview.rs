//! Notification previews for inbound push payloads.

use serde::Serialize;
use serde_json::Value;

/// Title of every preview.
pub const PREVIEW_TITLE: &str = "ReachMe";

/// What the user sees for an inbound push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPreview {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
}

impl NotificationPreview {
    fn new(body: String) -> Self {
        Self {
            title: PREVIEW_TITLE.to_string(),
            body,
        }
    }
}

/// Derives a preview from a raw push payload.
///
/// An `aps.alert.body` string wins. Otherwise the first entry of `msgs` is
/// described by content type, provided it was received rather than sent. Returns `None` when the payload
/// isn't JSON or nothing in it can be shown.
pub fn derive_preview(payload: &[u8]) -> Option<NotificationPreview> {
    let value: Value = serde_json::from_slice(payload).ok()?;

    if let Some(body) = value
        .pointer("/aps/alert/body")
        .and_then(Value::as_str)
    {
        return Some(NotificationPreview::new(body.to_string()));
    }

    let message = value
        .get("msgs")?
        .as_array()?
        .first()
        .filter(|m| m.get("msg_flow").and_then(Value::as_str) == Some("r"))?;
    describe(message).map(NotificationPreview::new)
}

fn describe(message: &Value) -> Option<String> {
    let field = |key: &str| message.get(key).and_then(Value::as_str);
    let sender = field("sender_id").or(field("from_phone_num"))?;

    match field("msg_content_type")? {
        "t" if field("type") == Some("mc") => {
            if field("msg_subtype") == Some("ring") {
                Some(format!("{}: Ring Missed Call", sender))
            } else {
                Some(format!("{}: Missed Call", sender))
            }
        }
        "t" => Some(format!("{}: {}", sender, field("msg_content")?)),
        "a" => Some(format!("{}: Voice Message", sender)),
        "i" => Some(format!("{}: Image", sender)),
        _ => None,
    }
}
