//! `fetch_msgs` response decoding.

use crate::envelope::ResponseBody;
use crate::error::ProtocolResult;
use crate::fields::Fields;

/// One contact reference attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContact {
    /// Phone number or identifier of the party.
    pub contact_id: Option<String>,
    /// Party type (`tel`, `iv`, ...).
    pub contact_type: Option<String>,
}

/// A single message as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Server-assigned message id.
    pub message_id: i64,
    /// Message date in milliseconds since the epoch.
    pub date: i64,
    /// Text content, URL or base64 payload depending on the content type.
    pub content: Option<String>,
    /// `t` (text), `a` (audio) or `i` (image).
    pub content_type: Option<String>,
    /// `r` (received) or `s` (sent).
    pub flow: Option<String>,
    /// Sender phone number.
    pub from_phone_number: Option<String>,
    /// Client-generated message guid.
    pub guid: Option<String>,
    /// Reason code for missed calls.
    pub misscall_reason: Option<String>,
    /// Display name of the sender.
    pub sender_name: Option<String>,
    /// Application that produced the message.
    pub source_app_type: Option<String>,
    /// Message subtype (`ring`, ...).
    pub subtype: Option<String>,
    /// Message type (`vsms`, `mc`, ...).
    pub message_type: Option<String>,
    /// Media format of audio/image content.
    pub media_format: Option<String>,
    /// Backend user id of the sender.
    pub from_iv_user_id: i64,
    /// Id of a related message.
    pub linked_message_id: i64,
    /// Number of times the message was read.
    pub read_count: i32,
    /// Number of times the media was downloaded.
    pub download_count: i32,
    /// Whether `content` is base64 encoded.
    pub is_base64: bool,
    /// Parties attached to the message.
    pub contacts: Vec<MessageContact>,
}

impl MessageRecord {
    /// Decodes a single message object.
    pub fn decode(fields: &Fields<'_>) -> ProtocolResult<Self> {
        // Background fetches do not request `fetch_opponent_contactids`, so the
        // list may legitimately be absent.
        let contacts = fields
            .optional_objects("contact_ids")?
            .iter()
            .map(|contact| MessageContact {
                contact_id: contact.optional_str("contact_id"),
                contact_type: contact.optional_str("type"),
            })
            .collect();

        Ok(Self {
            message_id: fields.required_i64("msg_id")?,
            date: fields.required_i64("msg_dt")?,
            content: fields.optional_str("msg_content"),
            content_type: fields.optional_str("msg_content_type"),
            flow: fields.optional_str("msg_flow"),
            from_phone_number: fields.optional_str("from_phone_num"),
            guid: fields.optional_str("guid"),
            misscall_reason: fields.optional_str("misscall_reason"),
            sender_name: fields.optional_str("sender_id"),
            source_app_type: fields.optional_str("source_app_type"),
            subtype: fields.optional_str("msg_subtype"),
            message_type: fields.optional_str("type"),
            media_format: fields.optional_str("media_format"),
            from_iv_user_id: fields.required_i64("from_iv_user_id")?,
            linked_message_id: fields.required_i64("linked_msg_id")?,
            read_count: fields.required_i32("msg_read_cnt")?,
            download_count: fields.required_i32("msg_download_cnt")?,
            is_base64: fields.required_bool("is_msg_base64")?,
            contacts,
        })
    }
}

/// Decoded `fetch_msgs` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMessagesResponse {
    /// Server-reported watermark, when sent.
    pub last_fetched_msg_id: Option<i64>,
    /// Messages in server order.
    pub messages: Vec<MessageRecord>,
}

impl FetchMessagesResponse {
    /// Decodes a validated response body.
    pub fn decode(body: &ResponseBody) -> ProtocolResult<Self> {
        let fields = body.fields();
        let messages = fields
            .required_objects("msgs")?
            .iter()
            .map(MessageRecord::decode)
            .collect::<ProtocolResult<Vec<_>>>()?;

        Ok(Self {
            last_fetched_msg_id: fields.optional_i64("last_fetched_msg_id"),
            messages,
        })
    }

    /// Returns the highest watermark this batch justifies.
    ///
    /// This is the larger of the server-reported `last_fetched_msg_id` and the
    /// largest message id in the batch.
    pub fn high_watermark(&self) -> Option<i64> {
        let batch_max = self.messages.iter().map(|m| m.message_id).max();
        match (self.last_fetched_msg_id, batch_max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}
