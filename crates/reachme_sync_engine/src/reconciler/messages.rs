//! Message merge and the fetch watermark.

use crate::error::SyncResult;
use reachme_protocol::{FetchMessagesResponse, MessageRecord};
use reachme_store::{Message, Transaction};

/// Outcome of merging one `fetch_msgs` page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageMerge {
    /// Messages added to the profile.
    pub inserted: usize,
    /// Messages skipped because their id was already stored.
    pub skipped: usize,
    /// Watermark after the merge.
    pub watermark: i64,
}

/// Adds every unseen message in `response` and advances the watermark.
///
/// Stored messages are never overwritten. The watermark becomes the
/// maximum of its previous value, `last_fetched_msg_id` and the highest id
/// in the page, and is written in the same transaction as the messages.
pub fn merge_messages(
    txn: &mut Transaction,
    response: &FetchMessagesResponse,
) -> SyncResult<MessageMerge> {
    let mut outcome = MessageMerge::default();

    let profile = txn.profile_mut()?;
    for record in &response.messages {
        if profile.has_message(record.message_id) {
            outcome.skipped += 1;
            continue;
        }
        profile
            .messages
            .insert(record.message_id, message_from_record(record));
        outcome.inserted += 1;
    }

    outcome.watermark = match response.high_watermark() {
        Some(candidate) => txn.advance_watermark(candidate),
        None => txn.watermark(),
    };

    tracing::debug!(
        inserted = outcome.inserted,
        skipped = outcome.skipped,
        watermark = outcome.watermark,
        "merged message page"
    );
    Ok(outcome)
}

fn message_from_record(record: &MessageRecord) -> Message {
    let mut message = Message {
        message_id: record.message_id,
        date: record.date,
        content: record.content.clone(),
        content_type: record.content_type.clone(),
        flow: record.flow.clone(),
        from_phone_number: record.from_phone_number.clone(),
        guid: record.guid.clone(),
        misscall_reason: record.misscall_reason.clone(),
        sender_name: record.sender_name.clone(),
        source_app_type: record.source_app_type.clone(),
        subtype: record.subtype.clone(),
        message_type: record.message_type.clone(),
        media_format: record.media_format.clone(),
        from_iv_user_id: record.from_iv_user_id,
        linked_message_id: record.linked_message_id,
        read_count: record.read_count,
        download_count: record.download_count,
        is_base64: record.is_base64,
        ..Default::default()
    };

    // The sender's entry carries its contact type; any other entry is the
    // number the message was delivered to.
    for contact in &record.contacts {
        if contact.contact_id.is_some() && contact.contact_id == record.from_phone_number {
            message.from_user_type = contact.contact_type.clone();
        } else {
            message.receive_phone_number = contact.contact_id.clone();
        }
    }
    message
}
