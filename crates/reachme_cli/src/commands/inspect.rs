//! Inspect command implementation.

use crate::config::CliConfig;
use reachme_store::{ProfileStore, StoreState};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Login phone number of the stored profile.
    pub user_id: Option<String>,
    /// Backend user id.
    pub iv_user_id: Option<i64>,
    /// Number of contacts.
    pub contact_count: usize,
    /// Number of support contacts.
    pub support_contact_count: usize,
    /// Number of stored messages.
    pub message_count: usize,
    /// Number of unread messages.
    pub unread_count: usize,
    /// Delta-fetch watermark.
    pub watermark: i64,
    /// Whether push settings have been fetched.
    pub push_configured: bool,
    /// Messages, newest first (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageSummary>>,
}

/// One stored message.
#[derive(Debug, Serialize)]
pub struct MessageSummary {
    /// Message id.
    pub id: i64,
    /// Send time (RFC 3339).
    pub date: Option<String>,
    /// Sender phone number.
    pub from: Option<String>,
    /// Content type.
    pub content_type: Option<String>,
    /// Whether it has been read.
    pub read: bool,
}

/// Runs the inspect command.
pub fn run(
    dir: &Path,
    show_messages: bool,
    format: &str,
    config: &CliConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.exists() {
        return Err(format!("No store found at {:?}", dir).into());
    }
    let store = ProfileStore::open(&config.store_at(dir, false))?;
    let result = inspect(&dir.display().to_string(), &store.snapshot(), show_messages);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics from a snapshot.
pub fn inspect(path: &str, state: &StoreState, show_messages: bool) -> InspectResult {
    let profile = state.profile.as_ref();
    InspectResult {
        path: path.to_string(),
        user_id: profile.map(|p| p.user_id.clone()),
        iv_user_id: profile.map(|p| p.iv_user_id),
        contact_count: profile.map_or(0, |p| p.contacts.len()),
        support_contact_count: profile.map_or(0, |p| p.support_contacts.len()),
        message_count: state.message_count(),
        unread_count: profile.map_or(0, |p| p.unread_count()),
        watermark: state.watermark,
        push_configured: profile.map_or(false, |p| p.mqtt.is_some()),
        messages: show_messages.then(|| {
            profile
                .map(|p| {
                    p.messages_by_date()
                        .into_iter()
                        .map(|m| MessageSummary {
                            id: m.message_id,
                            date: m.sent_at().map(|d| d.to_rfc3339()),
                            from: m.from_phone_number.clone(),
                            content_type: m.content_type.clone(),
                            read: m.is_read(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        }),
    }
}

fn print_text_output(result: &InspectResult) {
    println!("ReachMe Store Inspection");
    println!("========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    match &result.user_id {
        Some(user_id) => {
            println!("Profile:");
            println!("  User:            {}", user_id);
            println!("  IV user id:      {}", result.iv_user_id.unwrap_or_default());
            println!("  Contacts:        {}", result.contact_count);
            println!("  Support:         {}", result.support_contact_count);
            println!("  Push configured: {}", result.push_configured);
        }
        None => println!("Profile: none"),
    }
    println!();
    println!("Messages:");
    println!("  Stored:    {}", result.message_count);
    println!("  Unread:    {}", result.unread_count);
    println!("  Watermark: {}", result.watermark);

    if let Some(messages) = &result.messages {
        println!();
        for m in messages {
            println!(
                "  [{}] {} from {} ({}){}",
                m.id,
                m.date.as_deref().unwrap_or("-"),
                m.from.as_deref().unwrap_or("unknown"),
                m.content_type.as_deref().unwrap_or("?"),
                if m.read { "" } else { " unread" }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reachme_protocol::{FetchMessagesResponse, ResponseBody};
    use reachme_sync_engine::{reconciler, SyncError};
    use reachme_testkit::prelude::*;

    #[test]
    fn counts_and_order() {
        let store = signed_in_store();
        let body = ResponseBody::from_value(fetch_messages_json(&[3, 1, 2], None)).unwrap();
        let page = FetchMessagesResponse::decode(&body).unwrap();
        store
            .transaction(|txn| {
                reconciler::merge_messages(txn, &page)?;
                reconciler::mark_read(txn, &[1])?;
                Ok::<_, SyncError>(())
            })
            .unwrap();

        let result = inspect("mem", &store.snapshot(), true);
        assert_eq!(result.user_id.as_deref(), Some(PRIMARY_PHONE));
        assert_eq!(result.message_count, 3);
        assert_eq!(result.unread_count, 2);
        assert_eq!(result.watermark, 3);
        assert!(!result.push_configured);

        let ids: Vec<i64> = result.messages.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn empty_store() {
        let store = TestStore::memory();
        let result = inspect("mem", &store.snapshot(), false);
        assert_eq!(result.user_id, None);
        assert_eq!(result.message_count, 0);
        assert!(result.messages.is_none());
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(run(&missing, false, "text", &CliConfig::default()).is_err());
    }
}
