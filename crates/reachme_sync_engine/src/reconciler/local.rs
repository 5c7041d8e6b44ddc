//! Local mutations that follow a successful server call.

use crate::error::SyncResult;
use reachme_store::Transaction;

/// Marks the messages in `message_ids` as read. Returns how many were found.
pub fn mark_read(txn: &mut Transaction, message_ids: &[i64]) -> SyncResult<usize> {
    let profile = txn.profile_mut()?;
    let mut marked = 0;
    for id in message_ids {
        if let Some(message) = profile.messages.get_mut(id) {
            message.read_count = 1;
            marked += 1;
        }
    }
    Ok(marked)
}

/// Removes one message. Returns false if it was not stored.
pub fn delete_message(txn: &mut Transaction, message_id: i64) -> SyncResult<bool> {
    Ok(txn.profile_mut()?.messages.remove(&message_id).is_some())
}

/// Stores the display name and email the server accepted. `None` keeps the
/// current value.
pub fn update_profile_details(
    txn: &mut Transaction,
    user_name: Option<&str>,
    email: Option<&str>,
) -> SyncResult<()> {
    let profile = txn.profile_mut()?;
    if let Some(name) = user_name {
        profile.user_name = Some(name.to_string());
    }
    if let Some(email) = email {
        profile.email = Some(email.to_string());
    }
    Ok(())
}

/// Removes the profile with everything it owns and resets the watermark.
pub fn delete_profile(txn: &mut Transaction) -> bool {
    let existed = txn.delete_profile();
    if existed {
        tracing::info!("local profile deleted");
    }
    existed
}

#[cfg(test)]
mod tests {
    use super::*;
    use reachme_store::{Message, ProfileStore, StoreError};

    fn store_with_messages(ids: &[i64]) -> ProfileStore {
        let store = ProfileStore::open_in_memory();
        store
            .transaction(|txn| {
                let profile = txn.profile_or_create("919900000001");
                for &id in ids {
                    profile.messages.insert(
                        id,
                        Message {
                            message_id: id,
                            ..Default::default()
                        },
                    );
                }
                txn.advance_watermark(ids.iter().copied().max().unwrap_or(0));
                Ok::<_, StoreError>(())
            })
            .unwrap();
        store
    }

    #[test]
    fn mark_read_skips_missing_ids() {
        let store = store_with_messages(&[1, 2]);
        let marked = store.transaction(|txn| mark_read(txn, &[2, 9])).unwrap();
        assert_eq!(marked, 1);

        let state = store.snapshot();
        let profile = state.profile.as_ref().unwrap();
        assert!(profile.messages[&2].is_read());
        assert!(!profile.messages[&1].is_read());
    }

    #[test]
    fn delete_message_reports_presence() {
        let store = store_with_messages(&[1]);
        assert!(store.transaction(|txn| delete_message(txn, 1)).unwrap());
        assert!(!store.transaction(|txn| delete_message(txn, 1)).unwrap());
        assert_eq!(store.snapshot().message_count(), 0);
    }

    #[test]
    fn profile_details_keep_unset_fields() {
        let store = store_with_messages(&[]);
        store
            .transaction(|txn| update_profile_details(txn, Some("Asha"), Some("a@rm.test")))
            .unwrap();
        store
            .transaction(|txn| update_profile_details(txn, None, Some("asha@rm.test")))
            .unwrap();

        let state = store.snapshot();
        let profile = state.profile.as_ref().unwrap();
        assert_eq!(profile.user_name.as_deref(), Some("Asha"));
        assert_eq!(profile.email.as_deref(), Some("asha@rm.test"));
    }

    #[test]
    fn delete_profile_resets_watermark() {
        let store = store_with_messages(&[5, 7]);
        assert_eq!(store.watermark(), 7);

        let existed = store
            .transaction(|txn| Ok::<_, StoreError>(delete_profile(txn)))
            .unwrap();
        assert!(existed);
        assert!(store.snapshot().profile.is_none());
        assert_eq!(store.watermark(), 0);
    }
}
