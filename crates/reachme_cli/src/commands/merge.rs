//! Merge command implementation.

use crate::commands::decode::read_body;
use crate::config::CliConfig;
use crate::ResponseKind;
use reachme_protocol::{
    CarrierListResponse, FetchMessagesResponse, LoginResponse, ProfileInfoResponse, ResponseBody,
    SettingsResponse,
};
use reachme_store::{ContactMatch, ProfileStore};
use reachme_sync_engine::reconciler;
use std::path::Path;

/// Identity arguments some response kinds need.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeTarget<'a> {
    /// Contact a carrier list belongs to.
    pub contact: Option<&'a str>,
    /// Login phone number for login responses.
    pub user: Option<&'a str>,
}

/// Runs the merge command.
pub fn run(
    kind: ResponseKind,
    file: &Path,
    dir: &Path,
    target: MergeTarget<'_>,
    config: &CliConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let body = read_body(file)?;
    let store = ProfileStore::open(&config.store_at(dir, true))?;
    let summary = apply(&store, kind, &body, target, config.contact_match)?;
    tracing::info!(?kind, sequence = store.sequence(), "merge committed");
    println!("{}", summary);
    Ok(())
}

/// Reconciles `body` into `store` in one transaction.
pub fn apply(
    store: &ProfileStore,
    kind: ResponseKind,
    body: &ResponseBody,
    target: MergeTarget<'_>,
    mode: ContactMatch,
) -> Result<String, Box<dyn std::error::Error>> {
    let summary = match kind {
        ResponseKind::Messages => {
            let response = FetchMessagesResponse::decode(body)?;
            let merge = store.transaction(|txn| reconciler::merge_messages(txn, &response))?;
            format!(
                "inserted {}, skipped {}, watermark {}",
                merge.inserted, merge.skipped, merge.watermark
            )
        }
        ResponseKind::Profile => {
            let response = ProfileInfoResponse::decode(body)?;
            let merge = store.transaction(|txn| reconciler::merge_profile(txn, &response))?;
            format!(
                "{} contacts, primary {}",
                merge.contacts,
                merge.primary_contact_id.as_deref().unwrap_or("none")
            )
        }
        ResponseKind::Settings => {
            let response = SettingsResponse::decode(body)?;
            let merge =
                store.transaction(|txn| reconciler::merge_settings(txn, &response, mode))?;
            format!(
                "{} support contacts, {} custom settings, {} voicemail records",
                merge.support_contacts, merge.custom_settings, merge.voicemails
            )
        }
        ResponseKind::Carriers => {
            let contact = target
                .contact
                .ok_or("--contact is required to merge a carrier list")?;
            let response = CarrierListResponse::decode(body)?;
            let merged = store.transaction(|txn| {
                reconciler::merge_carriers(txn, contact, &response, mode)
            })?;
            format!("{} carriers for {}", merged, contact)
        }
        ResponseKind::Login => {
            let response = LoginResponse::decode(body)?;
            store.transaction(|txn| reconciler::merge_login(txn, target.user, &response))?;
            format!("signed in as iv user {}", response.iv_user_id)
        }
        ResponseKind::Join => {
            return Err("join responses hold no profile data to merge".into());
        }
    };
    Ok(summary)
}
