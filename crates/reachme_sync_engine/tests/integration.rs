//! Integration tests for the sync coordinator against scripted responses.

use proptest::prelude::*;
use reachme_protocol::{Command, FetchMessagesResponse, ResponseBody};
use reachme_store::{
    keys, MemorySettings, ProfileStore, SettingsStore, StoreConfig, NOT_SUPPORTED,
    SELECT_YOUR_CARRIER,
};
use reachme_sync_engine::{
    reconciler, FetchMode, MockTransport, SyncConfig, SyncCoordinator, SyncError, SyncState,
};
use reachme_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn coordinator_for(store: Arc<ProfileStore>) -> SyncCoordinator<MockTransport> {
    let config = SyncConfig::new("https://rm.test/iv").with_device_id("dev-1");
    SyncCoordinator::new(
        config,
        MockTransport::new(),
        store,
        Arc::new(MemorySettings::new()),
    )
}

fn signed_in() -> (TestStore, SyncCoordinator<MockTransport>) {
    let store = signed_in_store();
    let coordinator = coordinator_for(Arc::clone(&store.store));
    (store, coordinator)
}

#[tokio::test]
async fn delta_fetch_inserts_and_advances_cursor() {
    let (store, coordinator) = signed_in();
    coordinator
        .transport()
        .respond(Command::FetchMessages, fetch_messages_json(&[101, 102], None));

    let merge = coordinator.fetch_messages(FetchMode::Foreground).await.unwrap();
    assert_eq!(merge.inserted, 2);
    assert_eq!(store.snapshot().message_count(), 2);
    assert_eq!(store.watermark(), 102);
    assert_eq!(
        coordinator.settings().get_i64(keys::FETCH_AFTER_MSGS_ID),
        Some(102)
    );

    let sent = coordinator.transport().requests_for(Command::FetchMessages);
    assert_eq!(sent[0].get("fetch_after_msgs_id"), Some(&json!(0)));
    assert_eq!(sent[0].get("fetch_max_rows"), Some(&json!(1000)));
    assert_eq!(sent[0].get("fetch_opponent_contactids"), Some(&json!(true)));
}

#[tokio::test]
async fn repeated_response_is_idempotent() {
    let (store, coordinator) = signed_in();
    coordinator
        .transport()
        .respond(Command::FetchMessages, fetch_messages_json(&[101, 102], None));

    coordinator.fetch_messages(FetchMode::Foreground).await.unwrap();
    let sequence = store.sequence();
    let merge = coordinator.fetch_messages(FetchMode::Foreground).await.unwrap();

    assert_eq!(merge.inserted, 0);
    assert_eq!(merge.skipped, 2);
    assert_eq!(store.snapshot().message_count(), 2);
    assert_eq!(store.watermark(), 102);
    assert_eq!(store.sequence(), sequence);

    let sent = coordinator.transport().requests_for(Command::FetchMessages);
    assert_eq!(sent[1].get("fetch_after_msgs_id"), Some(&json!(102)));
    assert_eq!(coordinator.stats().messages_merged, 2);
}

#[tokio::test]
async fn rejected_fetch_writes_nothing() {
    let (store, coordinator) = signed_in();
    coordinator
        .transport()
        .respond(Command::FetchMessages, error_json("expired_session"));
    let before = store.snapshot();
    let sequence = store.sequence();

    let result = coordinator.fetch_messages(FetchMode::Foreground).await;

    assert!(matches!(result, Err(SyncError::ServerRejected(ref r)) if r == "expired_session"));
    assert_eq!(*before, *store.snapshot());
    assert_eq!(store.sequence(), sequence);
    assert_eq!(coordinator.settings().get(keys::FETCH_AFTER_MSGS_ID), None);
    assert_eq!(coordinator.state(), SyncState::Error);
}

#[tokio::test]
async fn background_fetch_uses_small_pages() {
    let (_store, coordinator) = signed_in();
    coordinator
        .transport()
        .respond(Command::FetchMessages, fetch_messages_json(&[], Some(40)));

    let merge = coordinator.fetch_messages(FetchMode::Background).await.unwrap();
    assert_eq!(merge.watermark, 40);

    let sent = coordinator.transport().requests_for(Command::FetchMessages);
    assert_eq!(sent[0].get("fetch_max_rows"), Some(&json!(500)));
    assert_eq!(sent[0].get("status"), Some(&json!("bg")));
    assert_eq!(sent[0].get("fetch_opponent_contactids"), None);
}

#[tokio::test]
async fn concurrent_fetches_never_share_a_cursor() {
    let (store, coordinator) = signed_in();
    let transport = coordinator.transport();
    transport.respond(Command::FetchMessages, fetch_messages_json(&[101, 102], None));
    transport.respond(Command::FetchMessages, fetch_messages_json(&[], None));

    let (first, second) = tokio::join!(
        coordinator.fetch_messages(FetchMode::Foreground),
        coordinator.fetch_messages(FetchMode::Background),
    );
    first.unwrap();
    second.unwrap();

    let cursors: Vec<_> = transport
        .requests_for(Command::FetchMessages)
        .iter()
        .map(|r| r.get("fetch_after_msgs_id").cloned())
        .collect();
    assert_eq!(cursors, vec![Some(json!(0)), Some(json!(102))]);
    assert_eq!(store.snapshot().message_count(), 2);
}

#[tokio::test]
async fn mirrored_cursor_is_honoured() {
    let (_store, coordinator) = signed_in();
    coordinator
        .settings()
        .set(keys::FETCH_AFTER_MSGS_ID, "500")
        .unwrap();
    coordinator
        .transport()
        .respond(Command::FetchMessages, fetch_messages_json(&[501], None));

    let merge = coordinator.fetch_messages(FetchMode::Foreground).await.unwrap();
    assert_eq!(merge.watermark, 501);

    let sent = coordinator.transport().requests_for(Command::FetchMessages);
    assert_eq!(sent[0].get("fetch_after_msgs_id"), Some(&json!(500)));
}

#[tokio::test]
async fn empty_page_keeps_mirrored_cursor() {
    let (store, coordinator) = signed_in();
    coordinator
        .settings()
        .set(keys::FETCH_AFTER_MSGS_ID, "500")
        .unwrap();
    coordinator
        .transport()
        .respond(Command::FetchMessages, fetch_messages_json(&[], None));

    let merge = coordinator.fetch_messages(FetchMode::Background).await.unwrap();
    assert_eq!(merge.inserted, 0);
    assert_eq!(merge.watermark, 500);
    assert_eq!(store.watermark(), 500);
    assert_eq!(
        coordinator.settings().get_i64(keys::FETCH_AFTER_MSGS_ID),
        Some(500)
    );

    coordinator.fetch_messages(FetchMode::Background).await.unwrap();
    let sent = coordinator.transport().requests_for(Command::FetchMessages);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].get("fetch_after_msgs_id"), Some(&json!(500)));
    assert_eq!(coordinator.watermark(), 500);
}

#[tokio::test]
async fn sign_in_runs_the_full_chain() {
    let (store, coordinator) = signed_in();
    let transport = coordinator.transport();
    transport.respond(Command::SignIn, login_json(4242));
    transport.respond(Command::GetProfileInfo, profile_json());
    transport.respond(
        Command::ListCarriers,
        carrier_list_json(vec![
            carrier_json("Airtel", 3, true, false, true),
            carrier_json("Jio", 4, false, false, false),
        ]),
    );
    transport.respond(
        Command::FetchSettings,
        settings_json(vec![carrier_setting_json(PRIMARY_PHONE, 3)], vec![]),
    );

    coordinator.sign_in("secret").await.unwrap();

    let commands: Vec<Command> = transport.requests().iter().map(|r| r.command()).collect();
    assert_eq!(
        commands,
        vec![
            Command::SignIn,
            Command::GetProfileInfo,
            Command::ListCarriers,
            Command::FetchSettings
        ]
    );
    let sign_ins = transport.requests_for(Command::SignIn);
    let sign_in = &sign_ins[0];
    assert_eq!(sign_in.get("login_id"), Some(&json!(PRIMARY_PHONE)));
    assert_eq!(sign_in.get("sim_country_iso"), Some(&json!("IN")));

    // Requests after login carry the new session.
    let settings_requests = transport.requests_for(Command::FetchSettings);
    assert_eq!(settings_requests[0].get("user_secure_key"), Some(&json!("usk-4242")));

    let state = store.snapshot();
    let profile = state.profile.as_ref().unwrap();
    assert_eq!(profile.iv_user_id, 4242);
    assert_eq!(profile.user_name.as_deref(), Some("Asha K"));
    assert_eq!(profile.contacts.len(), 2);

    let primary = profile.primary_contact().unwrap();
    assert_eq!(primary.carriers.len(), 2);
    assert_eq!(primary.carriers[1].network_name.as_deref(), Some(NOT_SUPPORTED));
    let selected = primary.selected_carrier.as_ref().unwrap();
    assert_eq!(selected.carrier_name.as_deref(), Some("Airtel"));
    assert!(primary.reach_me_intl_active);
    assert!(primary.reach_me_voicemail_active);

    assert_eq!(profile.support_contacts.len(), 2);
    assert_eq!(profile.mqtt.as_ref().unwrap().device_id, 31337);
    assert_eq!(coordinator.state(), SyncState::Synced);
}

#[tokio::test]
async fn failed_profile_fetch_skips_settings() {
    let (store, coordinator) = signed_in();
    let transport = coordinator.transport();
    transport.respond(Command::SignIn, login_json(4242));
    transport.respond(Command::GetProfileInfo, error_json("db_error"));
    transport.respond(Command::FetchSettings, settings_json(vec![], vec![]));

    let result = coordinator.sign_in("secret").await;

    assert!(matches!(result, Err(SyncError::ServerRejected(_))));
    assert_eq!(transport.request_count(Command::FetchSettings), 0);
    // The login step itself committed.
    assert_eq!(
        coordinator.settings().get(keys::USER_SECURE_KEY).as_deref(),
        Some("usk-4242")
    );
    assert!(store.snapshot().profile.as_ref().unwrap().mqtt.is_none());
    assert_eq!(coordinator.stats().flows_failed, 1);
}

#[tokio::test]
async fn carrier_fetch_failure_does_not_fail_the_profile() {
    let (store, coordinator) = signed_in();
    let transport = coordinator.transport();
    transport.respond(Command::GetProfileInfo, profile_json());
    transport.fail(Command::ListCarriers, "connection reset");

    let merge = coordinator.fetch_profile().await.unwrap();

    assert!(merge.primary_needs_carriers);
    assert_eq!(transport.request_count(Command::ListCarriers), 1);
    let state = store.snapshot();
    assert!(state.profile.as_ref().unwrap().primary_contact().unwrap().carriers.is_empty());
}

#[tokio::test]
async fn custom_settings_apply_known_keys_only() {
    let (store, coordinator) = signed_in();
    let transport = coordinator.transport();
    transport.respond(
        Command::FetchSettings,
        settings_json(
            vec![
                json!({"storage_location": "icloud"}),
                carrier_setting_json(PRIMARY_PHONE, 9),
                json!({"theme": "dark"}),
            ],
            vec![],
        ),
    );

    let merge = coordinator.fetch_settings().await.unwrap();
    assert_eq!(merge.custom_settings, 2);

    let state = store.snapshot();
    let profile = state.profile.as_ref().unwrap();
    assert_eq!(profile.storage_location.as_deref(), Some("icloud"));
    let selected = profile
        .primary_contact()
        .unwrap()
        .selected_carrier
        .clone()
        .unwrap();
    assert_eq!(selected.vsms_node_id, 9);
    assert_eq!(selected.network_name.as_deref(), Some(SELECT_YOUR_CARRIER));
    assert_eq!(profile.voip.as_ref().unwrap().login.as_deref(), Some("sip-4242"));
}

#[tokio::test]
async fn unknown_voicemail_contact_aborts_settings() {
    let (store, coordinator) = signed_in();
    coordinator.transport().respond(
        Command::FetchSettings,
        settings_json(vec![], vec![voicemail_info_json("447700900123", true)]),
    );
    let before = store.snapshot();

    let result = coordinator.fetch_settings().await;

    assert!(matches!(result, Err(SyncError::UnknownContact(_))));
    assert_eq!(*before, *store.snapshot());
}

#[tokio::test]
async fn voicemail_without_country_support_marks_selection() {
    let (store, coordinator) = signed_in();
    coordinator.transport().respond(
        Command::FetchSettings,
        settings_json(
            vec![carrier_setting_json(PRIMARY_PHONE, 3)],
            vec![voicemail_info_json("9900000001", false)],
        ),
    );

    coordinator.fetch_settings().await.unwrap();

    let state = store.snapshot();
    let primary = state.profile.as_ref().unwrap().primary_contact().unwrap();
    assert_eq!(primary.voicemail.as_ref().unwrap().missed_call_count, 4);
    assert_eq!(
        primary.selected_carrier.as_ref().unwrap().network_name.as_deref(),
        Some(NOT_SUPPORTED)
    );
}

#[tokio::test]
async fn carrier_refetch_updates_in_place() {
    let (store, coordinator) = signed_in();
    let transport = coordinator.transport();
    transport.respond(
        Command::ListCarriers,
        carrier_list_json(vec![carrier_json("Airtel", 3, true, true, false)]),
    );
    transport.respond(
        Command::ListCarriers,
        carrier_list_json(vec![carrier_json("Airtel India", 3, true, true, false)]),
    );

    assert_eq!(coordinator.fetch_carriers(PRIMARY_PHONE).await.unwrap(), 1);
    assert_eq!(coordinator.fetch_carriers(PRIMARY_PHONE).await.unwrap(), 1);

    let state = store.snapshot();
    let carriers = &state.profile.as_ref().unwrap().primary_contact().unwrap().carriers;
    assert_eq!(carriers.len(), 1);
    assert_eq!(carriers[0].carrier_name.as_deref(), Some("Airtel India"));
    assert!(carriers[0].is_reach_me_support);
    assert_eq!(
        transport.requests_for(Command::ListCarriers)[0].get("country_code"),
        Some(&json!("91"))
    );
}

#[tokio::test]
async fn read_and_delete_follow_the_server() {
    let (store, coordinator) = signed_in();
    let transport = coordinator.transport();
    transport.respond(Command::FetchMessages, fetch_messages_json(&[7, 8], None));
    transport.respond(Command::ReadMessages, ok_json());
    transport.respond(Command::DeleteMessage, ok_json());
    coordinator.fetch_messages(FetchMode::Foreground).await.unwrap();

    assert_eq!(coordinator.read_messages(&[7, 99]).await.unwrap(), 1);
    let reads = transport.requests_for(Command::ReadMessages);
    let read = &reads[0];
    assert_eq!(read.get("msg_ids"), Some(&json!([7])));
    assert_eq!(read.get("msg_ids_type"), Some(&json!("tel")));

    assert!(coordinator.delete_message(8).await.unwrap());
    let deletes = transport.requests_for(Command::DeleteMessage);
    assert_eq!(deletes[0].get("type"), Some(&json!("iv")));

    let state = store.snapshot();
    let profile = state.profile.as_ref().unwrap();
    assert!(profile.messages[&7].is_read());
    assert!(!profile.has_message(8));
    // Deleting does not move the cursor back.
    assert_eq!(store.watermark(), 8);
}

#[tokio::test]
async fn rejected_delete_keeps_the_message() {
    let (store, coordinator) = signed_in();
    let transport = coordinator.transport();
    transport.respond(Command::FetchMessages, fetch_messages_json(&[7], None));
    transport.respond(Command::DeleteMessage, error_json("not_allowed"));
    coordinator.fetch_messages(FetchMode::Foreground).await.unwrap();

    assert!(coordinator.delete_message(7).await.is_err());
    assert!(store.snapshot().profile.as_ref().unwrap().has_message(7));
}

#[tokio::test]
async fn update_settings_sends_the_local_graph() {
    let (store, coordinator) = signed_in();
    store
        .transaction(|txn| {
            let profile = txn.profile_mut()?;
            profile.recording_time = Some("90".into());
            profile.fb_post_enabled = true;
            profile.contact_entry(PRIMARY_PHONE).reach_me_home_active = true;
            Ok::<_, SyncError>(())
        })
        .unwrap();
    coordinator
        .transport()
        .respond(Command::UpdateSettings, ok_json());

    coordinator.update_settings().await.unwrap();

    let sent = coordinator.transport().requests_for(Command::UpdateSettings);
    assert_eq!(sent[0].get("fb_post_enabled"), Some(&json!(true)));
    let custom = sent[0].get("custom_settings").and_then(|v| v.as_array()).unwrap();
    assert_eq!(custom[0], json!({"recording_time": "90"}));
    let carrier: serde_json::Value =
        serde_json::from_str(custom[1]["carrier"].as_str().unwrap()).unwrap();
    assert_eq!(carrier[PRIMARY_PHONE]["rm_home_acti"], json!(true));
}

#[tokio::test]
async fn join_then_verify_otp() {
    let store = TestStore::memory();
    let coordinator = coordinator_for(Arc::clone(&store.store));
    let transport = coordinator.transport();
    transport.respond(Command::JoinUser, join_user_json("otp_sent", true));
    transport.respond(Command::VerifyUser, login_json(4242));
    transport.respond(Command::GetProfileInfo, profile_json());
    transport.respond(
        Command::ListCarriers,
        carrier_list_json(vec![carrier_json("Airtel", 3, true, false, false)]),
    );
    transport.respond(Command::FetchSettings, settings_json(vec![], vec![]));
    coordinator
        .settings()
        .set(keys::CLOUD_SECURE_KEY, "apns-token")
        .unwrap();

    let sim = reachme_protocol::SimInfo {
        country_iso: "IN".into(),
        mcc_mnc: Some("404-10".into()),
    };
    coordinator.join_user(PRIMARY_PHONE, &sim).await.unwrap();
    coordinator.verify_otp("1234").await.unwrap();

    let verify = transport.requests_for(Command::VerifyUser);
    assert_eq!(verify[0].get("reg_secure_key"), Some(&json!("reg-fixture")));
    assert_eq!(verify[0].get("cloud_secure_key"), Some(&json!("apns-token")));
    let state = store.snapshot();
    let profile = state.profile.as_ref().unwrap();
    assert_eq!(profile.user_id, PRIMARY_PHONE);
    assert_eq!(profile.primary_contact().unwrap().carriers.len(), 1);
}

#[tokio::test]
async fn file_store_keeps_messages_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::at(dir.path().join("profile"));

    {
        let store = Arc::new(ProfileStore::open(&config).unwrap());
        let coordinator = coordinator_for(Arc::clone(&store));
        store
            .transaction(|txn| {
                txn.profile_or_create(PRIMARY_PHONE);
                Ok::<_, SyncError>(())
            })
            .unwrap();
        coordinator
            .transport()
            .respond(Command::FetchMessages, fetch_messages_json(&[3, 4], None));
        coordinator.fetch_messages(FetchMode::Foreground).await.unwrap();
    }

    let reopened = ProfileStore::open(&config).unwrap();
    assert_eq!(reopened.snapshot().message_count(), 2);
    assert_eq!(reopened.watermark(), 4);
}

fn page(value: serde_json::Value) -> FetchMessagesResponse {
    FetchMessagesResponse::decode(&ResponseBody::from_value(value).unwrap()).unwrap()
}

proptest! {
    #[test]
    fn watermark_is_the_running_maximum(pages in fetch_sequence_strategy()) {
        let store = signed_in_store();
        let mut expected = 0i64;
        let mut distinct = std::collections::BTreeSet::new();

        for body in pages {
            let response = page(body);
            let before = store.watermark();
            store.transaction(|txn| reconciler::merge_messages(txn, &response)).unwrap();

            expected = expected.max(response.high_watermark().unwrap_or(0));
            distinct.extend(response.messages.iter().map(|m| m.message_id));

            prop_assert!(store.watermark() >= before);
            prop_assert_eq!(store.watermark(), expected);
        }
        prop_assert_eq!(store.snapshot().message_count(), distinct.len());
    }

    #[test]
    fn replaying_a_page_changes_nothing(ids in prop::collection::vec(message_id_strategy(), 1..20)) {
        let store = signed_in_store();
        let response = page(fetch_messages_json(&ids, None));

        store.transaction(|txn| reconciler::merge_messages(txn, &response)).unwrap();
        let first = store.snapshot();
        let sequence = store.sequence();
        store.transaction(|txn| reconciler::merge_messages(txn, &response)).unwrap();

        let second = store.snapshot();
        prop_assert_eq!(&*first, &*second);
        prop_assert_eq!(store.sequence(), sequence);
    }
}
