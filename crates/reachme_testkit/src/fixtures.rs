//! Response fixtures and store helpers.
//!
//! The JSON builders produce bodies in the exact shape the backend sends,
//! including the JSON-in-string fields, so tests exercise the real decoders.

use reachme_store::{FileBackend, ProfileStore, StoreError};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Login phone number and primary contact id used by the fixtures.
pub const PRIMARY_PHONE: &str = "919900000001";

/// Second contact of the fixture profile.
pub const SECONDARY_PHONE: &str = "919900000002";

/// Sender of fixture messages.
pub const SENDER_PHONE: &str = "919800000009";

/// A successful response with no payload.
pub fn ok_json() -> Value {
    json!({"status": "ok"})
}

/// A rejected response.
pub fn error_json(reason: &str) -> Value {
    json!({"status": "error", "error_reason": reason})
}

/// A received text message from [`SENDER_PHONE`] to [`PRIMARY_PHONE`].
pub fn message_json(id: i64) -> Value {
    json!({
        "msg_id": id,
        "msg_dt": 1_520_000_000_000_i64 + id,
        "msg_content": format!("message {}", id),
        "msg_content_type": "t",
        "msg_flow": "r",
        "from_phone_num": SENDER_PHONE,
        "sender_id": "Ravi",
        "type": "iv",
        "from_iv_user_id": 77,
        "linked_msg_id": 0,
        "msg_read_cnt": 0,
        "msg_download_cnt": 0,
        "is_msg_base64": false,
        "contact_ids": [
            {"contact_id": SENDER_PHONE, "type": "tel"},
            {"contact_id": PRIMARY_PHONE, "type": "tel"}
        ]
    })
}

/// A `fetch_msgs` response holding one message per id.
pub fn fetch_messages_json(ids: &[i64], last_fetched: Option<i64>) -> Value {
    let msgs: Vec<Value> = ids.iter().map(|&id| message_json(id)).collect();
    let mut body = json!({"status": "ok", "msgs": msgs});
    if let Some(last) = last_fetched {
        body["last_fetched_msg_id"] = json!(last);
    }
    body
}

/// A login response, as sent by `sign_in`, `verify_user` and `verify_pwd`.
pub fn login_json(iv_user_id: i64) -> Value {
    json!({
        "status": "ok",
        "user_secure_key": format!("usk-{}", iv_user_id),
        "iv_user_id": iv_user_id,
        "fb_connect_url": "https://fb.example/connect",
        "fb_connected": false,
        "tw_connected": false,
        "screen_name": "Asha",
        "pns_app_id": "rm-pns"
    })
}

/// A `join_user` response.
pub fn join_user_json(action: &str, new_user: bool) -> Value {
    json!({
        "status": "ok",
        "is_rm_new_user": new_user,
        "action": action,
        "reg_secure_key": "reg-fixture"
    })
}

/// A profile with [`PRIMARY_PHONE`] as primary and [`SECONDARY_PHONE`].
pub fn profile_json() -> Value {
    let phone_details = json!({SECONDARY_PHONE: {"title_nm": "Work"}}).to_string();
    let custom_settings = json!([{"recording_time": "60"}, {"ph_dtls": phone_details}]);
    json!({
        "status": "ok",
        "screen_name": "Asha K",
        "email": "asha@example.com",
        "tw_post_enabled": false,
        "fb_post_enabled": true,
        "date_of_birth": {"year": 1990, "month": 2, "dayOfMonth": 14},
        "greeting_name": "{\"uri\":\"https://g.example/name.mp3\",\"duration\":3}",
        "custom_settings": custom_settings.to_string(),
        "user_contacts": [
            {"contact_id": PRIMARY_PHONE, "contact_type": "tel", "country_code": "91",
             "is_primary": true, "blogger_id": 11},
            {"contact_id": SECONDARY_PHONE, "contact_type": "tel", "country_code": "91",
             "is_primary": false, "blogger_id": 12}
        ]
    })
}

/// One carrier entry with the three ReachMe flags.
pub fn carrier_json(name: &str, vsms_node_id: i32, intl: bool, home: bool, voicemail: bool) -> Value {
    let ussd = json!({
        "rm_intl": intl,
        "rm_home": home,
        "rm_vm": voicemail,
        "acti_cnf": "**004*",
        "deacti_cnf": "##004#"
    });
    json!({
        "carrier_name": name,
        "network_name": name,
        "vsms_node_id": vsms_node_id,
        "country_code": "91",
        "network_id": "404-10",
        "ussd_string": ussd.to_string(),
        "carrier_info": {"logo": format!("https://logo.example/{}", vsms_node_id)}
    })
}

/// A `list_carriers` response.
pub fn carrier_list_json(carriers: Vec<Value>) -> Value {
    json!({"status": "ok", "country_list": carriers})
}

/// A `voicemails_info` entry for `phone`.
pub fn voicemail_info_json(phone: &str, country_supported: bool) -> Value {
    json!({
        "phone": phone,
        "carrier_country_code": "91",
        "network_id": "404-10",
        "country_voicemail_support": country_supported,
        "enabled": 1,
        "avs_cnt": 2,
        "mca_cnt": 4,
        "real_avs_cnt": 2,
        "real_mca_cnt": 4,
        "new_msg_cnt": 1,
        "old_msg_cnt": 1,
        "avs_timestamp": 1_520_000_000_000_i64,
        "mca_timestamp": 1_520_000_100_000_i64,
        "vsms_node_id": 3
    })
}

/// A `fetch_settings` response with the given custom settings elements.
///
/// The elements are embedded as a JSON string, as the server sends them.
pub fn settings_json(custom_settings: Vec<Value>, voicemails: Vec<Value>) -> Value {
    let support = json!([
        {"iv_user_id": "9001", "phone": "18005550100", "show_as_iv_user": true,
         "support_catg": "help", "support_catg_id": "1",
         "support_send_email": true, "support_send_iv": true, "support_send_sms": false},
        {"iv_user_id": "9002", "show_as_iv_user": false,
         "feedback_catg": "feedback", "feedback_send_email": false,
         "feedback_send_iv": true, "feedback_send_sms": false}
    ]);
    json!({
        "status": "ok",
        "iv_support_contact_ids": support.to_string(),
        "custom_settings": Value::Array(custom_settings).to_string(),
        "voicemails_info": voicemails,
        "chat_topic": "iv/chat/4242",
        "mqtt_hostname": "mqtt.example.net",
        "mqtt_port_ssl": "8883",
        "iv_user_device_id": 31337,
        "voip_info": {"login": "sip-4242", "pwd": "sip-secret", "ip": "10.0.0.1", "port": 5060}
    })
}

/// A `carrier` custom setting selecting `vsms_id` for `contact_id`.
pub fn carrier_setting_json(contact_id: &str, vsms_id: i32) -> Value {
    let table = json!({
        contact_id: {
            "country_cd": "91",
            "network_id": "404-10",
            "vsms_id": vsms_id,
            "rm_intl_acti": true,
            "rm_home_acti": false,
            "vm_acti": true
        }
    });
    json!({"carrier": table.to_string()})
}

/// A profile store with automatic cleanup.
pub struct TestStore {
    /// The store.
    pub store: Arc<ProfileStore>,
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an in-memory store.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(ProfileStore::open_in_memory()),
            _temp_dir: None,
        }
    }

    /// Creates a store backed by a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend =
            FileBackend::open(temp_dir.path(), true).expect("Failed to open file backend");
        let store = ProfileStore::with_backend(backend).expect("Failed to open store");
        Self {
            store: Arc::new(store),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if file-based.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }

    /// Creates the fixture profile with its primary contact.
    pub fn sign_in(&self) {
        self.store
            .transaction(|txn| {
                let profile = txn.profile_or_create(PRIMARY_PHONE);
                profile.country_iso_code = Some("IN".into());
                let contact = profile.contact_entry(PRIMARY_PHONE);
                contact.country_code = Some("91".into());
                contact.is_primary = true;
                profile.primary_contact_id = Some(PRIMARY_PHONE.into());
                Ok::<_, StoreError>(())
            })
            .expect("Failed to create fixture profile");
    }
}

impl std::ops::Deref for TestStore {
    type Target = ProfileStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Returns an in-memory store holding the fixture profile.
pub fn signed_in_store() -> TestStore {
    let store = TestStore::memory();
    store.sign_in();
    store
}

/// Runs a test with a temporary file-backed store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let store = TestStore::file();
    f(&store)
}
