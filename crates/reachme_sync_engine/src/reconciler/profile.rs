//! Login, profile and contact merges.

use crate::error::SyncResult;
use reachme_protocol::{ContactRecord, CustomSetting, LoginResponse, PhoneDetails, ProfileInfoResponse};
use reachme_store::{keys, SettingsStore, StoreResult, Transaction, UserProfile, VolumeMode};
use std::collections::BTreeMap;

/// Outcome of a profile merge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileMerge {
    /// Contacts created or updated.
    pub contacts: usize,
    /// Id of the primary contact, when one was listed.
    pub primary_contact_id: Option<String>,
    /// True when the primary contact has no candidate carriers yet.
    pub primary_needs_carriers: bool,
}

/// Applies the profile part of a login response.
///
/// With `user_id` set the profile is created if needed; otherwise one must
/// already exist.
pub fn merge_login(
    txn: &mut Transaction,
    user_id: Option<&str>,
    login: &LoginResponse,
) -> SyncResult<()> {
    let profile = match user_id {
        Some(user_id) => txn.profile_or_create(user_id),
        None => txn.profile_mut()?,
    };

    profile.iv_user_id = login.iv_user_id;
    profile.volume_mode = VolumeMode::Speaker;
    profile.fb_connect_url = login.fb_connect_url.clone();
    profile.fb_connected = login.fb_connected;
    profile.tw_connect_url = login.tw_connect_url.clone();
    profile.tw_connected = login.tw_connected;
    if let Some(name) = &login.screen_name {
        profile.user_name = Some(name.clone());
    }
    Ok(())
}

/// Stores the session keys of a login response.
pub fn store_login_keys(settings: &dyn SettingsStore, login: &LoginResponse) -> StoreResult<()> {
    match &login.user_secure_key {
        Some(key) => settings.set(keys::USER_SECURE_KEY, key)?,
        None => settings.remove(keys::USER_SECURE_KEY)?,
    }
    settings.set_value(keys::IV_USER_ID, &login.iv_user_id)?;
    if let Some(app_id) = &login.pns_app_id {
        settings.set(keys::PNS_APP_ID, app_id)?;
    }
    if let Some(url) = &login.docs_url {
        settings.set(keys::DOCS_URL, url)?;
    }
    Ok(())
}

/// Applies a `get_profile_info` response.
pub fn merge_profile(
    txn: &mut Transaction,
    response: &ProfileInfoResponse,
) -> SyncResult<ProfileMerge> {
    let profile = txn.profile_mut()?;

    profile.thumbnail_pic_url = response.thumbnail_pic_url.clone();
    profile.city = response.city.clone();
    profile.email = response.email.clone();
    profile.gender = response.gender.clone();
    profile.profile_pic_url = response.profile_pic_url.clone();
    profile.user_name = response.screen_name.clone();
    profile.state = response.state.clone();
    profile.tw_post_enabled = response.tw_post_enabled;
    profile.fb_post_enabled = response.fb_post_enabled;
    profile.invite_sms_text = response.invite_sms_text.clone();
    if let Some(birthday) = response.birthday {
        profile.birthday = Some(birthday);
    }

    if let Some(greeting) = &response.greeting_name {
        profile.greeting_name_uri = greeting.uri.clone();
        profile.greeting_name_duration = greeting.duration;
    }
    if let Some(greeting) = &response.greeting_welcome {
        profile.greeting_welcome_uri = greeting.uri.clone();
        profile.greeting_welcome_duration = greeting.duration;
    }
    if let Some(voicemail) = &response.voicemail {
        profile.voicemail_email = voicemail.email.clone();
        profile.time_zone = voicemail.time_zone.clone();
        profile.vsms_enabled = voicemail.vsms_enabled;
        profile.mc_enabled = voicemail.mc_enabled;
    }

    let mut phone_details = BTreeMap::new();
    for setting in &response.custom_settings {
        match setting {
            CustomSetting::PhoneDetails(table) => phone_details.extend(table.clone()),
            CustomSetting::Carrier(_) | CustomSetting::Unknown(_) => {}
            other => apply_profile_setting(profile, other),
        }
    }

    let contacts = merge_contacts(profile, &response.contacts, &phone_details);

    let primary = profile.primary_contact();
    let outcome = ProfileMerge {
        contacts,
        primary_contact_id: primary.map(|c| c.contact_id.clone()),
        primary_needs_carriers: primary.is_some_and(|c| c.carriers.is_empty()),
    };
    tracing::debug!(
        contacts = outcome.contacts,
        primary = ?outcome.primary_contact_id,
        "merged profile"
    );
    Ok(outcome)
}

/// Creates or updates one contact per record, keyed by contact id.
///
/// Phone details are looked up in `phone_details` by contact id. A primary
/// record becomes the profile's primary contact. Returns the number of
/// records applied.
pub fn merge_contacts(
    profile: &mut UserProfile,
    records: &[ContactRecord],
    phone_details: &BTreeMap<String, PhoneDetails>,
) -> usize {
    for record in records {
        let contact = profile.contact_entry(&record.contact_id);
        contact.contact_type = record.contact_type.clone();
        contact.country_code = record.country_code.clone();
        contact.is_primary = record.is_primary;
        contact.blogger_id = record.blogger_id;

        if let Some(details) = phone_details.get(&record.contact_id) {
            contact.title_name = details.title_name.clone();
            contact.image_name = details.image_name.clone();
        }

        if record.is_primary {
            profile.primary_contact_id = Some(record.contact_id.clone());
        }
    }
    records.len()
}

/// Applies a custom setting that lives on the profile itself.
///
/// Carrier selections and phone details are table variants handled with
/// the contacts; they are ignored here along with unknown keys.
pub fn apply_profile_setting(profile: &mut UserProfile, setting: &CustomSetting) {
    match setting {
        CustomSetting::RecordingTime(value) => profile.recording_time = Some(value.clone()),
        CustomSetting::StorageLocation(value) => profile.storage_location = Some(value.clone()),
        CustomSetting::DefaultRecordMode(value) => profile.record_mode = Some(value.clone()),
        CustomSetting::Carrier(_) | CustomSetting::PhoneDetails(_) | CustomSetting::Unknown(_) => {}
    }
}

/// Applies phone details to every contact listed in `table`.
pub fn apply_phone_details(profile: &mut UserProfile, table: &BTreeMap<String, PhoneDetails>) {
    for (contact_id, details) in table {
        if let Some(contact) = profile.contact_mut(contact_id) {
            contact.title_name = details.title_name.clone();
            contact.image_name = details.image_name.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reachme_protocol::Greeting;
    use reachme_store::{MemorySettings, ProfileStore, StoreError};

    fn login() -> LoginResponse {
        LoginResponse {
            user_secure_key: Some("usk-1".into()),
            iv_user_id: 4242,
            fb_connect_url: Some("https://fb".into()),
            fb_connected: false,
            tw_connect_url: None,
            tw_connected: true,
            screen_name: Some("Asha".into()),
            pns_app_id: Some("pns".into()),
            docs_url: None,
        }
    }

    fn contact(id: &str, primary: bool) -> ContactRecord {
        ContactRecord {
            contact_id: id.into(),
            contact_type: Some("tel".into()),
            country_code: Some("91".into()),
            is_primary: primary,
            blogger_id: 9,
        }
    }

    fn profile_response() -> ProfileInfoResponse {
        let mut details = BTreeMap::new();
        details.insert(
            "919900000002".to_string(),
            PhoneDetails {
                title_name: Some("Work".into()),
                image_name: Some("briefcase".into()),
            },
        );
        ProfileInfoResponse {
            screen_name: Some("Asha K".into()),
            email: Some("asha@example.com".into()),
            city: None,
            state: None,
            gender: Some("f".into()),
            profile_pic_url: None,
            thumbnail_pic_url: None,
            invite_sms_text: None,
            tw_post_enabled: true,
            fb_post_enabled: false,
            birthday: chrono::NaiveDate::from_ymd_opt(1990, 3, 14),
            greeting_name: Some(Greeting {
                uri: Some("https://g/name".into()),
                duration: 4,
            }),
            greeting_welcome: None,
            voicemail: None,
            custom_settings: vec![
                CustomSetting::RecordingTime("60".into()),
                CustomSetting::PhoneDetails(details),
                CustomSetting::Unknown("mystery".into()),
            ],
            contacts: vec![contact("919900000001", true), contact("919900000002", false)],
        }
    }

    #[test]
    fn login_creates_profile_and_keys() {
        let store = ProfileStore::open_in_memory();
        let settings = MemorySettings::new();
        let response = login();

        store
            .transaction(|txn| merge_login(txn, Some("919900000001"), &response))
            .unwrap();
        store_login_keys(&settings, &response).unwrap();

        let state = store.snapshot();
        let profile = state.profile.as_ref().unwrap();
        assert_eq!(profile.iv_user_id, 4242);
        assert_eq!(profile.volume_mode, VolumeMode::Speaker);
        assert_eq!(profile.user_name.as_deref(), Some("Asha"));
        assert!(profile.tw_connected);
        assert_eq!(settings.get(keys::USER_SECURE_KEY).as_deref(), Some("usk-1"));
        assert_eq!(settings.get_i64(keys::IV_USER_ID), Some(4242));
        assert_eq!(settings.get(keys::PNS_APP_ID).as_deref(), Some("pns"));
    }

    #[test]
    fn login_without_user_needs_profile() {
        let store = ProfileStore::open_in_memory();
        let result = store.transaction(|txn| merge_login(txn, None, &login()));
        assert!(matches!(result, Err(crate::SyncError::NotSignedIn)));
    }

    #[test]
    fn profile_merge_applies_contacts_and_settings() {
        let store = ProfileStore::open_in_memory();
        store
            .transaction(|txn| {
                txn.profile_or_create("919900000001");
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let outcome = store
            .transaction(|txn| merge_profile(txn, &profile_response()))
            .unwrap();
        assert_eq!(outcome.contacts, 2);
        assert_eq!(outcome.primary_contact_id.as_deref(), Some("919900000001"));
        assert!(outcome.primary_needs_carriers);

        let state = store.snapshot();
        let profile = state.profile.as_ref().unwrap();
        assert_eq!(profile.user_name.as_deref(), Some("Asha K"));
        assert_eq!(profile.recording_time.as_deref(), Some("60"));
        assert_eq!(profile.greeting_name_duration, 4);
        assert_eq!(profile.birthday.unwrap().to_string(), "1990-03-14");
        assert_eq!(
            profile.contact("919900000002").unwrap().title_name.as_deref(),
            Some("Work")
        );
        assert!(profile.primary_contact().unwrap().is_primary);
    }

    #[test]
    fn profile_merge_is_idempotent() {
        let store = ProfileStore::open_in_memory();
        store
            .transaction(|txn| {
                txn.profile_or_create("919900000001");
                Ok::<_, StoreError>(())
            })
            .unwrap();
        store
            .transaction(|txn| merge_profile(txn, &profile_response()))
            .unwrap();
        let sequence = store.sequence();
        let first = store.snapshot();

        store
            .transaction(|txn| merge_profile(txn, &profile_response()))
            .unwrap();
        assert_eq!(*first, *store.snapshot());
        assert_eq!(store.sequence(), sequence);
    }
}
