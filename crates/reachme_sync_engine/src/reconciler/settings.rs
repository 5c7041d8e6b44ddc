//! Settings and voicemail-info merges.

use super::profile::{apply_phone_details, apply_profile_setting};
use crate::error::{SyncError, SyncResult};
use reachme_protocol::{
    CarrierSelection, CustomSetting, MqttRecord, PhoneDetails, SettingsResponse, SupportContactRecord,
    VoicemailInfoRecord, VoipRecord,
};
use reachme_store::{
    Carrier, ContactMatch, MqttSettings, SupportContact, Transaction, UserProfile,
    VoipSettings, NOT_SUPPORTED, SELECT_YOUR_CARRIER,
};
use std::collections::BTreeMap;

/// Outcome of a settings merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsMerge {
    /// Support contacts now stored.
    pub support_contacts: usize,
    /// Custom settings applied, unknown keys excluded.
    pub custom_settings: usize,
    /// Voicemail records merged.
    pub voicemails: usize,
}

/// Applies a `fetch_settings` response.
///
/// Support contacts are replaced wholesale and the MQTT settings
/// overwritten. A voicemail record for a phone number with no matching
/// contact fails the whole merge.
pub fn merge_settings(
    txn: &mut Transaction,
    response: &SettingsResponse,
    mode: ContactMatch,
) -> SyncResult<SettingsMerge> {
    let profile = txn.profile_mut()?;
    let mut outcome = SettingsMerge::default();

    profile.support_contacts = response
        .support_contacts
        .iter()
        .map(support_contact)
        .collect();
    outcome.support_contacts = profile.support_contacts.len();

    outcome.custom_settings = apply_custom_settings(profile, &response.custom_settings);

    for record in &response.voicemails {
        merge_voicemail(profile, record, mode)?;
        outcome.voicemails += 1;
    }

    profile.mqtt = Some(mqtt_settings(&response.mqtt));
    if let Some(voip) = &response.voip {
        apply_voip(profile.voip.get_or_insert_with(VoipSettings::default), voip);
    }

    tracing::debug!(
        support_contacts = outcome.support_contacts,
        custom_settings = outcome.custom_settings,
        voicemails = outcome.voicemails,
        "merged settings"
    );
    Ok(outcome)
}

/// Applies every known custom setting and returns how many were applied.
pub fn apply_custom_settings(profile: &mut UserProfile, settings: &[CustomSetting]) -> usize {
    let mut applied = 0;
    for setting in settings {
        match setting {
            CustomSetting::Carrier(table) => apply_carrier_selections(profile, table),
            CustomSetting::PhoneDetails(table) => apply_phone_details(profile, table),
            CustomSetting::Unknown(keys) => {
                tracing::debug!(keys = %keys, "skipping unknown custom setting");
                continue;
            }
            other => apply_profile_setting(profile, other),
        }
        applied += 1;
    }
    applied
}

/// Sets activation flags and the selected carrier of every contact listed
/// in `table`.
///
/// A selection matching a candidate of the primary contact selects a copy
/// of that candidate. Otherwise the contact's selected carrier, or a new
/// one, is rewritten as a placeholder awaiting the user's choice.
pub fn apply_carrier_selections(
    profile: &mut UserProfile,
    table: &BTreeMap<String, CarrierSelection>,
) {
    let candidates: Vec<Carrier> = profile
        .primary_contact()
        .map(|c| c.carriers.clone())
        .unwrap_or_default();

    for (contact_id, selection) in table {
        let Some(contact) = profile.contact_mut(contact_id) else {
            continue;
        };

        if let Some(active) = selection.intl_active {
            contact.reach_me_intl_active = active;
        }
        if let Some(active) = selection.home_active {
            contact.reach_me_home_active = active;
        }
        if let Some(active) = selection.voicemail_active {
            contact.reach_me_voicemail_active = active;
        }

        let found = selection.vsms_id.and_then(|vsms_id| {
            candidates.iter().find(|c| {
                c.vsms_node_id == vsms_id
                    && c.network_id == selection.network_id
                    && c.country_code == selection.country_code
            })
        });

        match found {
            Some(carrier) => contact.selected_carrier = Some(carrier.clone()),
            None => {
                let selected = contact.selected_carrier.get_or_insert_with(Carrier::default);
                if let Some(vsms_id) = selection.vsms_id {
                    selected.vsms_node_id = vsms_id;
                }
                selected.country_code = selection.country_code.clone();
                selected.network_id = selection.network_id.clone();
                selected.network_name = Some(SELECT_YOUR_CARRIER.to_string());
            }
        }
    }
}

/// Merges one voicemail-info record into the matching contact.
pub fn merge_voicemail(
    profile: &mut UserProfile,
    record: &VoicemailInfoRecord,
    mode: ContactMatch,
) -> SyncResult<()> {
    let contact_id = profile
        .find_contact_id(&record.phone, mode)
        .ok_or_else(|| SyncError::UnknownContact(record.phone.clone()))?;
    let contact = profile.contact_entry(&contact_id);

    let voicemail = contact.voicemail_entry();
    voicemail.phone_number = Some(record.phone.clone());
    voicemail.carrier_country_code = record.carrier_country_code.clone();
    voicemail.kvsms_key = record.kvsms_key.clone();
    voicemail.network_id = record.network_id.clone();
    voicemail.country_voicemail_support = record.country_voicemail_support;
    if let Some(enabled) = record.enabled {
        voicemail.enabled = enabled;
    }
    voicemail.available_voicemail_count = record.avs_count;
    voicemail.missed_call_count = record.mca_count;
    voicemail.real_voicemail_count = record.real_avs_count;
    voicemail.real_missed_call_count = record.real_mca_count;
    voicemail.new_message_count = record.new_message_count;
    voicemail.old_message_count = record.old_message_count;
    voicemail.last_voicemail_timestamp = record.avs_timestamp;
    voicemail.last_missed_call_timestamp = record.mca_timestamp;
    voicemail.vsms_node_id = record.vsms_node_id;

    if let Some(ussd) = &record.ussd {
        voicemail.acti_uncf = ussd.acti_uncf.clone();
        voicemail.deacti_uncf = ussd.deacti_uncf.clone();
        voicemail.acti_all = ussd.acti_all.clone();
        voicemail.deacti_both = ussd.deacti_both.clone();
        voicemail.acti_cnf = ussd.acti_cnf.clone();
        voicemail.deacti_cnf = ussd.deacti_cnf.clone();
        voicemail.additional_acti_info = ussd.additional_info.clone();
        if let Some(hlr) = ussd.hlr_enabled {
            voicemail.hlr_enabled = hlr;
        }
        if let Some(voip) = ussd.voip_enabled {
            voicemail.voip_enabled = voip;
        }
        if let Some(home) = ussd.home {
            voicemail.rm_home = home;
        }
        if let Some(intl) = ussd.intl {
            voicemail.rm_intl = intl;
        }
        if let Some(vm) = ussd.voicemail {
            voicemail.rm_vm = vm;
        }
    }

    if !record.country_voicemail_support {
        if let Some(selected) = contact.selected_carrier.as_mut() {
            selected.network_name = Some(NOT_SUPPORTED.to_string());
        }
    }
    Ok(())
}

/// Builds the `custom_settings` list sent by `update_settings`.
///
/// Profile-level values are sent only when set. Every contact contributes a
/// carrier entry from its selected carrier and activation flags, and a
/// phone-details entry.
pub fn collect_custom_settings(profile: &UserProfile) -> Vec<CustomSetting> {
    let mut settings = Vec::new();
    if let Some(value) = &profile.storage_location {
        settings.push(CustomSetting::StorageLocation(value.clone()));
    }
    if let Some(value) = &profile.record_mode {
        settings.push(CustomSetting::DefaultRecordMode(value.clone()));
    }
    if let Some(value) = &profile.recording_time {
        settings.push(CustomSetting::RecordingTime(value.clone()));
    }

    let mut carriers = BTreeMap::new();
    let mut phone_details = BTreeMap::new();
    for (contact_id, contact) in &profile.contacts {
        let selected = contact.selected_carrier.as_ref();
        carriers.insert(
            contact_id.clone(),
            CarrierSelection {
                country_code: selected.and_then(|c| c.country_code.clone()),
                network_id: selected.and_then(|c| c.network_id.clone()),
                vsms_id: selected.map(|c| c.vsms_node_id),
                intl_active: Some(contact.reach_me_intl_active),
                home_active: Some(contact.reach_me_home_active),
                voicemail_active: Some(contact.reach_me_voicemail_active),
            },
        );
        phone_details.insert(
            contact_id.clone(),
            PhoneDetails {
                title_name: contact.title_name.clone(),
                image_name: contact.image_name.clone(),
            },
        );
    }
    if !carriers.is_empty() {
        settings.push(CustomSetting::Carrier(carriers));
        settings.push(CustomSetting::PhoneDetails(phone_details));
    }
    settings
}

fn support_contact(record: &SupportContactRecord) -> SupportContact {
    let mut contact = SupportContact {
        user_id: record.iv_user_id.clone(),
        phone: record.phone.clone(),
        profile_pic_url: record.profile_pic_url.clone(),
        thumbnail_pic_url: record.thumbnail_pic_url.clone(),
        show_as_iv_user: record.show_as_iv_user,
        ..Default::default()
    };
    if let Some(channel) = &record.channel {
        contact.support_type = channel.category.clone();
        contact.support_id = channel.category_id.clone();
        contact.send_email = channel.send_email;
        contact.send_iv = channel.send_iv;
        contact.send_sms = channel.send_sms;
    }
    contact
}

fn mqtt_settings(record: &MqttRecord) -> MqttSettings {
    MqttSettings {
        chat_topic: record.chat_topic.clone(),
        chat_user: record.chat_user.clone(),
        chat_password: record.chat_password.clone(),
        chat_hostname: record.chat_hostname.clone(),
        chat_port_ssl: record.chat_port_ssl.clone(),
        mqtt_hostname: record.mqtt_hostname.clone(),
        mqtt_password: record.mqtt_password.clone(),
        mqtt_user: record.mqtt_user.clone(),
        mqtt_port_ssl: record.mqtt_port_ssl.clone(),
        device_id: record.device_id,
    }
}

fn apply_voip(settings: &mut VoipSettings, record: &VoipRecord) {
    settings.login = record.login.clone();
    settings.password = record.password.clone();
    settings.ip_address = record.ip_address.clone();
    if let Some(port) = record.port {
        settings.port = port;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reachme_protocol::{SupportChannel, UssdCodes};
    use reachme_store::{CarrierKey, ProfileStore, StoreError};

    const PRIMARY: &str = "919900000001";
    const SECOND: &str = "919900000002";

    fn key(vsms: i32) -> CarrierKey {
        CarrierKey {
            country_code: Some("91".into()),
            network_id: Some("404-10".into()),
            vsms_node_id: vsms,
        }
    }

    fn selection(vsms: Option<i32>) -> CarrierSelection {
        CarrierSelection {
            country_code: Some("91".into()),
            network_id: Some("404-10".into()),
            vsms_id: vsms,
            intl_active: Some(true),
            home_active: None,
            voicemail_active: Some(false),
        }
    }

    fn mqtt() -> MqttRecord {
        MqttRecord {
            chat_topic: Some("iv/chat".into()),
            chat_user: None,
            chat_password: None,
            chat_hostname: None,
            chat_port_ssl: None,
            mqtt_hostname: Some("mqtt.example".into()),
            mqtt_password: None,
            mqtt_user: None,
            mqtt_port_ssl: None,
            device_id: 31,
        }
    }

    fn voicemail(phone: &str, supported: bool) -> VoicemailInfoRecord {
        VoicemailInfoRecord {
            phone: phone.into(),
            carrier_country_code: Some("91".into()),
            kvsms_key: None,
            network_id: Some("404-10".into()),
            country_voicemail_support: supported,
            enabled: Some(true),
            avs_count: 3,
            mca_count: 5,
            real_avs_count: 3,
            real_mca_count: 5,
            new_message_count: 1,
            old_message_count: 2,
            avs_timestamp: 100,
            mca_timestamp: 200,
            vsms_node_id: 7,
            ussd: Some(UssdCodes {
                home: Some(true),
                ..Default::default()
            }),
        }
    }

    fn response(custom_settings: Vec<CustomSetting>, voicemails: Vec<VoicemailInfoRecord>) -> SettingsResponse {
        SettingsResponse {
            support_contacts: vec![SupportContactRecord {
                iv_user_id: Some("1".into()),
                phone: Some("911234".into()),
                profile_pic_url: None,
                thumbnail_pic_url: None,
                show_as_iv_user: true,
                channel: Some(SupportChannel {
                    category: Some("support".into()),
                    category_id: Some("s1".into()),
                    send_email: true,
                    send_iv: false,
                    send_sms: false,
                }),
            }],
            custom_settings,
            voicemails,
            mqtt: mqtt(),
            voip: Some(VoipRecord {
                login: Some("sip-user".into()),
                password: Some("sip-pass".into()),
                ip_address: Some("10.0.0.1".into()),
                port: Some(5060),
            }),
        }
    }

    fn store() -> ProfileStore {
        let store = ProfileStore::open_in_memory();
        store
            .transaction(|txn| {
                let profile = txn.profile_or_create(PRIMARY);
                profile.contact_entry(PRIMARY).carrier_entry(&key(3)).carrier_name =
                    Some("Airtel".into());
                profile.contact_entry(SECOND);
                profile.primary_contact_id = Some(PRIMARY.into());
                Ok::<_, StoreError>(())
            })
            .unwrap();
        store
    }

    #[test]
    fn known_custom_settings_applied_unknown_ignored() {
        let store = store();
        let mut table = BTreeMap::new();
        table.insert(PRIMARY.to_string(), selection(Some(3)));
        let settings = vec![
            CustomSetting::StorageLocation("icloud".into()),
            CustomSetting::Carrier(table),
            CustomSetting::Unknown("mystery".into()),
        ];

        let outcome = store
            .transaction(|txn| merge_settings(txn, &response(settings, vec![]), ContactMatch::Substring))
            .unwrap();
        assert_eq!(outcome.custom_settings, 2);

        let state = store.snapshot();
        let profile = state.profile.as_ref().unwrap();
        assert_eq!(profile.storage_location.as_deref(), Some("icloud"));
        let primary = profile.contact(PRIMARY).unwrap();
        assert!(primary.reach_me_intl_active);
        assert!(!primary.reach_me_voicemail_active);
        assert_eq!(
            primary.selected_carrier.as_ref().unwrap().carrier_name.as_deref(),
            Some("Airtel")
        );
        assert_eq!(profile.support_contacts.len(), 1);
        assert_eq!(profile.support_contacts[0].support_id.as_deref(), Some("s1"));
        assert_eq!(profile.mqtt.as_ref().unwrap().device_id, 31);
        assert_eq!(profile.voip.as_ref().unwrap().port, 5060);
    }

    #[test]
    fn unmatched_selection_becomes_placeholder() {
        let store = store();
        let mut table = BTreeMap::new();
        table.insert(SECOND.to_string(), selection(Some(99)));
        table.insert("919911111111".to_string(), selection(Some(3)));

        store
            .transaction(|txn| {
                merge_settings(
                    txn,
                    &response(vec![CustomSetting::Carrier(table.clone())], vec![]),
                    ContactMatch::Substring,
                )
            })
            .unwrap();
        store
            .transaction(|txn| {
                merge_settings(
                    txn,
                    &response(vec![CustomSetting::Carrier(table.clone())], vec![]),
                    ContactMatch::Substring,
                )
            })
            .unwrap();

        let state = store.snapshot();
        let profile = state.profile.as_ref().unwrap();
        let selected = profile.contact(SECOND).unwrap().selected_carrier.clone().unwrap();
        assert_eq!(selected.key(), key(99));
        assert_eq!(selected.network_name.as_deref(), Some(SELECT_YOUR_CARRIER));
        assert_eq!(profile.contacts.len(), 2);
    }

    #[test]
    fn selection_without_vsms_id_never_matches() {
        let mut profile = UserProfile::new(PRIMARY);
        profile.contact_entry(PRIMARY).carrier_entry(&key(3));
        profile.primary_contact_id = Some(PRIMARY.into());
        let mut table = BTreeMap::new();
        table.insert(PRIMARY.to_string(), selection(None));

        apply_carrier_selections(&mut profile, &table);
        let selected = profile.contact(PRIMARY).unwrap().selected_carrier.clone().unwrap();
        assert_eq!(selected.network_name.as_deref(), Some(SELECT_YOUR_CARRIER));
        assert_eq!(selected.vsms_node_id, 0);
    }

    #[test]
    fn voicemail_merge() {
        let store = store();
        let mut table = BTreeMap::new();
        table.insert(PRIMARY.to_string(), selection(Some(3)));

        store
            .transaction(|txn| {
                merge_settings(
                    txn,
                    &response(
                        vec![CustomSetting::Carrier(table)],
                        vec![voicemail("9900000001", false)],
                    ),
                    ContactMatch::Substring,
                )
            })
            .unwrap();

        let state = store.snapshot();
        let primary = state.profile.as_ref().unwrap().contact(PRIMARY).unwrap();
        let voicemail = primary.voicemail.as_ref().unwrap();
        assert_eq!(voicemail.missed_call_count, 5);
        assert!(voicemail.enabled);
        assert!(voicemail.rm_home);
        assert_eq!(
            primary.selected_carrier.as_ref().unwrap().network_name.as_deref(),
            Some(NOT_SUPPORTED)
        );
        // The candidate itself is untouched.
        assert_eq!(
            primary.carrier(&key(3)).unwrap().network_name,
            None
        );
    }

    #[test]
    fn collected_settings_mirror_the_graph() {
        let mut profile = UserProfile::new(PRIMARY);
        profile.storage_location = Some("local".into());
        profile.primary_contact_id = Some(PRIMARY.into());
        let contact = profile.contact_entry(PRIMARY);
        contact.reach_me_home_active = true;
        contact.title_name = Some("Mine".into());
        contact.carrier_entry(&key(3)).carrier_name = Some("Airtel".into());
        contact.selected_carrier = contact.carrier(&key(3)).cloned();

        let settings = collect_custom_settings(&profile);
        assert_eq!(settings.len(), 3);
        assert_eq!(settings[0], CustomSetting::StorageLocation("local".into()));
        let CustomSetting::Carrier(table) = &settings[1] else {
            panic!("expected a carrier table, got {:?}", settings[1]);
        };
        assert_eq!(table[PRIMARY].vsms_id, Some(3));
        assert_eq!(table[PRIMARY].home_active, Some(true));
        assert_eq!(table[PRIMARY].intl_active, Some(false));

        let expected = profile.clone();
        apply_custom_settings(&mut profile, &settings);
        assert_eq!(profile, expected);
    }

    #[test]
    fn unknown_voicemail_contact_aborts() {
        let store = store();
        let before = store.snapshot();
        let result = store.transaction(|txn| {
            merge_settings(
                txn,
                &response(vec![], vec![voicemail("441234567890", true)]),
                ContactMatch::Substring,
            )
        });

        assert!(matches!(result, Err(SyncError::UnknownContact(p)) if p == "441234567890"));
        assert_eq!(*before, *store.snapshot());
    }
}
