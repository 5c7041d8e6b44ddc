//! The `custom_settings` union.
//!
//! On the wire `custom_settings` is a list of single-key objects, for example
//! `[{"storage_location":"icloud"},{"carrier":"{...}"}]`. Each element is
//! decoded into one [`CustomSetting`] variant by inspecting which key it
//! carries. Keys this client does not understand become
//! [`CustomSetting::Unknown`] and are ignored by the merge.

use crate::error::ProtocolResult;
use crate::fields::{objects_in, Fields};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Wire key for the storage location setting.
pub const STORAGE_LOCATION: &str = "storage_location";
/// Wire key for the default recording mode.
pub const DEFAULT_RECORD_MODE: &str = "default_record_mode";
/// Wire key for the recording time limit.
pub const RECORDING_TIME: &str = "recording_time";
/// Wire key for the per-contact carrier selection table.
pub const CARRIER: &str = "carrier";
/// Wire key for the per-contact phone details table.
pub const PHONE_DETAILS: &str = "ph_dtls";

/// Carrier selection and activation state for one contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarrierSelection {
    /// Country code of the selected carrier (`country_cd`).
    pub country_code: Option<String>,
    /// Network id of the selected carrier.
    pub network_id: Option<String>,
    /// VSMS node id of the selected carrier (`vsms_id`).
    pub vsms_id: Option<i32>,
    /// International service active (`rm_intl_acti`).
    pub intl_active: Option<bool>,
    /// Home service active (`rm_home_acti`).
    pub home_active: Option<bool>,
    /// Voicemail active (`vm_acti`).
    pub voicemail_active: Option<bool>,
}

impl CarrierSelection {
    fn decode(fields: &Fields<'_>) -> Self {
        Self {
            country_code: fields.optional_str("country_cd"),
            network_id: fields.optional_str("network_id"),
            vsms_id: fields.optional_i32("vsms_id"),
            intl_active: fields.optional_bool("rm_intl_acti"),
            home_active: fields.optional_bool("rm_home_acti"),
            voicemail_active: fields.optional_bool("vm_acti"),
        }
    }

    fn to_json(&self) -> Value {
        serde_json::json!({
            "country_cd": self.country_code,
            "network_id": self.network_id,
            "vsms_id": self.vsms_id,
            "rm_intl_acti": self.intl_active,
            "rm_home_acti": self.home_active,
            "vm_acti": self.voicemail_active,
        })
    }
}

/// Display details for one contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhoneDetails {
    /// User-chosen title (`title_nm`).
    pub title_name: Option<String>,
    /// Image name (`img_nm`).
    pub image_name: Option<String>,
}

impl PhoneDetails {
    fn decode(fields: &Fields<'_>) -> Self {
        Self {
            title_name: fields.optional_str("title_nm"),
            image_name: fields.optional_str("img_nm"),
        }
    }

    fn to_json(&self) -> Value {
        serde_json::json!({
            "img_nm": self.image_name,
            "title_nm": self.title_name,
        })
    }
}

/// One element of the `custom_settings` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomSetting {
    /// Where recordings are stored.
    StorageLocation(String),
    /// Default recording mode.
    DefaultRecordMode(String),
    /// Recording time limit.
    RecordingTime(String),
    /// Carrier selections keyed by contact id.
    Carrier(BTreeMap<String, CarrierSelection>),
    /// Phone details keyed by contact id.
    PhoneDetails(BTreeMap<String, PhoneDetails>),
    /// An element this client does not understand, identified by its keys.
    Unknown(String),
}

impl CustomSetting {
    /// Decodes a `custom_settings` field (inline array or JSON string).
    ///
    /// An absent or empty field yields an empty list.
    pub fn decode_list(fields: &Fields<'_>, key: &str) -> ProtocolResult<Vec<Self>> {
        let Some(items) = fields.embedded_array(key)? else {
            return Ok(Vec::new());
        };
        let elements = objects_in(&items, &fields.path_of(key))?;
        elements.iter().map(Self::decode).collect()
    }

    /// Decodes a single element by key inspection.
    ///
    /// A known key whose value has the wrong shape is treated like an unknown
    /// key. Embedded JSON that fails to parse is a decode error.
    pub fn decode(element: &Fields<'_>) -> ProtocolResult<Self> {
        if let Some(value) = element.optional_str(RECORDING_TIME) {
            return Ok(Self::RecordingTime(value));
        }
        if let Some(value) = element.optional_str(STORAGE_LOCATION) {
            return Ok(Self::StorageLocation(value));
        }
        if let Some(value) = element.optional_str(DEFAULT_RECORD_MODE) {
            return Ok(Self::DefaultRecordMode(value));
        }
        if let Some(table) = element.embedded_object(CARRIER)? {
            let path = element.path_of(CARRIER);
            return Ok(Self::Carrier(decode_table(&table, &path, CarrierSelection::decode)));
        }
        if let Some(table) = element.embedded_object(PHONE_DETAILS)? {
            let path = element.path_of(PHONE_DETAILS);
            return Ok(Self::PhoneDetails(decode_table(&table, &path, PhoneDetails::decode)));
        }

        let keys = element.as_map().keys().cloned().collect::<Vec<_>>().join(",");
        tracing::debug!(keys = %keys, "ignoring unrecognised custom setting");
        Ok(Self::Unknown(keys))
    }

    /// Encodes the element back into its single-key wire form.
    ///
    /// Table variants are re-encoded as JSON strings, as the server expects.
    pub fn to_json(&self) -> Value {
        let (key, value) = match self {
            Self::StorageLocation(v) => (STORAGE_LOCATION, Value::String(v.clone())),
            Self::DefaultRecordMode(v) => (DEFAULT_RECORD_MODE, Value::String(v.clone())),
            Self::RecordingTime(v) => (RECORDING_TIME, Value::String(v.clone())),
            Self::Carrier(table) => (CARRIER, encode_table(table, CarrierSelection::to_json)),
            Self::PhoneDetails(table) => {
                (PHONE_DETAILS, encode_table(table, PhoneDetails::to_json))
            }
            Self::Unknown(_) => return Value::Object(Map::new()),
        };
        let mut map = Map::new();
        map.insert(key.to_string(), value);
        Value::Object(map)
    }
}

fn decode_table<T>(
    table: &Map<String, Value>,
    path: &str,
    decode: impl Fn(&Fields<'_>) -> T,
) -> BTreeMap<String, T> {
    table
        .iter()
        .filter_map(|(contact_id, entry)| match entry {
            Value::Object(map) => {
                let fields = Fields::nested(map, format!("{}.{}", path, contact_id));
                Some((contact_id.clone(), decode(&fields)))
            }
            _ => None,
        })
        .collect()
}

fn encode_table<T>(table: &BTreeMap<String, T>, encode: impl Fn(&T) -> Value) -> Value {
    let map: Map<String, Value> = table
        .iter()
        .map(|(contact_id, entry)| (contact_id.clone(), encode(entry)))
        .collect();
    Value::String(Value::Object(map).to_string())
}
