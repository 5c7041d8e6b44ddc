//! USSD activation codes and capability flags.
//!
//! Carriers and voicemail records both carry a `ussd_string` field: a JSON
//! object encoded in a string that lists call-forwarding activation codes and
//! the ReachMe services the carrier supports.

use crate::error::ProtocolResult;
use crate::fields::Fields;

/// Decoded contents of a `ussd_string` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UssdCodes {
    /// The raw string as received, kept for re-upload.
    pub raw: String,
    /// International service support (`rm_intl`).
    pub intl: Option<bool>,
    /// Home service support (`rm_home`).
    pub home: Option<bool>,
    /// Voicemail forwarding support (`rm_vm`).
    pub voicemail: Option<bool>,
    /// Activate unconditional forwarding.
    pub acti_uncf: Option<String>,
    /// Deactivate unconditional forwarding.
    pub deacti_uncf: Option<String>,
    /// Activate all forwarding.
    pub acti_all: Option<String>,
    /// Deactivate both forwarding modes.
    pub deacti_both: Option<String>,
    /// Activate conditional forwarding.
    pub acti_cnf: Option<String>,
    /// Deactivate conditional forwarding.
    pub deacti_cnf: Option<String>,
    /// Free-form activation instructions.
    pub additional_info: Option<String>,
    /// HLR call forwarding enabled.
    pub hlr_enabled: Option<bool>,
    /// VoIP enabled.
    pub voip_enabled: Option<bool>,
}

impl UssdCodes {
    /// Decodes the `ussd_string` field of `fields`, if present and non-empty.
    pub fn decode_field(fields: &Fields<'_>, key: &str) -> ProtocolResult<Option<Self>> {
        let Some(map) = fields.embedded_object(key)? else {
            return Ok(None);
        };
        let raw = fields
            .optional_str(key)
            .unwrap_or_else(|| serde_json::Value::Object(map.clone()).to_string());
        let ussd = Fields::nested(&map, fields.path_of(key));

        Ok(Some(Self {
            raw,
            intl: ussd.optional_bool("rm_intl"),
            home: ussd.optional_bool("rm_home"),
            voicemail: ussd.optional_bool("rm_vm"),
            acti_uncf: ussd.optional_str("acti_uncf"),
            deacti_uncf: ussd.optional_str("deacti_uncf"),
            acti_all: ussd.optional_str("acti_all"),
            deacti_both: ussd.optional_str("deacti_both"),
            acti_cnf: ussd.optional_str("acti_cnf"),
            deacti_cnf: ussd.optional_str("deacti_cnf"),
            additional_info: ussd.optional_str("add_acti_info"),
            hlr_enabled: ussd.optional_bool("is_hlr_callfwd_enabled"),
            voip_enabled: ussd.optional_bool("voip_enabled"),
        }))
    }

    /// Returns true if any ReachMe capability is advertised.
    pub fn supports_any(&self) -> bool {
        self.intl.unwrap_or(false) || self.home.unwrap_or(false) || self.voicemail.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn decode_capabilities() {
        let value = json!({
            "ussd_string": "{\"rm_intl\":true,\"rm_home\":false,\"acti_cnf\":\"*61#\",\"deacti_cnf\":\"#61#\"}"
        });
        let Value::Object(map) = value else { unreachable!() };
        let fields = Fields::new(&map);

        let ussd = UssdCodes::decode_field(&fields, "ussd_string").unwrap().unwrap();
        assert_eq!(ussd.intl, Some(true));
        assert_eq!(ussd.home, Some(false));
        assert_eq!(ussd.voicemail, None);
        assert_eq!(ussd.acti_cnf.as_deref(), Some("*61#"));
        assert_eq!(ussd.deacti_cnf.as_deref(), Some("#61#"));
        assert!(ussd.supports_any());
        assert!(ussd.raw.contains("rm_intl"));
    }

    #[test]
    fn empty_string_is_absent() {
        let value = json!({"ussd_string": ""});
        let Value::Object(map) = value else { unreachable!() };
        assert_eq!(
            UssdCodes::decode_field(&Fields::new(&map), "ussd_string").unwrap(),
            None
        );
    }
}
