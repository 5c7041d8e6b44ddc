//! `list_carriers` response decoding.

use crate::envelope::ResponseBody;
use crate::error::ProtocolResult;
use crate::fields::Fields;
use crate::ussd::UssdCodes;

/// Branding attached to a carrier through its `carrier_info` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarrierBranding {
    /// `logo_home_url`.
    pub logo_home_url: Option<String>,
    /// `logo_support_url`.
    pub logo_support_url: Option<String>,
    /// `logo_theme_color`.
    pub logo_theme_color: Option<String>,
    /// `logo`.
    pub logo_url: Option<String>,
    /// Image of the last `in_app_promo` entry.
    pub in_app_promo_image_url: Option<String>,
}

impl CarrierBranding {
    fn decode(info: &Fields<'_>) -> Self {
        // Promo entries overwrite each other; the last one wins.
        let in_app_promo_image_url = info
            .optional_objects("in_app_promo")
            .unwrap_or_default()
            .iter()
            .filter_map(|promo| promo.optional_str("image_url"))
            .last();

        Self {
            logo_home_url: info.optional_str("logo_home_url"),
            logo_support_url: info.optional_str("logo_support_url"),
            logo_theme_color: info.optional_str("logo_theme_color"),
            logo_url: info.optional_str("logo"),
            in_app_promo_image_url,
        }
    }
}

/// One carrier option for a country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierRecord {
    /// Carrier display name.
    pub carrier_name: Option<String>,
    /// VSMS node id.
    pub vsms_node_id: i32,
    /// Country code.
    pub country_code: Option<String>,
    /// Network id (MCC-MNC style).
    pub network_id: Option<String>,
    /// Network display name.
    pub network_name: Option<String>,
    /// Decoded `ussd_string`, when present.
    pub ussd: Option<UssdCodes>,
    /// Branding from `carrier_info`.
    pub branding: CarrierBranding,
}

impl CarrierRecord {
    /// Decodes one element of `country_list`.
    pub fn decode(fields: &Fields<'_>) -> ProtocolResult<Self> {
        Ok(Self {
            carrier_name: fields.optional_str("carrier_name"),
            vsms_node_id: fields.required_i32("vsms_node_id")?,
            country_code: fields.optional_str("country_code"),
            network_id: fields.optional_str("network_id"),
            network_name: fields.optional_str("network_name"),
            ussd: UssdCodes::decode_field(fields, "ussd_string")?,
            branding: fields
                .optional_object("carrier_info")
                .map(|info| CarrierBranding::decode(&info))
                .unwrap_or_default(),
        })
    }
}

/// Decoded `list_carriers` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierListResponse {
    /// Carriers in server order.
    pub carriers: Vec<CarrierRecord>,
}

impl CarrierListResponse {
    /// Decodes a validated response body.
    pub fn decode(body: &ResponseBody) -> ProtocolResult<Self> {
        let carriers = body
            .fields()
            .required_objects("country_list")?
            .iter()
            .map(CarrierRecord::decode)
            .collect::<ProtocolResult<Vec<_>>>()?;
        Ok(Self { carriers })
    }
}
