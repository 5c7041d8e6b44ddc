//! Carrier list merge.

use crate::error::{SyncError, SyncResult};
use reachme_protocol::{CarrierListResponse, CarrierRecord, UssdCodes};
use reachme_store::{Carrier, CarrierKey, ContactMatch, Transaction};

/// Merges a `list_carriers` response into the candidate set of the contact
/// matching `contact`.
///
/// Carriers are matched by `(country_code, network_id, vsms_node_id)` and
/// updated in place; new identities are appended. Returns the number of
/// records applied.
pub fn merge_carriers(
    txn: &mut Transaction,
    contact: &str,
    response: &CarrierListResponse,
    mode: ContactMatch,
) -> SyncResult<usize> {
    let profile = txn.profile_mut()?;
    let contact_id = profile
        .find_contact_id(contact, mode)
        .ok_or_else(|| SyncError::UnknownContact(contact.to_string()))?;
    let target = profile.contact_entry(&contact_id);

    for record in &response.carriers {
        let key = CarrierKey {
            country_code: record.country_code.clone(),
            network_id: record.network_id.clone(),
            vsms_node_id: record.vsms_node_id,
        };
        apply_carrier_record(target.carrier_entry(&key), record);
    }

    tracing::debug!(
        contact = %contact_id,
        carriers = response.carriers.len(),
        "merged carrier list"
    );
    Ok(response.carriers.len())
}

fn apply_carrier_record(carrier: &mut Carrier, record: &CarrierRecord) {
    carrier.carrier_name = record.carrier_name.clone();
    carrier.network_name = record.network_name.clone();
    carrier.ussd_string = record.ussd.as_ref().map(|u| u.raw.clone());

    if let Some(ussd) = &record.ussd {
        apply_ussd(carrier, ussd);
    }

    let branding = &record.branding;
    carrier.logo_home_url = branding.logo_home_url.clone();
    carrier.logo_support_url = branding.logo_support_url.clone();
    carrier.logo_theme_color = branding.logo_theme_color.clone();
    carrier.logo_url = branding.logo_url.clone();
    carrier.in_app_promo_image_url = branding.in_app_promo_image_url.clone();
}

fn apply_ussd(carrier: &mut Carrier, ussd: &UssdCodes) {
    carrier.acti_uncf = ussd.acti_uncf.clone();
    carrier.deacti_uncf = ussd.deacti_uncf.clone();
    carrier.acti_all = ussd.acti_all.clone();
    carrier.deacti_both = ussd.deacti_both.clone();
    carrier.acti_cnf = ussd.acti_cnf.clone();
    carrier.deacti_cnf = ussd.deacti_cnf.clone();
    carrier.additional_acti_info = ussd.additional_info.clone();
    if let Some(hlr) = ussd.hlr_enabled {
        carrier.hlr_enabled = hlr;
    }
    if let Some(voip) = ussd.voip_enabled {
        carrier.voip_enabled = voip;
    }

    // Absent flags keep their stored value.
    carrier.set_capabilities(
        ussd.intl.unwrap_or(carrier.reach_me_intl),
        ussd.home.unwrap_or(carrier.reach_me_home),
        ussd.voicemail.unwrap_or(carrier.reach_me_voicemail),
    );
}
