//! Property-based test generators using proptest.

use crate::fixtures::fetch_messages_json;
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for server message ids.
pub fn message_id_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000
}

/// Strategy for one `fetch_msgs` page: message ids plus an optional
/// server-reported watermark.
pub fn fetch_page_strategy() -> impl Strategy<Value = (Vec<i64>, Option<i64>)> {
    (
        prop::collection::vec(message_id_strategy(), 0..20),
        prop::option::of(message_id_strategy()),
    )
}

/// Strategy for a sequence of `fetch_msgs` pages, encoded as response bodies.
///
/// Ids may repeat within and across pages, and pages may report a watermark
/// lower than ones already seen.
pub fn fetch_sequence_strategy() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(fetch_page_strategy(), 1..8).prop_map(|pages| {
        pages
            .into_iter()
            .map(|(ids, last)| fetch_messages_json(&ids, last))
            .collect()
    })
}

/// Strategy for Indian mobile numbers with country code.
pub fn phone_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("91[6-9][0-9]{9}").expect("Invalid regex")
}

/// Strategy for the `(intl, home, voicemail)` capability flags.
pub fn capability_strategy() -> impl Strategy<Value = (bool, bool, bool)> {
    (any::<bool>(), any::<bool>(), any::<bool>())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn pages_are_valid_responses(pages in fetch_sequence_strategy()) {
            for page in pages {
                prop_assert_eq!(page["status"].as_str(), Some("ok"));
                prop_assert!(page["msgs"].is_array());
            }
        }

        #[test]
        fn phones_have_country_code(phone in phone_strategy()) {
            prop_assert!(phone.starts_with("91"));
            prop_assert_eq!(phone.len(), 12);
        }
    }
}
