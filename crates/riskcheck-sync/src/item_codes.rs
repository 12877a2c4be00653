//! Static mapping from 8-K item codes to catalyst categories.

use riskcheck_core::CatalystEventType;

/// One known item code and the event it announces.
#[derive(Debug, Clone, Copy)]
pub struct ItemCodeEvent {
    pub code: &'static str,
    pub event_type: CatalystEventType,
    pub title: &'static str,
}

/// Item codes that map directly onto catalyst events. Codes not listed here
/// (signatures, exhibits, shell-company housekeeping) are ignored.
pub const ITEM_CODE_EVENTS: &[ItemCodeEvent] = &[
    ItemCodeEvent {
        code: "1.01",
        event_type: CatalystEventType::MaterialAgreement,
        title: "Entry into a material definitive agreement",
    },
    ItemCodeEvent {
        code: "1.02",
        event_type: CatalystEventType::MaterialAgreement,
        title: "Termination of a material definitive agreement",
    },
    ItemCodeEvent {
        code: "2.02",
        event_type: CatalystEventType::EarningsRelease,
        title: "Results of operations and financial condition",
    },
    ItemCodeEvent {
        code: "5.02",
        event_type: CatalystEventType::LeadershipChange,
        title: "Departure or appointment of directors or officers",
    },
    ItemCodeEvent {
        code: "7.01",
        event_type: CatalystEventType::OtherDisclosure,
        title: "Regulation FD disclosure",
    },
    ItemCodeEvent {
        code: "8.01",
        event_type: CatalystEventType::OtherDisclosure,
        title: "Other material event",
    },
];

/// Codes whose filings are worth mining for regulatory catalysts.
const REGULATORY_CODES: [&str; 2] = ["7.01", "8.01"];

pub fn lookup(code: &str) -> Option<&'static ItemCodeEvent> {
    let code = code.trim();
    ITEM_CODE_EVENTS.iter().find(|entry| entry.code == code)
}

/// Whether any of a filing's codes suggest a regulatory announcement.
pub fn has_regulatory_code(codes: &[String]) -> bool {
    codes
        .iter()
        .any(|code| REGULATORY_CODES.contains(&code.trim()))
}
