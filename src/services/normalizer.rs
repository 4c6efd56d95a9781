//! Provider-agnostic fact normalization.
//!
//! Canonicalizes extracted facts by semantic group: free-text strings are
//! trimmed, whitespace-collapsed, and lowercased; dates become ISO
//! `YYYY-MM-DD`; times become 24-hour `HH:MM`; identifier fields preserve
//! formatting but are trimmed. Unparseable dates and times fail closed to
//! absent. Never raises, idempotent.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::DocumentFacts;

const DATE_INPUT_FORMATS: [&str; 4] = [
    "%B %d, %Y", // January 18, 2026
    "%b %d, %Y", // Jan 18, 2026
    "%m/%d/%Y",  // 01/18/2026
    "%Y-%m-%d",  // 2026-01-18
];

const TIME_INPUT_FORMATS: [&str; 2] = [
    "%I:%M %p", // 3:42 PM
    "%H:%M",    // 15:42
];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn normalize_string(value: Option<String>) -> Option<String> {
    let value = value?;
    let collapsed = WHITESPACE.replace_all(value.trim(), " ").to_lowercase();
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn normalize_date(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn normalize_time(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    TIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
        .map(|t| t.format("%H:%M").to_string())
}

fn normalize_identifier(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Normalize every fact by its key's semantic group.
///
/// Line items pass through untouched; they are canonicalized separately by
/// the transaction normalizer when a patient-level run needs them.
pub fn normalize_facts(facts: DocumentFacts) -> DocumentFacts {
    DocumentFacts {
        patient_name: normalize_string(facts.patient_name),
        provider_name: normalize_string(facts.provider_name),
        facility_name: normalize_string(facts.facility_name),
        address: normalize_string(facts.address),

        date_of_service: normalize_date(facts.date_of_service),
        date_of_birth: normalize_date(facts.date_of_birth),
        date_range_start: normalize_date(facts.date_range_start),
        date_range_end: normalize_date(facts.date_range_end),

        time_of_service: normalize_time(facts.time_of_service),

        phone_number: normalize_identifier(facts.phone_number),
        receipt_number: normalize_identifier(facts.receipt_number),
        store_id: normalize_identifier(facts.store_id),
        procedure_code: normalize_identifier(facts.procedure_code),

        document_type: facts.document_type,

        receipt_items: facts.receipt_items,
        medical_line_items: facts.medical_line_items,
        dental_line_items: facts.dental_line_items,
        insurance_claim_items: facts.insurance_claim_items,
        fsa_claim_items: facts.fsa_claim_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts_with(f: impl FnOnce(&mut DocumentFacts)) -> DocumentFacts {
        let mut facts = DocumentFacts::default();
        f(&mut facts);
        facts
    }

    #[test]
    fn strings_are_lowercased_and_collapsed() {
        let facts = facts_with(|f| {
            f.patient_name = Some("  Jane   SAMPLE ".into());
            f.facility_name = Some("Mercy\tGeneral  Hospital".into());
        });
        let normalized = normalize_facts(facts);
        assert_eq!(normalized.patient_name.as_deref(), Some("jane sample"));
        assert_eq!(
            normalized.facility_name.as_deref(),
            Some("mercy general hospital")
        );
    }

    #[test]
    fn all_accepted_date_formats_emit_the_same_iso_string() {
        for input in [
            "January 18, 2026",
            "Jan 18, 2026",
            "01/18/2026",
            "2026-01-18",
        ] {
            let facts = facts_with(|f| f.date_of_service = Some(input.into()));
            assert_eq!(
                normalize_facts(facts).date_of_service.as_deref(),
                Some("2026-01-18"),
                "input: {input}"
            );
        }
    }

    #[test]
    fn unparseable_dates_fail_closed() {
        let facts = facts_with(|f| f.date_of_birth = Some("sometime last spring".into()));
        assert_eq!(normalize_facts(facts).date_of_birth, None);
    }

    #[test]
    fn times_become_24_hour() {
        let facts = facts_with(|f| f.time_of_service = Some("3:42 PM".into()));
        assert_eq!(
            normalize_facts(facts).time_of_service.as_deref(),
            Some("15:42")
        );

        let facts = facts_with(|f| f.time_of_service = Some("15:42".into()));
        assert_eq!(
            normalize_facts(facts).time_of_service.as_deref(),
            Some("15:42")
        );
    }

    #[test]
    fn identifiers_keep_formatting_but_trim() {
        let facts = facts_with(|f| {
            f.phone_number = Some(" (555) 010-2030 ".into());
            f.receipt_number = Some("R-00442\n".into());
        });
        let normalized = normalize_facts(facts);
        assert_eq!(normalized.phone_number.as_deref(), Some("(555) 010-2030"));
        assert_eq!(normalized.receipt_number.as_deref(), Some("R-00442"));
    }

    #[test]
    fn empty_strings_become_absent() {
        let facts = facts_with(|f| {
            f.patient_name = Some("   ".into());
            f.store_id = Some("".into());
        });
        let normalized = normalize_facts(facts);
        assert_eq!(normalized.patient_name, None);
        assert_eq!(normalized.store_id, None);
    }

    #[test]
    fn normalization_is_idempotent() {
        let facts = facts_with(|f| {
            f.patient_name = Some("  Jane   Sample ".into());
            f.date_of_service = Some("January 18, 2026".into());
            f.time_of_service = Some("3:42 PM".into());
            f.procedure_code = Some(" 99213 ".into());
        });
        let once = normalize_facts(facts);
        let twice = normalize_facts(once.clone());
        assert_eq!(once, twice);
    }
}
