//! Regex-based local fact extraction.
//!
//! Best-effort fallback used when no model key is available or the caller
//! forces offline mode. Pulls labeled fields out of the text and leans on
//! the classifier for the document type.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::FactExtractor;
use crate::models::DocumentFacts;
use crate::services::classifier::classify_document;
use crate::services::normalizer::normalize_facts;

static PATIENT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*patient(?: name)?:\s*(.+)$").unwrap());
static DATE_OF_BIRTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)(?:date of birth|dob):\s*([^\n]+)").unwrap());
static DATE_OF_SERVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)date of service:\s*([^\n]+)").unwrap());
static TIME_OF_SERVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)time:\s*(\d{1,2}:\d{2}\s*(?:AM|PM)?)").unwrap());
static PROVIDER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*provider:\s*(.+)$").unwrap());
static FACILITY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*facility:\s*(.+)$").unwrap());
static PHONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}").unwrap());
static PROCEDURE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCPT[:\s#]*(\d{5})\b").unwrap());
static RECEIPT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)(?:receipt|transaction|order)\s*(?:number|#|no\.?)[:\s]*([A-Za-z0-9-]+)")
        .unwrap()
});
static STORE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)store\s*(?:number|#|no\.?)[:\s]*([A-Za-z0-9-]+)").unwrap());
static STREET_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(\d+\s+[A-Za-z0-9 .]+(?:st|street|ave|avenue|rd|road|blvd|boulevard|dr|drive|ln|lane|way)\b[^\n]*)$")
        .unwrap()
});

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FactExtractor for HeuristicExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn extract(&self, raw_text: &str) -> DocumentFacts {
        if raw_text.trim().is_empty() {
            return DocumentFacts::default();
        }

        let facts = DocumentFacts {
            patient_name: capture(&PATIENT_NAME, raw_text),
            date_of_birth: capture(&DATE_OF_BIRTH, raw_text),
            date_of_service: capture(&DATE_OF_SERVICE, raw_text),
            time_of_service: capture(&TIME_OF_SERVICE, raw_text),
            provider_name: capture(&PROVIDER_NAME, raw_text),
            facility_name: capture(&FACILITY_NAME, raw_text),
            address: capture(&STREET_ADDRESS, raw_text),
            phone_number: PHONE_NUMBER
                .find(raw_text)
                .map(|m| m.as_str().to_string()),
            procedure_code: capture(&PROCEDURE_CODE, raw_text),
            receipt_number: capture(&RECEIPT_NUMBER, raw_text),
            store_id: capture(&STORE_ID, raw_text),
            document_type: Some(classify_document(raw_text).document_type),
            ..Default::default()
        };

        normalize_facts(facts)
    }
}
