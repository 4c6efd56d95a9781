//! Extracted fact model.
//!
//! A fact map is a fixed set of semantic keys with optional values. It is
//! modeled as a struct with one optional field per key so the key set is
//! checked at compile time; adding a key means touching every extractor.
//! Missing values are `None`, never empty strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed fact key set, in extraction-prompt order.
pub const FACT_KEYS: [&str; 14] = [
    "patient_name",
    "date_of_birth",
    "date_of_service",
    "time_of_service",
    "date_range_start",
    "date_range_end",
    "provider_name",
    "facility_name",
    "address",
    "phone_number",
    "procedure_code",
    "receipt_number",
    "store_id",
    "document_type",
];

/// Document classification value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    MedicalBill,
    DentalBill,
    PharmacyReceipt,
    InsuranceEob,
    InsuranceClaimHistory,
    InsuranceDocument,
    FsaClaimHistory,
    FsaReceipt,
    Generic,
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MedicalBill => "medical_bill",
            Self::DentalBill => "dental_bill",
            Self::PharmacyReceipt => "pharmacy_receipt",
            Self::InsuranceEob => "insurance_eob",
            Self::InsuranceClaimHistory => "insurance_claim_history",
            Self::InsuranceDocument => "insurance_document",
            Self::FsaClaimHistory => "fsa_claim_history",
            Self::FsaReceipt => "fsa_receipt",
            Self::Generic => "generic",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a model-produced type string. Anything outside the known set
    /// maps to `Unknown` rather than failing the extraction.
    pub fn parse_type(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "medical_bill" => Self::MedicalBill,
            "dental_bill" => Self::DentalBill,
            "pharmacy_receipt" => Self::PharmacyReceipt,
            "insurance_eob" => Self::InsuranceEob,
            "insurance_claim_history" => Self::InsuranceClaimHistory,
            "insurance_document" => Self::InsuranceDocument,
            "fsa_claim_history" => Self::FsaClaimHistory,
            "fsa_receipt" => Self::FsaReceipt,
            "generic" => Self::Generic,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Line Items
// ============================================================================

/// One billed service row from a medical bill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalLineItem {
    #[serde(default)]
    pub date_of_service: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cpt_code: Option<String>,
    #[serde(default)]
    pub billed: Option<f64>,
    #[serde(default)]
    pub allowed: Option<f64>,
    #[serde(default)]
    pub patient_responsibility: Option<f64>,
    #[serde(default)]
    pub units: Option<f64>,
}

/// One billed procedure row from a dental bill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DentalLineItem {
    #[serde(default)]
    pub date_of_service: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cdt_code: Option<String>,
    #[serde(default)]
    pub tooth_number: Option<String>,
    #[serde(default)]
    pub billed: Option<f64>,
    #[serde(default)]
    pub patient_responsibility: Option<f64>,
}

/// One purchasable item from a retail or pharmacy receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub fsa_eligible: Option<bool>,
    #[serde(default)]
    pub eligibility_reason: Option<String>,
}

/// One adjudicated claim row from an insurance EOB or claim history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsuranceClaimItem {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub billed: Option<f64>,
    #[serde(default)]
    pub allowed: Option<f64>,
    #[serde(default)]
    pub insurance_paid: Option<f64>,
    #[serde(default)]
    pub patient_responsibility: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One reimbursement decision row from an FSA/HSA claim history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FsaClaimItem {
    #[serde(default)]
    pub date_submitted: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount_submitted: Option<f64>,
    #[serde(default)]
    pub amount_reimbursed: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

// ============================================================================
// Fact Map
// ============================================================================

/// Complete fact map for one document.
///
/// Every extractor returns this struct in full (absent values for every key
/// it could not determine). Line-item vectors are attached by the phase-2
/// parser after extraction and stay `None` when phase-2 never ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFacts {
    pub patient_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub date_of_service: Option<String>,
    pub time_of_service: Option<String>,
    pub date_range_start: Option<String>,
    pub date_range_end: Option<String>,
    pub provider_name: Option<String>,
    pub facility_name: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub procedure_code: Option<String>,
    pub receipt_number: Option<String>,
    pub store_id: Option<String>,
    pub document_type: Option<DocumentType>,

    #[serde(default)]
    pub receipt_items: Option<Vec<ReceiptItem>>,
    #[serde(default)]
    pub medical_line_items: Option<Vec<MedicalLineItem>>,
    #[serde(default)]
    pub dental_line_items: Option<Vec<DentalLineItem>>,
    #[serde(default)]
    pub insurance_claim_items: Option<Vec<InsuranceClaimItem>>,
    #[serde(default)]
    pub fsa_claim_items: Option<Vec<FsaClaimItem>>,
}

impl DocumentFacts {
    /// Project a model-produced JSON object onto the known key set.
    /// Unknown keys are discarded; non-string scalars are stringified.
    pub fn from_extraction_json(value: &Value) -> Self {
        let get = |key: &str| -> Option<String> {
            match value.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            }
        };

        Self {
            patient_name: get("patient_name"),
            date_of_birth: get("date_of_birth"),
            date_of_service: get("date_of_service"),
            time_of_service: get("time_of_service"),
            date_range_start: get("date_range_start"),
            date_range_end: get("date_range_end"),
            provider_name: get("provider_name"),
            facility_name: get("facility_name"),
            address: get("address"),
            phone_number: get("phone_number"),
            procedure_code: get("procedure_code"),
            receipt_number: get("receipt_number"),
            store_id: get("store_id"),
            document_type: get("document_type")
                .as_deref()
                .map(DocumentType::parse_type),
            ..Default::default()
        }
    }

    /// Number of populated scalar fact keys.
    pub fn fact_count(&self) -> usize {
        [
            self.patient_name.is_some(),
            self.date_of_birth.is_some(),
            self.date_of_service.is_some(),
            self.time_of_service.is_some(),
            self.date_range_start.is_some(),
            self.date_range_end.is_some(),
            self.provider_name.is_some(),
            self.facility_name.is_some(),
            self.address.is_some(),
            self.phone_number.is_some(),
            self.procedure_code.is_some(),
            self.receipt_number.is_some(),
            self.store_id.is_some(),
            self.document_type.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    pub fn medical_items(&self) -> &[MedicalLineItem] {
        self.medical_line_items.as_deref().unwrap_or(&[])
    }

    pub fn dental_items(&self) -> &[DentalLineItem] {
        self.dental_line_items.as_deref().unwrap_or(&[])
    }

    pub fn receipt_item_list(&self) -> &[ReceiptItem] {
        self.receipt_items.as_deref().unwrap_or(&[])
    }

    pub fn insurance_items(&self) -> &[InsuranceClaimItem] {
        self.insurance_claim_items.as_deref().unwrap_or(&[])
    }

    pub fn fsa_items(&self) -> &[FsaClaimItem] {
        self.fsa_claim_items.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projection_keeps_known_keys_and_drops_the_rest() {
        let raw = json!({
            "patient_name": "Jane Sample",
            "document_type": "pharmacy_receipt",
            "store_id": 4211,
            "made_up_key": "discarded",
            "address": ""
        });

        let facts = DocumentFacts::from_extraction_json(&raw);
        assert_eq!(facts.patient_name.as_deref(), Some("Jane Sample"));
        assert_eq!(facts.document_type, Some(DocumentType::PharmacyReceipt));
        assert_eq!(facts.store_id.as_deref(), Some("4211"));
        assert_eq!(facts.address, None);
        assert_eq!(facts.fact_count(), 3);
    }

    #[test]
    fn unrecognized_document_type_becomes_unknown() {
        let raw = json!({ "document_type": "grocery_list" });
        let facts = DocumentFacts::from_extraction_json(&raw);
        assert_eq!(facts.document_type, Some(DocumentType::Unknown));
    }

    #[test]
    fn empty_object_yields_all_absent() {
        let facts = DocumentFacts::from_extraction_json(&json!({}));
        assert_eq!(facts, DocumentFacts::default());
        assert_eq!(facts.fact_count(), 0);
    }

    #[test]
    fn document_type_round_trips_through_serde() {
        for ty in [
            DocumentType::MedicalBill,
            DocumentType::FsaClaimHistory,
            DocumentType::Unknown,
        ] {
            let s = serde_json::to_string(&ty).unwrap();
            assert_eq!(s, format!("\"{}\"", ty.as_str()));
            let back: DocumentType = serde_json::from_str(&s).unwrap();
            assert_eq!(back, ty);
        }
    }
}
