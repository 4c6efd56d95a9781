//! Phase-2 line-item extraction.
//!
//! Dispatches on the normalized document type through a table of phase-2
//! specs: each entry names the prompt builder, the JSON array key expected
//! in the response, and where the parsed items attach on the fact map.
//! Document types without an entry skip phase-2. All failures are recorded
//! in the workflow log and the pipeline proceeds without line items; the
//! orchestrator never aborts because phase-2 failed.

use serde_json::Value;

use crate::error::ProviderError;
use crate::models::workflow::{LineItemKind, WorkflowLogBuilder};
use crate::models::{DocumentFacts, DocumentType};
use crate::services::llm::AnalysisProvider;
use crate::services::prompts;
use crate::utils::clean_llm_json;

/// Phase-2 dispatch entry for one document type.
struct Phase2Spec {
    kind: LineItemKind,
    array_key: &'static str,
    build_prompt: fn(&str) -> String,
}

/// Look up the phase-2 spec for a normalized document type.
fn spec_for(doc_type: DocumentType) -> Option<Phase2Spec> {
    match doc_type {
        DocumentType::PharmacyReceipt => Some(Phase2Spec {
            kind: LineItemKind::Receipt,
            array_key: "receipt_items",
            build_prompt: prompts::build_receipt_line_item_prompt,
        }),
        DocumentType::MedicalBill => Some(Phase2Spec {
            kind: LineItemKind::Medical,
            array_key: "medical_line_items",
            build_prompt: prompts::build_medical_line_item_prompt,
        }),
        DocumentType::DentalBill => Some(Phase2Spec {
            kind: LineItemKind::Dental,
            array_key: "dental_line_items",
            build_prompt: prompts::build_dental_line_item_prompt,
        }),
        DocumentType::InsuranceEob
        | DocumentType::InsuranceClaimHistory
        | DocumentType::InsuranceDocument => Some(Phase2Spec {
            kind: LineItemKind::Insurance,
            array_key: "insurance_claim_items",
            build_prompt: prompts::build_insurance_claim_item_prompt,
        }),
        DocumentType::FsaClaimHistory => Some(Phase2Spec {
            kind: LineItemKind::Fsa,
            array_key: "fsa_claim_items",
            build_prompt: prompts::build_fsa_claim_item_prompt,
        }),
        _ => None,
    }
}

/// Whether the normalized document type triggers a phase-2 pass at all.
pub fn has_phase2(doc_type: DocumentType) -> bool {
    spec_for(doc_type).is_some()
}

/// Run phase-2 for the document, attaching parsed items to `facts` and
/// recording counts or errors on the workflow log.
pub async fn run_phase2(
    provider: &dyn AnalysisProvider,
    doc_type: DocumentType,
    raw_text: &str,
    facts: &mut DocumentFacts,
    log: &mut WorkflowLogBuilder,
) {
    let Some(spec) = spec_for(doc_type) else {
        return;
    };

    let prompt = (spec.build_prompt)(raw_text);
    let response = match provider.run_prompt(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            record_failure(log, spec.kind, &e.to_string());
            return;
        },
    };

    match parse_items(&response, spec.array_key) {
        Ok(items) => {
            let count = attach_items(facts, spec.kind, items, log);
            log.set_item_count(spec.kind, count);
        },
        Err(e) => record_failure(log, spec.kind, &e.to_string()),
    }
}

fn record_failure(log: &mut WorkflowLogBuilder, kind: LineItemKind, error: &str) {
    tracing::warn!(?kind, "phase-2 extraction failed: {error}");
    log.set_phase2_error(kind, error.to_string());
}

/// Pull the typed array out of the cleaned response object.
fn parse_items(response: &str, array_key: &str) -> Result<Vec<Value>, ProviderError> {
    let cleaned = clean_llm_json(response);
    let parsed: Value = serde_json::from_str(&cleaned)
        .map_err(|e| ProviderError::Parse(format!("phase-2 JSON invalid: {e}")))?;

    parsed
        .get(array_key)
        .and_then(|v| v.as_array())
        .map(|items| items.to_vec())
        .ok_or_else(|| ProviderError::Parse(format!("missing {array_key} array")))
}

/// Deserialize and attach items of the right family; returns the count.
/// A shape mismatch on the whole array is a recorded failure upstream;
/// here the array is already JSON, so per-family deserialization applies
/// lenient item defaults.
fn attach_items(
    facts: &mut DocumentFacts,
    kind: LineItemKind,
    items: Vec<Value>,
    log: &mut WorkflowLogBuilder,
) -> usize {
    fn typed<T: serde::de::DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>, String> {
        items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| e.to_string()))
            .collect()
    }

    let count = match kind {
        LineItemKind::Receipt => match typed(items) {
            Ok(parsed) => {
                let n = parsed.len();
                if n > 0 {
                    facts.receipt_items = Some(parsed);
                }
                n
            },
            Err(e) => {
                record_failure(log, kind, &e);
                return 0;
            },
        },
        LineItemKind::Medical => match typed(items) {
            Ok(parsed) => {
                let n = parsed.len();
                if n > 0 {
                    facts.medical_line_items = Some(parsed);
                }
                n
            },
            Err(e) => {
                record_failure(log, kind, &e);
                return 0;
            },
        },
        LineItemKind::Dental => match typed(items) {
            Ok(parsed) => {
                let n = parsed.len();
                if n > 0 {
                    facts.dental_line_items = Some(parsed);
                }
                n
            },
            Err(e) => {
                record_failure(log, kind, &e);
                return 0;
            },
        },
        LineItemKind::Insurance => match typed(items) {
            Ok(parsed) => {
                let n = parsed.len();
                if n > 0 {
                    facts.insurance_claim_items = Some(parsed);
                }
                n
            },
            Err(e) => {
                record_failure(log, kind, &e);
                return 0;
            },
        },
        LineItemKind::Fsa => match typed(items) {
            Ok(parsed) => {
                let n = parsed.len();
                if n > 0 {
                    facts.fsa_claim_items = Some(parsed);
                }
                n
            },
            Err(e) => {
                record_failure(log, kind, &e);
                return 0;
            },
        },
    };

    count
}
