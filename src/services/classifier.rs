//! Regex-based document classification and pre-fact scanning.
//!
//! Classification counts case-insensitive pattern hits per document type;
//! the pre-fact scanner emits a fixed-shape structural summary used only to
//! pick between heuristic and model extraction and to populate the
//! workflow log. Both are pure functions and never fail.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::DocumentType;
use crate::utils::round2;

/// Frozen per-type trigger pattern sets.
static DOCUMENT_SIGNALS: Lazy<Vec<(DocumentType, Vec<Regex>)>> = Lazy::new(|| {
    let patterns = |ps: &[&str]| -> Vec<Regex> {
        ps.iter()
            .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
            .collect()
    };

    vec![
        (
            DocumentType::MedicalBill,
            patterns(&[
                r"\bCPT\b",
                r"\bICD-10\b",
                r"Date of Service",
                r"Patient Responsibility",
                r"Allowed Amount",
            ]),
        ),
        (
            DocumentType::InsuranceEob,
            patterns(&[
                r"Explanation of Benefits",
                r"\bEOB\b",
                r"Insurance Paid",
                r"Claim Number",
            ]),
        ),
        (
            DocumentType::PharmacyReceipt,
            patterns(&[r"\bRx\b", r"NDC", r"Pharmacy", r"Copay"]),
        ),
        (
            DocumentType::DentalBill,
            patterns(&[r"\bD\d{4}\b", r"Dental", r"Crown", r"Lab Fee"]),
        ),
    ]
});

/// Specific-before-general ordering used to resolve score ties.
const TIE_ORDER: [DocumentType; 4] = [
    DocumentType::DentalBill,
    DocumentType::MedicalBill,
    DocumentType::PharmacyReceipt,
    DocumentType::InsuranceEob,
];

/// Reimbursement-table triggers. When a tie involves the EOB type and one
/// of these matched, the EOB wins over procedure-code-bearing bills.
static REIMBURSEMENT_TABLE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)Explanation of Benefits").unwrap(),
        Regex::new(r"(?i)Insurance Paid").unwrap(),
    ]
});

/// Classification outcome. `scores` records the raw match count per type
/// that matched at least one pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub document_type: DocumentType,
    pub confidence: f64,
    pub scores: BTreeMap<DocumentType, usize>,
}

/// Classify raw document text by pattern-set scoring.
///
/// Confidence is the winning type's match count over the total matches
/// across all types. No matches at all yields `(generic, 0.0, {})`.
pub fn classify_document(text: &str) -> Classification {
    let mut scores: BTreeMap<DocumentType, usize> = BTreeMap::new();

    for (doc_type, patterns) in DOCUMENT_SIGNALS.iter() {
        let matches = patterns.iter().filter(|p| p.is_match(text)).count();
        if matches > 0 {
            scores.insert(*doc_type, matches);
        }
    }

    if scores.is_empty() {
        return Classification {
            document_type: DocumentType::Generic,
            confidence: 0.0,
            scores,
        };
    }

    let best_score = *scores.values().max().unwrap_or(&0);
    let tied: Vec<DocumentType> = TIE_ORDER
        .iter()
        .copied()
        .filter(|t| scores.get(t) == Some(&best_score))
        .collect();

    let best = if tied.len() > 1
        && tied.contains(&DocumentType::InsuranceEob)
        && REIMBURSEMENT_TABLE.iter().any(|p| p.is_match(text))
    {
        DocumentType::InsuranceEob
    } else {
        tied[0]
    };

    let total: usize = scores.values().sum();
    let confidence = round2(best_score as f64 / total as f64);

    Classification {
        document_type: best,
        confidence,
        scores,
    }
}

// ============================================================================
// Pre-Fact Scanner
// ============================================================================

static CPT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bCPT\b").unwrap());
static DENTAL_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bD\d{4}\b").unwrap());
static RX_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bRx\b").unwrap());

/// Lightweight structural summary emitted before full extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreFacts {
    pub contains_cpt: bool,
    pub contains_dental_code: bool,
    pub contains_rx: bool,
    pub line_count: usize,
    pub char_count: usize,
}

/// Scan document text for cheap structural features.
pub fn extract_pre_facts(text: &str) -> PreFacts {
    PreFacts {
        contains_cpt: CPT_MARKER.is_match(text),
        contains_dental_code: DENTAL_CODE.is_match(text),
        contains_rx: RX_MARKER.is_match(text),
        line_count: text.lines().count(),
        char_count: text.chars().count(),
    }
}
