//! Deterministic rule engine.
//!
//! Pure functions over fact maps producing issues without any model call.
//! Calling any of these twice on the same facts returns equal results; the
//! engine never consults the network and never fails.

use std::collections::HashSet;

use crate::models::{DocumentFacts, Issue, IssueSource, IssueType};
use crate::utils::round2;

/// Emit rule-based issues for the given facts.
///
/// A duplicate `(date_of_service, code)` pair emits one `duplicate_charge`
/// issue per second-or-later occurrence, carrying that occurrence's
/// patient responsibility as `max_savings`.
pub fn deterministic_issues(facts: &DocumentFacts) -> Vec<Issue> {
    let mut issues = Vec::new();

    // --- Duplicate medical CPTs ---
    let mut seen: HashSet<(Option<String>, Option<String>)> = HashSet::new();
    for item in facts.medical_items() {
        let key = (item.date_of_service.clone(), item.cpt_code.clone());
        if !seen.insert(key) {
            issues.push(Issue {
                issue_type: IssueType::DuplicateCharge,
                summary: "Duplicate medical procedure billed".to_string(),
                evidence: Some(format!(
                    "CPT {} appears more than once on {}",
                    item.cpt_code.as_deref().unwrap_or("(none)"),
                    item.date_of_service.as_deref().unwrap_or("(unknown date)")
                )),
                code: item.cpt_code.clone(),
                date: item.date_of_service.clone(),
                max_savings: item.patient_responsibility,
                recommended_action: Some(
                    "Contact the provider or insurer to verify duplicate billing.".to_string(),
                ),
                source: IssueSource::Deterministic,
                confidence: 1.0,
            });
        }
    }

    // --- Duplicate dental CDT codes ---
    let mut seen: HashSet<(Option<String>, Option<String>)> = HashSet::new();
    for item in facts.dental_items() {
        let key = (item.date_of_service.clone(), item.cdt_code.clone());
        if !seen.insert(key) {
            issues.push(Issue {
                issue_type: IssueType::DuplicateCharge,
                summary: "Duplicate dental procedure billed".to_string(),
                evidence: Some(format!(
                    "CDT {} billed multiple times on {}",
                    item.cdt_code.as_deref().unwrap_or("(none)"),
                    item.date_of_service.as_deref().unwrap_or("(unknown date)")
                )),
                code: item.cdt_code.clone(),
                date: item.date_of_service.clone(),
                max_savings: item.patient_responsibility,
                recommended_action: Some(
                    "Ask the dental office whether this procedure was billed twice.".to_string(),
                ),
                source: IssueSource::Deterministic,
                confidence: 1.0,
            });
        }
    }

    issues
}

/// Total potential savings from deterministic findings.
///
/// Covers duplicate medical/dental charges plus denied FSA claim rows
/// (submitted amount with zero reimbursement). Denied FSA rows contribute
/// savings only; no corresponding issue is emitted.
pub fn deterministic_savings(facts: &DocumentFacts) -> f64 {
    let mut savings = 0.0;

    let mut seen: HashSet<(Option<String>, Option<String>)> = HashSet::new();
    for item in facts.medical_items() {
        let key = (item.date_of_service.clone(), item.cpt_code.clone());
        if !seen.insert(key) {
            savings += item.patient_responsibility.unwrap_or(0.0);
        }
    }

    let mut seen: HashSet<(Option<String>, Option<String>)> = HashSet::new();
    for item in facts.dental_items() {
        let key = (item.date_of_service.clone(), item.cdt_code.clone());
        if !seen.insert(key) {
            savings += item.patient_responsibility.unwrap_or(0.0);
        }
    }

    // --- Non-covered / denied FSA items ---
    for item in facts.fsa_items() {
        if item.amount_reimbursed.unwrap_or(0.0) == 0.0 {
            savings += item.amount_submitted.unwrap_or(0.0);
        }
    }

    round2(savings)
}

/// Normalize issue savings in place: round to cents, drop negatives.
pub fn normalize_issue_savings(issues: &mut [Issue]) {
    for issue in issues.iter_mut() {
        issue.max_savings = issue
            .max_savings
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(round2);
    }
}
