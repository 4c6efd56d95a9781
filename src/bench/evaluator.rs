//! Detection evaluation against the ground-truth catalog.
//!
//! Matches each detected issue to at most one expected issue (CPT code
//! substring first, then type-keyword overlap; first match wins), tracks
//! per-category stats, and aggregates suites from totals rather than
//! averaged per-patient recalls so small subcategories stay statistically
//! stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::ExpectedIssue;
use crate::models::Issue;

/// Per-category detection stats for one patient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_negatives: usize,
    pub total: usize,
}

/// Evaluation of one patient's detected issues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionEvaluation {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// Percentage of `requires_domain_knowledge` issues matched.
    pub domain_knowledge_score: f64,
    pub domain_true_positives: usize,
    pub domain_expected: usize,
    pub domain_breakdown: BTreeMap<String, CategoryBreakdown>,
    pub domain_recall: f64,
    pub generic_recall: f64,
    pub cross_document_recall: f64,
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Evaluate detected issues against the expected catalog.
pub fn evaluate_detection(expected: &[ExpectedIssue], detected: &[Issue]) -> DetectionEvaluation {
    if expected.is_empty() {
        // Nothing expected: every detection is a false alarm.
        return DetectionEvaluation {
            false_positives: detected.len(),
            ..Default::default()
        };
    }

    let serialized: Vec<String> = detected
        .iter()
        .map(|issue| {
            serde_json::to_string(issue)
                .unwrap_or_default()
                .to_lowercase()
        })
        .collect();

    let mut matched_expected: Vec<bool> = vec![false; expected.len()];
    let mut matched_detected: Vec<bool> = vec![false; detected.len()];
    let mut domain_knowledge_detections = 0usize;
    let mut stats: BTreeMap<String, (usize, usize, usize)> = BTreeMap::new(); // (tp, fn, total)

    for (det_idx, issue_text) in serialized.iter().enumerate() {
        for (exp_idx, expected_issue) in expected.iter().enumerate() {
            if matched_expected[exp_idx] {
                continue;
            }

            let cpt_match = expected_issue
                .cpt_code
                .as_deref()
                .map(|code| issue_text.contains(&code.to_lowercase()))
                .unwrap_or(false);

            let keyword_match = cpt_match
                || expected_issue
                    .issue_type
                    .split('_')
                    .any(|keyword| issue_text.contains(keyword));

            if keyword_match {
                matched_expected[exp_idx] = true;
                matched_detected[det_idx] = true;
                if expected_issue.requires_domain_knowledge {
                    domain_knowledge_detections += 1;
                }
                stats
                    .entry(expected_issue.issue_type.clone())
                    .or_default()
                    .0 += 1;
                break;
            }
        }
    }

    for (exp_idx, expected_issue) in expected.iter().enumerate() {
        let entry = stats.entry(expected_issue.issue_type.clone()).or_default();
        entry.2 += 1;
        if !matched_expected[exp_idx] {
            entry.1 += 1;
        }
    }

    let domain_breakdown: BTreeMap<String, CategoryBreakdown> = stats
        .into_iter()
        .map(|(category, (tp, fn_, total))| {
            let precision = if tp > 0 { 1.0 } else { 0.0 };
            let recall = if total > 0 { tp as f64 / total as f64 } else { 0.0 };
            (
                category,
                CategoryBreakdown {
                    precision: round4(precision),
                    recall: round4(recall),
                    f1: round4(f1(precision, recall)),
                    true_positives: tp,
                    false_negatives: fn_,
                    total,
                },
            )
        })
        .collect();

    let true_positives = matched_expected.iter().filter(|m| **m).count();
    let false_positives = detected.len() - matched_detected.iter().filter(|m| **m).count();
    let false_negatives = expected.len() - true_positives;

    let domain_total = expected.iter().filter(|e| e.requires_domain_knowledge).count();
    let domain_knowledge_score = if domain_total > 0 {
        domain_knowledge_detections as f64 / domain_total as f64 * 100.0
    } else {
        0.0
    };
    let domain_recall = if domain_total > 0 {
        domain_knowledge_detections as f64 / domain_total as f64
    } else {
        0.0
    };

    let generic_total = expected.len() - domain_total;
    let generic_detections = true_positives - domain_knowledge_detections;
    let generic_recall = if generic_total > 0 {
        generic_detections as f64 / generic_total as f64
    } else {
        0.0
    };

    DetectionEvaluation {
        true_positives,
        false_positives,
        false_negatives,
        domain_knowledge_score,
        domain_true_positives: domain_knowledge_detections,
        domain_expected: domain_total,
        domain_breakdown,
        domain_recall,
        generic_recall,
        // Domain issues are the cross-document issues in this catalog.
        cross_document_recall: domain_recall,
    }
}

// ============================================================================
// Suite aggregation
// ============================================================================

/// Results for a single patient's multi-document analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientBenchmarkResult {
    pub patient_id: String,
    pub patient_name: String,
    pub model_name: String,
    pub documents_analyzed: usize,
    pub analysis_latency_ms: f64,
    pub expected_issue_count: usize,
    pub detected_issues: Vec<Issue>,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub domain_knowledge_score: f64,
    pub domain_true_positives: usize,
    pub domain_expected: usize,
    pub error_message: Option<String>,
    pub domain_breakdown: BTreeMap<String, CategoryBreakdown>,
    pub domain_recall: f64,
    pub generic_recall: f64,
    pub cross_document_recall: f64,
}

/// Aggregated per-category totals across a suite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedCategory {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub total_detected: usize,
    pub total_missed: usize,
    pub total_cases: usize,
}

/// Parent category built from subtype totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParentCategory {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub total_detected: usize,
    pub total_missed: usize,
    pub total_cases: usize,
    pub subtypes: BTreeMap<String, SubtypeRecall>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtypeRecall {
    pub recall: f64,
    pub detected: usize,
    pub total: usize,
}

/// Sum per-category stats across patients, then compute recall from the
/// totals (`Σ TP / Σ expected`) — never the mean of per-patient recalls.
pub fn aggregate_domain_breakdown(
    results: &[PatientBenchmarkResult],
) -> BTreeMap<String, AggregatedCategory> {
    let mut totals: BTreeMap<String, (usize, usize, usize)> = BTreeMap::new();

    for result in results {
        if result.error_message.is_some() {
            continue;
        }
        for (category, breakdown) in &result.domain_breakdown {
            let entry = totals.entry(category.clone()).or_default();
            entry.0 += breakdown.true_positives;
            entry.1 += breakdown.false_negatives;
            entry.2 += breakdown.total;
        }
    }

    totals
        .into_iter()
        .map(|(category, (tp, fn_, total))| {
            let precision = if tp > 0 { 1.0 } else { 0.0 };
            let recall = if total > 0 { tp as f64 / total as f64 } else { 0.0 };
            (
                category,
                AggregatedCategory {
                    precision: round4(precision),
                    recall: round4(recall),
                    f1: round4(f1(precision, recall)),
                    total_detected: tp,
                    total_missed: fn_,
                    total_cases: total,
                },
            )
        })
        .collect()
}

const AGE_SUBTYPES: [&str; 3] = [
    "age_inappropriate",
    "age_inappropriate_procedure",
    "age_inappropriate_screening",
];

/// Combine statistically underpowered subcategories into parent
/// categories. Parent metrics come from summed totals, not averaged
/// subtype recalls.
pub fn aggregate_parent_categories(
    aggregated: &BTreeMap<String, AggregatedCategory>,
) -> BTreeMap<String, ParentCategory> {
    let mut parents = BTreeMap::new();

    let present: Vec<&str> = AGE_SUBTYPES
        .iter()
        .copied()
        .filter(|subtype| aggregated.contains_key(*subtype))
        .collect();

    if !present.is_empty() {
        let total_detected: usize = present.iter().map(|s| aggregated[*s].total_detected).sum();
        let total_missed: usize = present.iter().map(|s| aggregated[*s].total_missed).sum();
        let total_cases: usize = present.iter().map(|s| aggregated[*s].total_cases).sum();

        let precision = if total_detected > 0 { 1.0 } else { 0.0 };
        let recall = if total_cases > 0 {
            total_detected as f64 / total_cases as f64
        } else {
            0.0
        };

        let subtypes = present
            .iter()
            .map(|subtype| {
                let cat = &aggregated[*subtype];
                (
                    subtype.to_string(),
                    SubtypeRecall {
                        recall: cat.recall,
                        detected: cat.total_detected,
                        total: cat.total_cases,
                    },
                )
            })
            .collect();

        parents.insert(
            "age_inappropriate_service".to_string(),
            ParentCategory {
                precision: round4(precision),
                recall: round4(recall),
                f1: round4(f1(precision, recall)),
                total_detected,
                total_missed,
                total_cases,
                subtypes,
            },
        );
    }

    parents
}
