//! Advanced benchmark metrics.
//!
//! Risk-weighted recall, conservatism index, P95 latency, ROI ratio, and
//! hybrid model complementarity over patient-level benchmark outputs.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Per-category risk weights. Categories whose misses carry clinical or
/// financial risk weigh more than routine billing noise; anything not
/// listed weighs 1.
pub static RISK_WEIGHTS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        // Critical: contradictions of documented clinical state
        ("surgical_history_contradiction", 3),
        ("diagnosis_procedure_mismatch", 3),
        ("anatomical_contradiction", 3),
        ("inconsistent_with_health_history", 3),
        // High impact billing abuse
        ("medical_necessity", 2),
        ("upcoding", 2),
        ("temporal_violation", 2),
        // Standard
        ("duplicate_charge", 1),
        ("gender_mismatch", 1),
        ("gender_specific_contradiction", 1),
        ("age_inappropriate", 1),
    ])
});

/// Risk weight for a category, defaulting to 1.
pub fn risk_weight_for(category: &str) -> u32 {
    RISK_WEIGHTS.get(category).copied().unwrap_or(1)
}

/// Detection performance for one error category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPerformance {
    pub category: String,
    pub total: usize,
    pub detected: usize,
    pub detection_rate: f64,
    pub risk_weight: u32,
}

impl CategoryPerformance {
    pub fn new(category: impl Into<String>, total: usize, detected: usize) -> Self {
        let category = category.into();
        let detection_rate = if total > 0 {
            detected as f64 / total as f64
        } else {
            0.0
        };
        let risk_weight = risk_weight_for(&category);
        Self {
            category,
            total,
            detected,
            detection_rate,
            risk_weight,
        }
    }
}

/// Recall in which each category contributes in proportion to its risk
/// weight: `(Σ w·TP) / (Σ w·expected)`.
pub fn calculate_risk_weighted_recall(categories: &[CategoryPerformance]) -> f64 {
    let weighted_detected: f64 = categories
        .iter()
        .map(|c| c.risk_weight as f64 * c.detected as f64)
        .sum();
    let weighted_total: f64 = categories
        .iter()
        .map(|c| c.risk_weight as f64 * c.total as f64)
        .sum();

    if weighted_total == 0.0 {
        0.0
    } else {
        weighted_detected / weighted_total
    }
}

/// `FN / (FN + FP)` — 1.0 means every error is a missed detection
/// (conservative), 0.0 means every error is a false alarm (aggressive),
/// 0.5 when there are no errors at all.
pub fn calculate_conservatism_index(false_negatives: usize, false_positives: usize) -> f64 {
    let total_errors = false_negatives + false_positives;
    if total_errors == 0 {
        0.5
    } else {
        false_negatives as f64 / total_errors as f64
    }
}

/// 95th percentile of per-run latencies, linear interpolation between
/// adjacent order statistics.
pub fn calculate_p95_latency(latencies_ms: &[f64]) -> f64 {
    percentile(latencies_ms, 95.0)
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let fraction = rank - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

/// ROI ratio `total_potential_savings / inference_cost`, where inference
/// cost is `avg_latency_seconds × cost_per_second`. Returns
/// `(roi_ratio, inference_cost_usd)`; both zero at zero latency.
pub fn calculate_roi_ratio(
    total_potential_savings: f64,
    avg_latency_ms: f64,
    cost_per_second: f64,
) -> (f64, f64) {
    if avg_latency_ms <= 0.0 {
        return (0.0, 0.0);
    }
    let inference_cost = (avg_latency_ms / 1000.0) * cost_per_second;
    if inference_cost == 0.0 {
        return (0.0, 0.0);
    }
    (total_potential_savings / inference_cost, inference_cost)
}

/// Complementarity of two models' detected-issue sets:
/// `(unique_a, unique_b, overlap, incremental_recall_gain)` where the gain
/// is the union recall over the better single model's recall.
pub fn calculate_hybrid_complementarity(
    model_a: &HashSet<String>,
    model_b: &HashSet<String>,
    model_a_recall: f64,
    model_b_recall: f64,
    total_issues: usize,
) -> (usize, usize, usize, f64) {
    let unique_a = model_a.difference(model_b).count();
    let unique_b = model_b.difference(model_a).count();
    let overlap = model_a.intersection(model_b).count();

    let gain = if total_issues == 0 {
        0.0
    } else {
        let union_recall = model_a.union(model_b).count() as f64 / total_issues as f64;
        (union_recall - model_a_recall.max(model_b_recall)).max(0.0)
    };

    (unique_a, unique_b, overlap, gain)
}

/// Bundle of the advanced aggregate metrics for one benchmark run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub risk_weighted_recall: f64,
    pub conservatism_index: f64,
    pub p95_latency_ms: f64,
    pub roi_ratio: f64,
    pub inference_cost_usd: f64,
}

/// Compute the full advanced-metric bundle.
pub fn compute_advanced_metrics(
    categories: &[CategoryPerformance],
    false_negatives: usize,
    false_positives: usize,
    latencies_ms: &[f64],
    total_potential_savings: f64,
    cost_per_second: f64,
) -> AdvancedMetrics {
    let avg_latency = if latencies_ms.is_empty() {
        0.0
    } else {
        latencies_ms.iter().sum::<f64>() / latencies_ms.len() as f64
    };
    let (roi_ratio, inference_cost_usd) =
        calculate_roi_ratio(total_potential_savings, avg_latency, cost_per_second);

    AdvancedMetrics {
        risk_weighted_recall: calculate_risk_weighted_recall(categories),
        conservatism_index: calculate_conservatism_index(false_negatives, false_positives),
        p95_latency_ms: calculate_p95_latency(latencies_ms),
        roi_ratio,
        inference_cost_usd,
    }
}
