//! Patient-level benchmark suite runner.
//!
//! Runs the cross-document analyzer over every case for one model,
//! evaluates detections against the ground truth, and aggregates suite
//! metrics including the advanced risk/latency/ROI bundle.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::catalog::PatientCase;
use super::evaluator::{
    aggregate_domain_breakdown, aggregate_parent_categories, evaluate_detection,
    AggregatedCategory, ParentCategory, PatientBenchmarkResult,
};
use super::metrics::{compute_advanced_metrics, AdvancedMetrics, CategoryPerformance};
use crate::services::llm::AnalysisProvider;
use crate::services::patient::analyze_patient;
use crate::utils::round2;

/// Aggregated metrics across all patients for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientBenchmarkMetrics {
    pub model_name: String,
    pub total_patients: usize,
    pub successful_analyses: usize,
    pub avg_precision: f64,
    pub avg_recall: f64,
    pub avg_f1_score: f64,
    /// Fraction of domain-knowledge issues detected, from suite totals.
    pub domain_knowledge_detection_rate: f64,
    pub avg_latency_ms: f64,
    pub total_potential_savings: f64,
    pub domain_breakdown: BTreeMap<String, AggregatedCategory>,
    pub aggregated_categories: BTreeMap<String, ParentCategory>,
    pub domain_recall: f64,
    pub generic_recall: f64,
    pub cross_document_recall: f64,
    pub advanced: AdvancedMetrics,
    pub individual_results: Vec<PatientBenchmarkResult>,
    pub generated_at: String,
}

/// Runs cross-document patient-level benchmarks for one model.
pub struct BenchmarkRunner {
    model_label: String,
    provider: Arc<dyn AnalysisProvider>,
    cost_per_second: f64,
}

impl BenchmarkRunner {
    pub fn new(
        model_label: impl Into<String>,
        provider: Arc<dyn AnalysisProvider>,
        cost_per_second: f64,
    ) -> Self {
        Self {
            model_label: model_label.into(),
            provider,
            cost_per_second,
        }
    }

    /// Run the suite. Returns `None` when there are no cases to run.
    pub async fn run(&self, cases: &[PatientCase]) -> Option<PatientBenchmarkMetrics> {
        if cases.is_empty() {
            tracing::warn!("no patient cases found");
            return None;
        }

        tracing::info!(
            model = %self.model_label,
            cases = cases.len(),
            "running patient-level benchmarks"
        );

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let analysis = analyze_patient(
                self.provider.as_ref(),
                &case.profile,
                &case.documents,
                case.medical_history.as_deref(),
            )
            .await;

            let evaluation = evaluate_detection(&case.expected_issues, &analysis.detected_issues);
            if let Some(error) = &analysis.error {
                tracing::warn!(
                    patient = %case.profile.patient_id,
                    "patient analysis failed: {error}"
                );
            } else {
                tracing::info!(
                    patient = %case.profile.patient_id,
                    tp = evaluation.true_positives,
                    fp = evaluation.false_positives,
                    fn_ = evaluation.false_negatives,
                    latency_ms = analysis.latency_ms as u64,
                    "patient evaluated"
                );
            }

            results.push(PatientBenchmarkResult {
                patient_id: case.profile.patient_id.clone(),
                patient_name: case.profile.name.clone(),
                model_name: self.model_label.clone(),
                documents_analyzed: case.documents.len(),
                analysis_latency_ms: analysis.latency_ms,
                expected_issue_count: case.expected_issues.len(),
                detected_issues: analysis.detected_issues,
                true_positives: evaluation.true_positives,
                false_positives: evaluation.false_positives,
                false_negatives: evaluation.false_negatives,
                domain_knowledge_score: evaluation.domain_knowledge_score,
                domain_true_positives: evaluation.domain_true_positives,
                domain_expected: evaluation.domain_expected,
                error_message: analysis.error,
                domain_breakdown: evaluation.domain_breakdown,
                domain_recall: evaluation.domain_recall,
                generic_recall: evaluation.generic_recall,
                cross_document_recall: evaluation.cross_document_recall,
            });
        }

        Some(self.aggregate(cases, results))
    }

    fn aggregate(
        &self,
        cases: &[PatientCase],
        results: Vec<PatientBenchmarkResult>,
    ) -> PatientBenchmarkMetrics {
        let successful: Vec<&PatientBenchmarkResult> = results
            .iter()
            .filter(|r| r.error_message.is_none())
            .collect();

        let mean = |values: Vec<f64>| -> f64 {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };

        let precision_of = |r: &PatientBenchmarkResult| {
            let denom = r.true_positives + r.false_positives;
            if denom > 0 {
                r.true_positives as f64 / denom as f64
            } else {
                0.0
            }
        };
        let recall_of = |r: &PatientBenchmarkResult| {
            if r.expected_issue_count > 0 {
                r.true_positives as f64 / r.expected_issue_count as f64
            } else {
                0.0
            }
        };

        let avg_precision = mean(successful.iter().map(|r| precision_of(r)).collect());
        let avg_recall = mean(successful.iter().map(|r| recall_of(r)).collect());
        let avg_f1_score = mean(
            successful
                .iter()
                .map(|r| {
                    let p = precision_of(r);
                    let rec = recall_of(r);
                    if p + rec > 0.0 {
                        2.0 * p * rec / (p + rec)
                    } else {
                        0.0
                    }
                })
                .collect(),
        );

        // Suite-level rates from totals, not averaged per-patient rates.
        let domain_expected: usize = cases
            .iter()
            .map(|c| {
                c.expected_issues
                    .iter()
                    .filter(|e| e.requires_domain_knowledge)
                    .count()
            })
            .sum();
        let domain_detected: usize = successful.iter().map(|r| r.domain_true_positives).sum();
        let domain_rate = if domain_expected > 0 {
            domain_detected as f64 / domain_expected as f64
        } else {
            0.0
        };

        let latencies: Vec<f64> = successful.iter().map(|r| r.analysis_latency_ms).collect();
        let avg_latency_ms = mean(latencies.clone());

        let total_potential_savings: f64 = results
            .iter()
            .flat_map(|r| r.detected_issues.iter())
            .filter_map(|i| i.max_savings)
            .sum();

        let domain_breakdown = aggregate_domain_breakdown(&results);
        let aggregated_categories = aggregate_parent_categories(&domain_breakdown);

        let categories: Vec<CategoryPerformance> = domain_breakdown
            .iter()
            .map(|(category, agg)| {
                CategoryPerformance::new(category.clone(), agg.total_cases, agg.total_detected)
            })
            .collect();
        let false_negatives: usize = results.iter().map(|r| r.false_negatives).sum();
        let false_positives: usize = results.iter().map(|r| r.false_positives).sum();

        let advanced = compute_advanced_metrics(
            &categories,
            false_negatives,
            false_positives,
            &latencies,
            total_potential_savings,
            self.cost_per_second,
        );

        let total_tp: usize = successful.iter().map(|r| r.true_positives).sum();
        let generic_expected: usize = cases
            .iter()
            .map(|c| c.expected_issues.len())
            .sum::<usize>()
            .saturating_sub(domain_expected);
        let generic_recall = if generic_expected > 0 {
            (total_tp.saturating_sub(domain_detected)) as f64 / generic_expected as f64
        } else {
            0.0
        };

        PatientBenchmarkMetrics {
            model_name: self.model_label.clone(),
            total_patients: results.len(),
            successful_analyses: successful.len(),
            avg_precision: round2(avg_precision),
            avg_recall: round2(avg_recall),
            avg_f1_score: round2(avg_f1_score),
            domain_knowledge_detection_rate: round2(domain_rate),
            avg_latency_ms: round2(avg_latency_ms),
            total_potential_savings: round2(total_potential_savings),
            domain_breakdown,
            aggregated_categories,
            domain_recall: round2(domain_rate),
            generic_recall: round2(generic_recall),
            cross_document_recall: round2(domain_rate),
            advanced,
            individual_results: results,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Render a human-readable suite summary for the CLI.
pub fn render_summary(metrics: &PatientBenchmarkMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Results for {}\n{}\n",
        metrics.model_name,
        "=".repeat(70)
    ));
    out.push_str(&format!(
        "Patients: {} ({} successful)\n",
        metrics.total_patients, metrics.successful_analyses
    ));
    out.push_str(&format!(
        "Precision: {:.2}  Recall: {:.2}  F1: {:.2}\n",
        metrics.avg_precision, metrics.avg_recall, metrics.avg_f1_score
    ));
    out.push_str(&format!(
        "Domain-knowledge detection rate: {:.2}\n",
        metrics.domain_knowledge_detection_rate
    ));
    out.push_str(&format!(
        "Risk-weighted recall: {:.3}  Conservatism index: {:.2}\n",
        metrics.advanced.risk_weighted_recall, metrics.advanced.conservatism_index
    ));
    out.push_str(&format!(
        "Avg latency: {:.0} ms  P95: {:.0} ms  ROI: {:.0}\n",
        metrics.avg_latency_ms, metrics.advanced.p95_latency_ms, metrics.advanced.roi_ratio
    ));
    out.push_str(&format!(
        "Potential savings: ${:.2}\n",
        metrics.total_potential_savings
    ));

    if !metrics.domain_breakdown.is_empty() {
        out.push_str("\nCategory breakdown:\n");
        for (category, agg) in &metrics.domain_breakdown {
            out.push_str(&format!(
                "  {category}: {}/{} (recall {:.2})\n",
                agg.total_detected, agg.total_cases, agg.recall
            ));
        }
    }
    for (parent, agg) in &metrics.aggregated_categories {
        out.push_str(&format!(
            "  {parent} (parent): {}/{} (recall {:.2})\n",
            agg.total_detected, agg.total_cases, agg.recall
        ));
    }

    out
}
