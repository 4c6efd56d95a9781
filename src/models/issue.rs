//! Detected issue and analysis result model.

use serde::{Deserialize, Serialize};

use crate::utils::round2;

/// Issue classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    DuplicateCharge,
    BillingError,
    NonCoveredService,
    Overbilling,
    InsuranceIssue,
    FsaIssue,
    GenderSpecificContradiction,
    AgeInappropriateProcedure,
    AgeInappropriateScreening,
    AnatomicalContradiction,
    TemporalViolation,
    InconsistentWithHealthHistory,
    Other,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateCharge => "duplicate_charge",
            Self::BillingError => "billing_error",
            Self::NonCoveredService => "non_covered_service",
            Self::Overbilling => "overbilling",
            Self::InsuranceIssue => "insurance_issue",
            Self::FsaIssue => "fsa_issue",
            Self::GenderSpecificContradiction => "gender_specific_contradiction",
            Self::AgeInappropriateProcedure => "age_inappropriate_procedure",
            Self::AgeInappropriateScreening => "age_inappropriate_screening",
            Self::AnatomicalContradiction => "anatomical_contradiction",
            Self::TemporalViolation => "temporal_violation",
            Self::InconsistentWithHealthHistory => "inconsistent_with_health_history",
            Self::Other => "other",
        }
    }

    /// Parse a model-produced type label; anything unrecognized is `Other`.
    pub fn parse_type(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "duplicate_charge" => Self::DuplicateCharge,
            "billing_error" => Self::BillingError,
            "non_covered_service" => Self::NonCoveredService,
            "overbilling" => Self::Overbilling,
            "insurance_issue" => Self::InsuranceIssue,
            "fsa_issue" => Self::FsaIssue,
            "gender_specific_contradiction" => Self::GenderSpecificContradiction,
            "age_inappropriate_procedure" => Self::AgeInappropriateProcedure,
            "age_inappropriate_screening" => Self::AgeInappropriateScreening,
            "anatomical_contradiction" => Self::AnatomicalContradiction,
            "temporal_violation" => Self::TemporalViolation,
            "inconsistent_with_health_history" => Self::InconsistentWithHealthHistory,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an issue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSource {
    Deterministic,
    Llm,
    Ensemble,
}

impl IssueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Llm => "llm",
            Self::Ensemble => "ensemble",
        }
    }
}

/// A single detected finding, rule-based or model-produced.
///
/// Persisted with every key present; absent values serialize as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub summary: String,
    pub evidence: Option<String>,
    pub code: Option<String>,
    pub date: Option<String>,
    pub max_savings: Option<f64>,
    pub recommended_action: Option<String>,
    pub source: IssueSource,
    pub confidence: f64,
}

impl Issue {
    /// Minimal model-produced issue; callers fill in the optional fields.
    pub fn llm(issue_type: IssueType, summary: impl Into<String>) -> Self {
        Self {
            issue_type,
            summary: summary.into(),
            evidence: None,
            code: None,
            date: None,
            max_savings: None,
            recommended_action: None,
            source: IssueSource::Llm,
            confidence: 0.5,
        }
    }
}

/// Per-run metadata attached to an analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    pub provider: String,
    pub issue_count: usize,
    pub deterministic_savings: f64,
    pub llm_max_savings: f64,
    pub total_max_savings: f64,
}

/// Ordered issue list plus metadata. Created once per orchestrator run and
/// never mutated after return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub issues: Vec<Issue>,
    pub meta: AnalysisMeta,
}

impl AnalysisResult {
    /// Recompute the savings fields. `llm_max_savings` sums every
    /// non-deterministic issue; the total takes the max of the two sums so
    /// overlapping findings are not double-counted.
    pub fn finalize_savings(&mut self, deterministic_savings: f64) {
        let llm_total: f64 = self
            .issues
            .iter()
            .filter(|i| i.source != IssueSource::Deterministic)
            .filter_map(|i| i.max_savings)
            .sum();

        self.meta.deterministic_savings = round2(deterministic_savings);
        self.meta.llm_max_savings = round2(llm_total);
        self.meta.total_max_savings = round2(llm_total.max(deterministic_savings));
        self.meta.issue_count = self.issues.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(source: IssueSource, savings: Option<f64>) -> Issue {
        Issue {
            issue_type: IssueType::BillingError,
            summary: "test".into(),
            evidence: None,
            code: None,
            date: None,
            max_savings: savings,
            recommended_action: None,
            source,
            confidence: 1.0,
        }
    }

    #[test]
    fn total_savings_is_max_of_llm_and_deterministic() {
        let mut result = AnalysisResult {
            issues: vec![
                issue(IssueSource::Llm, Some(30.0)),
                issue(IssueSource::Deterministic, Some(50.0)),
            ],
            meta: AnalysisMeta::default(),
        };
        result.finalize_savings(50.0);

        assert_eq!(result.meta.llm_max_savings, 30.0);
        assert_eq!(result.meta.deterministic_savings, 50.0);
        assert_eq!(result.meta.total_max_savings, 50.0);
        assert_eq!(result.meta.issue_count, 2);
    }

    #[test]
    fn llm_savings_dominate_when_larger() {
        let mut result = AnalysisResult {
            issues: vec![issue(IssueSource::Llm, Some(120.0))],
            meta: AnalysisMeta::default(),
        };
        result.finalize_savings(40.0);
        assert_eq!(result.meta.total_max_savings, 120.0);
    }

    #[test]
    fn unknown_issue_type_parses_to_other() {
        assert_eq!(IssueType::parse_type("surprise_fee"), IssueType::Other);
        assert_eq!(
            IssueType::parse_type("Duplicate_Charge"),
            IssueType::DuplicateCharge
        );
    }

    #[test]
    fn issue_serializes_all_keys_with_nulls() {
        let value = serde_json::to_value(issue(IssueSource::Llm, None)).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "type",
            "summary",
            "evidence",
            "code",
            "date",
            "max_savings",
            "recommended_action",
            "source",
            "confidence",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert!(obj["evidence"].is_null());
    }
}
