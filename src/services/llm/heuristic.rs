//! Local heuristic analysis provider.
//!
//! Offline fallback used when no model key is available and as the
//! `baseline` model in benchmarks. Scans the document bundle for procedure
//! codes that contradict the patient block embedded in the text (sex, age,
//! prior surgeries) and runs the deterministic rule engine when a fact map
//! is supplied. Never touches the network.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::provider::AnalysisProvider;
use crate::error::ProviderError;
use crate::models::{AnalysisResult, DocumentFacts, Issue, IssueSource, IssueType};
use crate::services::rules;
use crate::utils::round2;

pub const HEURISTIC_PROVIDER_NAME: &str = "heuristic";

/// Procedures limited to female anatomy.
const FEMALE_ONLY_CPT: [(&str, &str); 6] = [
    ("81025", "pregnancy test"),
    ("88150", "Pap smear"),
    ("77067", "screening mammogram"),
    ("76805", "obstetric ultrasound"),
    ("58150", "hysterectomy"),
    ("59400", "routine obstetric care"),
];

/// Procedures limited to male anatomy.
const MALE_ONLY_CPT: [(&str, &str); 3] = [
    ("G0103", "prostate cancer screening"),
    ("55700", "prostate biopsy"),
    ("55250", "vasectomy"),
];

/// Screenings with a guideline minimum age.
const MIN_AGE_SCREENINGS: [(&str, &str, u32); 3] = [
    ("45378", "screening colonoscopy", 45),
    ("77067", "screening mammogram", 40),
    ("G0103", "prostate cancer screening", 50),
];

/// Pediatric procedures with a guideline maximum age.
const MAX_AGE_PROCEDURES: [(&str, &str, u32); 2] = [
    ("90460", "pediatric immunization administration", 18),
    ("99392", "well-child visit", 18),
];

/// Prior-surgery keywords and the procedure codes they contradict.
const SURGICAL_CONTRADICTIONS: [(&str, &str, &[&str]); 4] = [
    ("appendectomy", "appendix", &["44970", "44950"]),
    ("hysterectomy", "uterus", &["58150", "58571", "58558"]),
    ("mastectomy", "breast", &["19303", "19125"]),
    ("amputation", "amputated limb", &["27447", "27486"]),
];

static SEX_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*sex:\s*(m|male|f|female)\b").unwrap());
static AGE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*age:\s*(\d{1,3})\b").unwrap());
static SURGERY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^.*prior surgeries:\s*(.+)$").unwrap());

pub struct LocalHeuristicProvider;

impl LocalHeuristicProvider {
    pub fn new() -> Self {
        Self
    }

    fn contains_code(text: &str, code: &str) -> bool {
        Regex::new(&format!(r"\b{}\b", regex::escape(code)))
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }

    fn scan_issues(raw_text: &str) -> Vec<Issue> {
        let mut issues = Vec::new();

        let sex = SEX_LINE
            .captures(raw_text)
            .map(|c| c[1].to_lowercase().starts_with('m'));
        let age: Option<u32> = AGE_LINE.captures(raw_text).and_then(|c| c[1].parse().ok());
        let surgeries = SURGERY_LINE
            .captures(raw_text)
            .map(|c| c[1].to_lowercase())
            .unwrap_or_default();

        if let Some(is_male) = sex {
            let mismatched: &[(&str, &str)] = if is_male {
                &FEMALE_ONLY_CPT
            } else {
                &MALE_ONLY_CPT
            };
            for (code, label) in mismatched {
                if Self::contains_code(raw_text, code) {
                    issues.push(Issue {
                        issue_type: IssueType::GenderSpecificContradiction,
                        summary: format!("{label} billed for a {} patient", if is_male { "male" } else { "female" }),
                        evidence: Some(format!(
                            "CPT {code} ({label}) conflicts with the recorded patient sex"
                        )),
                        code: Some(code.to_string()),
                        date: None,
                        max_savings: None,
                        recommended_action: Some(
                            "Dispute the charge with the billing provider.".to_string(),
                        ),
                        source: IssueSource::Llm,
                        confidence: 0.8,
                    });
                }
            }
        }

        if let Some(age) = age {
            for (code, label, min_age) in MIN_AGE_SCREENINGS {
                if age < min_age && Self::contains_code(raw_text, code) {
                    issues.push(Issue {
                        issue_type: IssueType::AgeInappropriateScreening,
                        summary: format!("{label} billed for a {age}-year-old"),
                        evidence: Some(format!(
                            "CPT {code} ({label}) is recommended from age {min_age}"
                        )),
                        code: Some(code.to_string()),
                        date: None,
                        max_savings: None,
                        recommended_action: Some(
                            "Ask the provider for the medical indication.".to_string(),
                        ),
                        source: IssueSource::Llm,
                        confidence: 0.8,
                    });
                }
            }
            for (code, label, max_age) in MAX_AGE_PROCEDURES {
                if age > max_age && Self::contains_code(raw_text, code) {
                    issues.push(Issue {
                        issue_type: IssueType::AgeInappropriateProcedure,
                        summary: format!("{label} billed for a {age}-year-old"),
                        evidence: Some(format!(
                            "CPT {code} ({label}) is a pediatric service"
                        )),
                        code: Some(code.to_string()),
                        date: None,
                        max_savings: None,
                        recommended_action: Some(
                            "Ask the provider for the medical indication.".to_string(),
                        ),
                        source: IssueSource::Llm,
                        confidence: 0.8,
                    });
                }
            }
        }

        if !surgeries.is_empty() {
            for (keyword, organ, codes) in SURGICAL_CONTRADICTIONS {
                if !surgeries.contains(keyword) {
                    continue;
                }
                for code in codes {
                    if Self::contains_code(raw_text, code) {
                        issues.push(Issue {
                            issue_type: IssueType::AnatomicalContradiction,
                            summary: format!("Procedure billed on {organ} after {keyword}"),
                            evidence: Some(format!(
                                "CPT {code} targets the {organ}, but the history lists a prior {keyword}"
                            )),
                            code: Some(code.to_string()),
                            date: None,
                            max_savings: None,
                            recommended_action: Some(
                                "Request an itemized review against the surgical history."
                                    .to_string(),
                            ),
                            source: IssueSource::Llm,
                            confidence: 0.8,
                        });
                    }
                }
            }
        }

        issues
    }
}

impl Default for LocalHeuristicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisProvider for LocalHeuristicProvider {
    fn name(&self) -> &str {
        HEURISTIC_PROVIDER_NAME
    }

    fn supports_facts(&self) -> bool {
        true
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn analyze_document(
        &self,
        raw_text: &str,
        facts: Option<&DocumentFacts>,
    ) -> Result<AnalysisResult, ProviderError> {
        let mut issues = Self::scan_issues(raw_text);
        if let Some(facts) = facts {
            issues.extend(rules::deterministic_issues(facts));
        }

        let total: f64 = issues.iter().filter_map(|i| i.max_savings).sum();
        let mut result = AnalysisResult {
            issues,
            meta: Default::default(),
        };
        result.meta.provider = self.name().to_string();
        result.meta.issue_count = result.issues.len();
        result.meta.total_max_savings = round2(total);
        Ok(result)
    }

    async fn run_prompt(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported(
            "heuristic provider cannot execute raw prompts".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_obstetric_cpt_for_male_patient() {
        let text = "PATIENT PROFILE:\nSex: M\nAge: 30 years\n\nCPT 76805 obstetric ultrasound $400";
        let provider = LocalHeuristicProvider::new();
        let result = provider.analyze_document(text, None).await.unwrap();

        let gender_issues: Vec<_> = result
            .issues
            .iter()
            .filter(|i| i.issue_type == IssueType::GenderSpecificContradiction)
            .collect();
        assert_eq!(gender_issues.len(), 1);
        assert_eq!(gender_issues[0].code.as_deref(), Some("76805"));
    }

    #[tokio::test]
    async fn flags_underage_screening() {
        let text = "Age: 8 years\nSex: F\nCPT 45378 screening colonoscopy";
        let provider = LocalHeuristicProvider::new();
        let result = provider.analyze_document(text, None).await.unwrap();
        assert!(result
            .issues
            .iter()
            .any(|i| i.issue_type == IssueType::AgeInappropriateScreening
                && i.code.as_deref() == Some("45378")));
    }

    #[tokio::test]
    async fn flags_procedure_on_removed_organ() {
        let text = "Age: 61 years\nSex: F\nPrior Surgeries: appendectomy (2019)\n\nCPT 44970 laparoscopic appendectomy";
        let provider = LocalHeuristicProvider::new();
        let result = provider.analyze_document(text, None).await.unwrap();
        assert!(result
            .issues
            .iter()
            .any(|i| i.issue_type == IssueType::AnatomicalContradiction
                && i.code.as_deref() == Some("44970")));
    }

    #[tokio::test]
    async fn quiet_on_consistent_documents() {
        let text = "Age: 50 years\nSex: F\nCPT 99213 office visit $120";
        let provider = LocalHeuristicProvider::new();
        let result = provider.analyze_document(text, None).await.unwrap();
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn runs_deterministic_rules_when_facts_supplied() {
        use crate::models::MedicalLineItem;

        let mut facts = DocumentFacts::default();
        facts.medical_line_items = Some(vec![
            MedicalLineItem {
                date_of_service: Some("2024-01-15".into()),
                cpt_code: Some("99213".into()),
                patient_responsibility: Some(50.0),
                ..Default::default()
            },
            MedicalLineItem {
                date_of_service: Some("2024-01-15".into()),
                cpt_code: Some("99213".into()),
                patient_responsibility: Some(50.0),
                ..Default::default()
            },
        ]);

        let provider = LocalHeuristicProvider::new();
        let result = provider
            .analyze_document("plain bill text", Some(&facts))
            .await
            .unwrap();
        assert!(result
            .issues
            .iter()
            .any(|i| i.issue_type == IssueType::DuplicateCharge
                && i.source == IssueSource::Deterministic));
    }
}
