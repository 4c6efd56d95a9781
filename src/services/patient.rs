//! Patient-level cross-document analysis.
//!
//! Builds one combined prompt from the patient profile, an optional
//! primary-care medical-history block, and every document text, then runs
//! the chosen provider twice: a comprehensive first pass over seven error
//! categories, and a targeted second pass over the commonly missed ones.
//! Issues are deduplicated across passes by procedure code. Latency covers
//! the full pair of calls.

use std::collections::HashSet;
use std::time::Instant;

use crate::models::{Issue, PatientAnalysis, PatientDocument, PatientProfile};
use crate::services::llm::AnalysisProvider;

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "None".to_string()
    } else {
        values.join(", ")
    }
}

fn patient_summary(profile: &PatientProfile) -> String {
    format!(
        "PATIENT PROFILE:\n\
         Name: {name}\n\
         ID: {id}\n\
         Age: {age} years\n\
         Sex: {sex}\n\
         Date of Birth: {dob}\n\n\
         Medical History:\n\
         - Conditions: {conditions}\n\
         - Allergies: {allergies}\n\
         - Prior Surgeries: {surgeries}\n",
        name = profile.name,
        id = profile.patient_id,
        age = profile.age,
        sex = profile.sex.as_str(),
        dob = profile.date_of_birth,
        conditions = join_or_none(&profile.conditions),
        allergies = join_or_none(&profile.allergies),
        surgeries = join_or_none(&profile.surgeries),
    )
}

fn document_block(documents: &[PatientDocument]) -> String {
    let mut block = String::new();
    for (i, doc) in documents.iter().enumerate() {
        block.push_str(&format!("\n--- DOCUMENT {} ---\n{}\n", i + 1, doc.text));
    }
    block
}

/// Comprehensive pass-1 prompt enumerating the seven error categories.
fn build_pass1_prompt(
    profile: &PatientProfile,
    documents: &[PatientDocument],
    medical_history: Option<&str>,
) -> String {
    let mut prompt = patient_summary(profile);
    prompt.push('\n');

    if let Some(history) = medical_history {
        prompt.push_str(&format!(
            "PRIMARY CARE PHYSICIAN MEDICAL HISTORY:\n{history}\n\n"
        ));
    }

    prompt.push_str("DOCUMENTS TO ANALYZE:\n-------------------\n");
    prompt.push_str(&document_block(documents));
    prompt.push_str(
        r#"
-------------------

INSTRUCTIONS FOR ANALYSIS:
Perform a comprehensive multi-pass analysis of ALL documents for this
patient. Use the patient's medical history, demographics, and
cross-document patterns.

PASS 1 - SYSTEMATIC ERROR DETECTION:
Analyze each document carefully using chain-of-thought reasoning for the
following error categories:

1. ANATOMICAL CONTRADICTION (Domain Knowledge Required):
   - Procedures billed for organs/body parts the patient does NOT have
   - Check medical history -> identify removed/absent organs -> flag
     procedures on those organs

2. TEMPORAL VIOLATION (Timeline Analysis):
   - Procedures that violate medical timelines or logical sequencing
   - Extract all dates -> order procedures chronologically -> check for
     impossible sequences or premature repeat procedures

3. GENDER-SPECIFIC CONTRADICTION (Anatomical):
   - Procedures for anatomy the patient's biological sex does not have
   - Example: male patient billed for pregnancy test (CPT 81025),
     Pap smear (CPT 88150), or mammogram (CPT 77067)

4. AGE-INAPPROPRIATE PROCEDURE (Clinical Guidelines):
   - Procedures outside recommended age ranges per clinical guidelines
   - Example: 8-year-old billed for screening colonoscopy (45+)

5. PROCEDURE INCONSISTENT WITH HEALTH HISTORY (Medical Appropriateness):
   - Procedures that make no medical sense given documented health status
   - Example: healthy patient billed for continuous glucose monitoring

6. DUPLICATE CHARGES (Cross-Document):
   - Same procedure billed multiple times across documents for same date
   - Build a procedure inventory -> group by CPT + date -> flag duplicates

7. OTHER BILLING INCONSISTENCIES:
   - Upcoding, unbundling, medical necessity issues, incorrect modifiers

CHAIN-OF-THOUGHT REASONING REQUIRED:
For each potential issue, show your reasoning: what you noticed
(evidence), why it is problematic (medical knowledge), the error
category, and the specific CPT code involved.

NOW ANALYZE: Report ALL issues found with specific CPT codes, clear
evidence, and error type classification. Return a JSON array of issues.
"#,
    );

    prompt
}

/// Targeted pass-2 prompt re-listing the patient summary and the
/// commonly-missed categories.
fn build_pass2_prompt(
    profile: &PatientProfile,
    documents: &[PatientDocument],
    pass1_issue_count: usize,
) -> String {
    let mut prompt = format!(
        r#"PASS 2 - TARGETED VERIFICATION FOR PATIENT {id}:

Patient Summary:
- Age: {age} years, Sex: {sex}
- Surgeries: {surgeries}
- Conditions: {conditions}

Previously detected {count} issue(s) in PASS 1.

Now perform TARGETED checks for these commonly-missed error types:

1. ANATOMICAL CONTRADICTIONS:
   - If Prior Surgeries contains amputation, removal, -ectomy terms,
     scan ALL documents for CPT codes touching those removed organs.

2. TEMPORAL VIOLATIONS:
   - Extract ALL dates; check for procedures on removed organs AFTER the
     removal date, and duplicate screenings within one year.

3. HEALTH HISTORY INCONSISTENCIES:
   - If the conditions list is empty or minimal, look for
     disease-specific procedures (diabetes, cardiac, oncology) without a
     corresponding diagnosis.

4. AGE/SEX MISMATCHES:
   - If age < 18: flag colonoscopy, prostate screening, mammography.
   - If sex = Male: flag pregnancy, Pap smear, mammogram, ovarian or
     uterine procedures. If sex = Female: flag prostate procedures.

DOCUMENTS TO RE-EXAMINE:
"#,
        id = profile.patient_id,
        age = profile.age,
        sex = profile.sex.as_str(),
        surgeries = join_or_none(&profile.surgeries),
        conditions = join_or_none(&profile.conditions),
        count = pass1_issue_count,
    );

    prompt.push_str(&document_block(documents));
    prompt.push_str(
        "\nReport ONLY issues NOT found in PASS 1. Focus on the 4 categories \
         above. Return a JSON array of issues with specific CPT codes.\n",
    );

    prompt
}

/// Analyze a patient's document bundle with cross-document context.
pub async fn analyze_patient(
    provider: &dyn AnalysisProvider,
    profile: &PatientProfile,
    documents: &[PatientDocument],
    medical_history: Option<&str>,
) -> PatientAnalysis {
    let start = Instant::now();

    let pass1_prompt = build_pass1_prompt(profile, documents, medical_history);
    let pass1 = match provider.analyze_document(&pass1_prompt, None).await {
        Ok(result) => result,
        Err(e) => {
            return PatientAnalysis {
                detected_issues: vec![],
                latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                error: Some(e.to_string()),
            };
        },
    };

    let mut detected: Vec<Issue> = pass1.issues;
    let mut seen_codes: HashSet<String> = detected.iter().filter_map(|i| i.code.clone()).collect();

    let pass2_prompt = build_pass2_prompt(profile, documents, detected.len());
    match provider.analyze_document(&pass2_prompt, None).await {
        Ok(pass2) => {
            for issue in pass2.issues {
                match &issue.code {
                    Some(code) if seen_codes.contains(code) => continue,
                    Some(code) => {
                        seen_codes.insert(code.clone());
                        detected.push(issue);
                    },
                    None => detected.push(issue),
                }
            }
        },
        Err(e) => {
            return PatientAnalysis {
                detected_issues: vec![],
                latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                error: Some(e.to_string()),
            };
        },
    }

    PatientAnalysis {
        detected_issues: detected,
        latency_ms: start.elapsed().as_secs_f64() * 1000.0,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::{AnalysisResult, DocumentFacts, IssueType, Sex};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn profile() -> PatientProfile {
        PatientProfile {
            patient_id: "patient_001".into(),
            name: "John Sample".into(),
            age: 30,
            sex: Sex::M,
            date_of_birth: "1995-06-02".into(),
            conditions: vec![],
            allergies: vec![],
            surgeries: vec!["appendectomy (2019)".into()],
        }
    }

    fn documents() -> Vec<PatientDocument> {
        vec![PatientDocument {
            document_id: "doc-1".into(),
            text: "CPT 76805 obstetric ultrasound $400".into(),
        }]
    }

    /// Replays one canned analysis result per call.
    struct ScriptedProvider {
        results: Mutex<Vec<Result<AnalysisResult, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn with(results: Vec<Result<AnalysisResult, String>>) -> Self {
            Self {
                results: Mutex::new(results),
                prompts: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl AnalysisProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> bool {
            true
        }

        async fn analyze_document(
            &self,
            raw_text: &str,
            _facts: Option<&DocumentFacts>,
        ) -> Result<AnalysisResult, ProviderError> {
            self.prompts.lock().unwrap().push(raw_text.to_string());
            match self.results.lock().unwrap().remove(0) {
                Ok(result) => Ok(result),
                Err(e) => Err(ProviderError::Api(e)),
            }
        }

        async fn run_prompt(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok(String::new())
        }
    }

    fn issue_with_code(code: &str) -> Issue {
        Issue {
            code: Some(code.to_string()),
            ..Issue::llm(IssueType::GenderSpecificContradiction, "obstetric CPT")
        }
    }

    #[tokio::test]
    async fn merges_passes_and_dedupes_by_code() {
        let pass1 = AnalysisResult {
            issues: vec![issue_with_code("76805")],
            meta: Default::default(),
        };
        let pass2 = AnalysisResult {
            issues: vec![issue_with_code("76805"), issue_with_code("81025")],
            meta: Default::default(),
        };
        let provider = ScriptedProvider::with(vec![Ok(pass1), Ok(pass2)]);

        let analysis = analyze_patient(&provider, &profile(), &documents(), None).await;

        assert!(analysis.error.is_none());
        let codes: Vec<_> = analysis
            .detected_issues
            .iter()
            .filter_map(|i| i.code.as_deref())
            .collect();
        assert_eq!(codes, vec!["76805", "81025"]);
        assert!(analysis.latency_ms >= 0.0);
    }

    #[tokio::test]
    async fn both_prompts_carry_profile_and_documents() {
        let provider = ScriptedProvider::with(vec![
            Ok(AnalysisResult::default()),
            Ok(AnalysisResult::default()),
        ]);

        analyze_patient(
            &provider,
            &profile(),
            &documents(),
            Some("seen for annual physical, no chronic conditions"),
        )
        .await;

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Sex: M"));
        assert!(prompts[0].contains("appendectomy"));
        assert!(prompts[0].contains("76805"));
        assert!(prompts[0].contains("PRIMARY CARE PHYSICIAN MEDICAL HISTORY"));
        assert!(prompts[1].contains("PASS 2"));
        assert!(prompts[1].contains("76805"));
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_error_with_latency() {
        let provider = ScriptedProvider::with(vec![Err("backend down".into())]);
        let analysis = analyze_patient(&provider, &profile(), &documents(), None).await;
        assert!(analysis.detected_issues.is_empty());
        assert!(analysis.error.as_deref().unwrap().contains("backend down"));
    }

    #[tokio::test]
    async fn heuristic_provider_detects_obstetric_cpt_for_male_patient() {
        use crate::services::llm::LocalHeuristicProvider;

        let provider = LocalHeuristicProvider::new();
        let analysis = analyze_patient(&provider, &profile(), &documents(), None).await;

        assert!(analysis.error.is_none());
        assert!(analysis
            .detected_issues
            .iter()
            .any(|i| i.issue_type == IssueType::GenderSpecificContradiction
                && i.code.as_deref() == Some("76805")));
    }
}
