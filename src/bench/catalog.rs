//! Benchmark case catalog.
//!
//! Patient cases live as `patient_*.json` files: a profile, a bundle of
//! document texts, an optional primary-care history, and the annotated
//! ground-truth catalog of expected issues.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{PatientDocument, PatientProfile};

/// Eight-patient subset exercising the strongest domain-knowledge signals
/// (sex mismatches, pediatric screenings, post-surgical rebilling).
pub const HIGH_SIGNAL_SUBSET: [&str; 8] = [
    "patient_001", // male with obstetric ultrasound
    "patient_002", // male with Pap smear
    "patient_006", // 15yo with screening mammogram
    "patient_011", // 8yo with screening colonoscopy
    "patient_031", // right leg amputation + right knee billing
    "patient_032", // appendectomy + appendix removal rebilling
    "patient_033", // bilateral mastectomy + breast procedure billing
    "patient_035", // hysterectomy + uterine procedure billing
];

/// Annotated expected issue in the ground-truth catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedIssue {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub severity: String,
    pub description: String,
    pub requires_domain_knowledge: bool,
    #[serde(default)]
    pub cpt_code: Option<String>,
}

/// One benchmark case: a patient, their documents, and the ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientCase {
    pub profile: PatientProfile,
    pub documents: Vec<PatientDocument>,
    #[serde(default)]
    pub medical_history: Option<String>,
    pub expected_issues: Vec<ExpectedIssue>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read benchmark cases from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse benchmark case {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Load every `patient_*.json` case from the directory, sorted by file
/// name. `subset = Some("high_signal")` restricts to the eight-patient
/// high-signal list.
pub fn load_cases(dir: &Path, subset: Option<&str>) -> Result<Vec<PatientCase>, CatalogError> {
    let entries = fs::read_dir(dir).map_err(|source| CatalogError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("patient_") && n.ends_with(".json"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut cases = Vec::new();
    for path in paths {
        let content = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let case: PatientCase =
            serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        if subset == Some("high_signal")
            && !HIGH_SIGNAL_SUBSET.contains(&case.profile.patient_id.as_str())
        {
            continue;
        }
        cases.push(case);
    }

    Ok(cases)
}
