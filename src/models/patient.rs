//! Patient profile and patient-level analysis output.

use serde::{Deserialize, Serialize};

use super::issue::Issue;

/// Biological sex as recorded on the patient profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
    #[serde(rename = "other")]
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M => "M",
            Self::F => "F",
            Self::Other => "other",
        }
    }
}

/// Patient demographics and medical history, supplied by the caller for
/// patient-level runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient_id: String,
    pub name: String,
    pub age: u32,
    pub sex: Sex,
    pub date_of_birth: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default, alias = "prior_surgical_history")]
    pub surgeries: Vec<String>,
}

/// One document in a patient bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDocument {
    pub document_id: String,
    #[serde(alias = "content")]
    pub text: String,
}

/// Output of the cross-document patient analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientAnalysis {
    pub detected_issues: Vec<Issue>,
    pub latency_ms: f64,
    pub error: Option<String>,
}
