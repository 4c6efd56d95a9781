//! Workflow log — the per-run record of every decision the pipeline takes.
//!
//! The log is built up through `WorkflowLogBuilder` as immutable per-phase
//! records and sealed into a final `WorkflowLog` when the run returns.
//! Progress callbacks receive snapshots, never a live reference. After
//! sealing the log is opaque to downstream consumers (debugging and UI
//! progress rendering only).
//!
//! Schema note: phase-2 failures are recorded under per-document-type error
//! keys (`receipt_extraction_error`, `medical_extraction_error`,
//! `dental_extraction_error`, `insurance_extraction_error`,
//! `fsa_extraction_error`) rather than a single discriminated key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::facts::DocumentFacts;
use super::issue::AnalysisResult;
use crate::services::classifier::{Classification, PreFacts};

/// Progress checkpoint tags passed to the caller's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseTag {
    PreExtractionActive,
    ExtractionActive,
    LineItemsActive,
    AnalysisActive,
    Complete,
}

impl PhaseTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreExtractionActive => "pre_extraction_active",
            Self::ExtractionActive => "extraction_active",
            Self::LineItemsActive => "line_items_active",
            Self::AnalysisActive => "analysis_active",
            Self::Complete => "complete",
        }
    }
}

/// Which phase-2 line-item family a count or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineItemKind {
    Receipt,
    Medical,
    Dental,
    Insurance,
    Fsa,
}

/// Terminal status for unsuccessful runs. Successful logs omit the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Failed,
}

/// Analyzer invocation mode recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisMode {
    #[serde(rename = "facts+text")]
    FactsAndText,
    #[serde(rename = "text_only")]
    TextOnly,
}

/// Analyzer fallback decision, recorded only when the requested provider
/// was missing from the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackUsed {
    pub requested: String,
    pub used: String,
}

/// Classification and routing decisions taken before extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreExtractionRecord {
    pub classification: Option<Classification>,
    pub facts: Option<PreFacts>,
    pub extractor_selected: Option<String>,
    pub extractor_reason: Option<String>,
}

/// Extraction outputs, phase-2 item counts, and per-phase error strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub extractor: Option<String>,
    pub facts: Option<DocumentFacts>,
    pub fact_count: Option<usize>,

    pub receipt_item_count: Option<usize>,
    pub medical_item_count: Option<usize>,
    pub dental_item_count: Option<usize>,
    pub insurance_item_count: Option<usize>,
    pub fsa_item_count: Option<usize>,

    pub receipt_extraction_error: Option<String>,
    pub medical_extraction_error: Option<String>,
    pub dental_extraction_error: Option<String>,
    pub insurance_extraction_error: Option<String>,
    pub fsa_extraction_error: Option<String>,
}

/// Analyzer selection and outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub analyzer: Option<String>,
    pub mode: Option<AnalysisMode>,
    pub fallback_used: Option<FallbackUsed>,
    pub result: Option<AnalysisResult>,
}

/// One log per orchestrator run; immutable after return.
///
/// A successful run serializes exactly the top-level keys
/// `{workflow_id, timestamp, pre_extraction, extraction, analysis}`;
/// `status` appears only on failure and `cancelled` only on cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowLog {
    pub workflow_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub pre_extraction: PreExtractionRecord,
    pub extraction: ExtractionRecord,
    pub analysis: AnalysisRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

/// Accumulates per-phase records during a run and seals them on return.
#[derive(Debug)]
pub struct WorkflowLogBuilder {
    log: WorkflowLog,
}

impl WorkflowLogBuilder {
    pub fn new() -> Self {
        Self {
            log: WorkflowLog {
                workflow_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                pre_extraction: PreExtractionRecord::default(),
                extraction: ExtractionRecord::default(),
                analysis: AnalysisRecord::default(),
                status: None,
                cancelled: false,
            },
        }
    }

    pub fn workflow_id(&self) -> Uuid {
        self.log.workflow_id
    }

    pub fn set_classification(&mut self, classification: Classification) {
        self.log.pre_extraction.classification = Some(classification);
    }

    pub fn set_pre_facts(&mut self, pre_facts: PreFacts) {
        self.log.pre_extraction.facts = Some(pre_facts);
    }

    pub fn set_extractor_selection(&mut self, extractor: &str, reason: &str) {
        self.log.pre_extraction.extractor_selected = Some(extractor.to_string());
        self.log.pre_extraction.extractor_reason = Some(reason.to_string());
    }

    pub fn set_extraction(&mut self, extractor: &str, facts: &DocumentFacts) {
        self.log.extraction.extractor = Some(extractor.to_string());
        self.log.extraction.facts = Some(facts.clone());
        self.log.extraction.fact_count = Some(facts.fact_count());
    }

    /// Refresh the logged fact map after phase-2 attached line items.
    pub fn update_facts(&mut self, facts: &DocumentFacts) {
        self.log.extraction.facts = Some(facts.clone());
    }

    pub fn set_item_count(&mut self, kind: LineItemKind, count: usize) {
        let slot = match kind {
            LineItemKind::Receipt => &mut self.log.extraction.receipt_item_count,
            LineItemKind::Medical => &mut self.log.extraction.medical_item_count,
            LineItemKind::Dental => &mut self.log.extraction.dental_item_count,
            LineItemKind::Insurance => &mut self.log.extraction.insurance_item_count,
            LineItemKind::Fsa => &mut self.log.extraction.fsa_item_count,
        };
        *slot = Some(count);
    }

    pub fn set_phase2_error(&mut self, kind: LineItemKind, error: String) {
        let slot = match kind {
            LineItemKind::Receipt => &mut self.log.extraction.receipt_extraction_error,
            LineItemKind::Medical => &mut self.log.extraction.medical_extraction_error,
            LineItemKind::Dental => &mut self.log.extraction.dental_extraction_error,
            LineItemKind::Insurance => &mut self.log.extraction.insurance_extraction_error,
            LineItemKind::Fsa => &mut self.log.extraction.fsa_extraction_error,
        };
        *slot = Some(error);
    }

    pub fn set_analyzer(&mut self, analyzer: &str) {
        self.log.analysis.analyzer = Some(analyzer.to_string());
    }

    pub fn set_fallback(&mut self, requested: &str, used: &str) {
        self.log.analysis.fallback_used = Some(FallbackUsed {
            requested: requested.to_string(),
            used: used.to_string(),
        });
    }

    pub fn set_mode(&mut self, mode: AnalysisMode) {
        self.log.analysis.mode = Some(mode);
    }

    pub fn set_result(&mut self, result: &AnalysisResult) {
        self.log.analysis.result = Some(result.clone());
    }

    /// Snapshot for a progress callback; the builder keeps ownership.
    pub fn snapshot(&self) -> WorkflowLog {
        self.log.clone()
    }

    pub fn seal(self) -> WorkflowLog {
        self.log
    }

    pub fn seal_failed(mut self) -> WorkflowLog {
        self.log.status = Some(WorkflowStatus::Failed);
        self.log
    }

    pub fn seal_cancelled(mut self) -> WorkflowLog {
        self.log.cancelled = true;
        self.log
    }
}

impl Default for WorkflowLogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
