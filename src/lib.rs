//! Claimscope Library
//!
//! Core pipeline for healthcare billing document analysis: document
//! classification, structured fact extraction, deterministic rule checks,
//! LLM-backed issue analysis, cross-document reconciliation, and the
//! benchmark evaluator that scores it all against annotated ground truth.

pub mod bench;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{PipelineError, ProviderError};
pub use models::{
    AnalysisResult, DocumentFacts, DocumentType, Issue, IssueSource, IssueType, PatientAnalysis,
    PatientDocument, PatientProfile, WorkflowLog,
};
pub use services::{
    analyze_patient, classify_document, AnalysisProvider, LocalHeuristicProvider, Orchestrator,
    ProviderRegistry, RunOutcome,
};

// Test modules
#[cfg(test)]
mod tests;
