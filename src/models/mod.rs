pub mod facts;
pub mod issue;
pub mod patient;
pub mod workflow;

pub use facts::{
    DentalLineItem, DocumentFacts, DocumentType, FsaClaimItem, InsuranceClaimItem, MedicalLineItem,
    ReceiptItem, FACT_KEYS,
};
pub use issue::{AnalysisMeta, AnalysisResult, Issue, IssueSource, IssueType};
pub use patient::{PatientAnalysis, PatientDocument, PatientProfile, Sex};
pub use workflow::{
    AnalysisMode, AnalysisRecord, ExtractionRecord, FallbackUsed, PhaseTag, PreExtractionRecord,
    WorkflowLog, WorkflowLogBuilder, WorkflowStatus,
};
