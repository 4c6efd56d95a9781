pub mod classifier;
pub mod coverage;
pub mod extractor;
pub mod llm;
pub mod normalizer;
pub mod orchestrator;
pub mod patient;
pub mod phase2;
pub mod prompts;
pub mod rules;
pub mod transactions;

pub use classifier::{classify_document, extract_pre_facts, Classification, PreFacts};
pub use coverage::{build_coverage_matrix, CoverageCell, CoverageMatrix};
pub use extractor::{default_extractor_for, ExtractorKind, FactExtractor};
pub use llm::{
    AnalysisProvider, LlmClient, LocalHeuristicProvider, ProviderRegistry, RemoteAnalysisProvider,
    RetryPolicy,
};
pub use normalizer::normalize_facts;
pub use orchestrator::{Orchestrator, OrchestrationSummary, ProgressCallback, RunOutcome};
pub use patient::analyze_patient;
pub use transactions::{
    deduplicate_transactions, document_fingerprint, normalize_line_items, CanonicalTransaction,
    ProvenanceMap, TransactionVariant,
};
