//! Fact extractor adapters.
//!
//! Three interchangeable implementations behind one contract: a remote
//! OpenAI-backed extractor, a remote Gemini-backed extractor, and a local
//! regex heuristic. Extraction never fails — the failure mode is an
//! all-absent fact map.

mod heuristic;
mod remote;

pub use heuristic::HeuristicExtractor;
pub use remote::RemoteFactExtractor;

use async_trait::async_trait;

use crate::models::{DocumentFacts, DocumentType};

/// Extractor backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    OpenAi,
    Gemini,
    Heuristic,
}

impl ExtractorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Heuristic => "heuristic",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "gemini" => Some(Self::Gemini),
            "heuristic" => Some(Self::Heuristic),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default extractor per classified document type.
pub fn default_extractor_for(doc_type: DocumentType) -> ExtractorKind {
    match doc_type {
        DocumentType::PharmacyReceipt => ExtractorKind::Gemini,
        _ => ExtractorKind::OpenAi,
    }
}

/// Extraction contract. Implementations must not propagate errors; the
/// all-absent fact map is the failure value.
#[async_trait]
pub trait FactExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, raw_text: &str) -> DocumentFacts;
}
