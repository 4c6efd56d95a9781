//! Remote model-backed fact extraction.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ExtractorKind, FactExtractor};
use crate::models::DocumentFacts;
use crate::services::llm::{BackendConfig, LlmClient};
use crate::services::normalizer::normalize_facts;
use crate::services::prompts::build_fact_extraction_prompt;
use crate::utils::clean_llm_json;

const EXTRACTION_SYSTEM_PROMPT: &str = "You extract structured healthcare facts.";

/// Chat-API-backed extractor. One instance per backend family.
pub struct RemoteFactExtractor {
    kind: ExtractorKind,
    backend: BackendConfig,
    client: Arc<LlmClient>,
}

impl RemoteFactExtractor {
    pub fn new(kind: ExtractorKind, backend: BackendConfig, client: Arc<LlmClient>) -> Self {
        Self {
            kind,
            backend,
            client,
        }
    }
}

#[async_trait]
impl FactExtractor for RemoteFactExtractor {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn extract(&self, raw_text: &str) -> DocumentFacts {
        if raw_text.trim().is_empty() {
            return DocumentFacts::default();
        }

        let prompt = build_fact_extraction_prompt(raw_text);
        let response = match self
            .client
            .chat_completion(&self.backend, EXTRACTION_SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(extractor = self.name(), "fact extraction failed: {e}");
                return DocumentFacts::default();
            },
        };

        let cleaned = clean_llm_json(&response);
        match serde_json::from_str::<serde_json::Value>(&cleaned) {
            Ok(value) => normalize_facts(DocumentFacts::from_extraction_json(&value)),
            Err(e) => {
                tracing::warn!(extractor = self.name(), "extraction JSON invalid: {e}");
                DocumentFacts::default()
            },
        }
    }
}
