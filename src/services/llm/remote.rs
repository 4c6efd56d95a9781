//! Remote analysis providers over OpenAI-compatible chat APIs.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::{BackendConfig, LlmClient};
use super::provider::{parse_issue_array, AnalysisProvider};
use crate::error::ProviderError;
use crate::models::{AnalysisResult, DocumentFacts};
use crate::services::prompts::build_analysis_prompt;
use crate::utils::clean_llm_json;

const ANALYSIS_SYSTEM_PROMPT: &str =
    "You analyze healthcare billing documents and return valid JSON only.";
const PROMPT_SYSTEM_PROMPT: &str =
    "You extract structured data and return valid JSON only.";

/// Chat-API-backed analysis provider.
///
/// The OpenAI backend is fact-aware: the extracted fact map is appended to
/// its analysis prompt. The Gemini backend routes through the same
/// OpenAI-compatible surface but performs text-only analysis.
pub struct RemoteAnalysisProvider {
    backend: BackendConfig,
    client: Arc<LlmClient>,
    fact_aware: bool,
}

impl RemoteAnalysisProvider {
    pub fn openai(backend: BackendConfig, client: Arc<LlmClient>) -> Self {
        Self {
            backend,
            client,
            fact_aware: true,
        }
    }

    pub fn gemini(backend: BackendConfig, client: Arc<LlmClient>) -> Self {
        Self {
            backend,
            client,
            fact_aware: false,
        }
    }
}

#[async_trait]
impl AnalysisProvider for RemoteAnalysisProvider {
    fn name(&self) -> &str {
        &self.backend.model
    }

    fn supports_facts(&self) -> bool {
        self.fact_aware
    }

    async fn health_check(&self) -> bool {
        self.client.health_check(&self.backend).await
    }

    async fn analyze_document(
        &self,
        raw_text: &str,
        facts: Option<&DocumentFacts>,
    ) -> Result<AnalysisResult, ProviderError> {
        let facts_json = match (self.fact_aware, facts) {
            (true, Some(facts)) => Some(
                serde_json::to_string_pretty(facts)
                    .map_err(|e| ProviderError::Parse(e.to_string()))?,
            ),
            _ => None,
        };

        let prompt = build_analysis_prompt(raw_text, facts_json.as_deref());
        let response = self
            .client
            .chat_completion(&self.backend, ANALYSIS_SYSTEM_PROMPT, &prompt)
            .await?;

        let cleaned = clean_llm_json(&response);
        Ok(parse_issue_array(self.name(), &cleaned))
    }

    async fn run_prompt(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .chat_completion(&self.backend, PROMPT_SYSTEM_PROMPT, prompt)
            .await?;
        Ok(clean_llm_json(&response))
    }
}
