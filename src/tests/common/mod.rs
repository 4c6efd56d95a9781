//! Shared test doubles for pipeline tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::{AnalysisResult, DocumentFacts};
use crate::services::extractor::FactExtractor;
use crate::services::llm::AnalysisProvider;

/// Scriptable analysis provider.
pub struct StubAnalyzer {
    pub name: String,
    pub fact_aware: bool,
    /// Fail the fact-aware call, succeed text-only. Exercises the retry
    /// path and the `mode` bookkeeping.
    pub fail_with_facts: bool,
    /// Fail every analyze call.
    pub fail_always: bool,
    pub analysis: AnalysisResult,
    /// Canned responses for `run_prompt`, consumed front to back.
    pub prompt_responses: Mutex<Vec<String>>,
    /// Observed facts argument of each analyze call (true = facts given).
    pub analyze_calls: Mutex<Vec<bool>>,
}

impl StubAnalyzer {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fact_aware: true,
            fail_with_facts: false,
            fail_always: false,
            analysis: AnalysisResult::default(),
            prompt_responses: Mutex::new(vec![]),
            analyze_calls: Mutex::new(vec![]),
        }
    }

    pub fn with_analysis(mut self, analysis: AnalysisResult) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_prompt_response(self, response: &str) -> Self {
        self.prompt_responses
            .lock()
            .unwrap()
            .push(response.to_string());
        self
    }

    pub fn text_only(mut self) -> Self {
        self.fact_aware = false;
        self
    }

    pub fn failing_with_facts(mut self) -> Self {
        self.fail_with_facts = true;
        self
    }

    pub fn failing_always(mut self) -> Self {
        self.fail_always = true;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl AnalysisProvider for StubAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_facts(&self) -> bool {
        self.fact_aware
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn analyze_document(
        &self,
        _raw_text: &str,
        facts: Option<&DocumentFacts>,
    ) -> Result<AnalysisResult, ProviderError> {
        self.analyze_calls.lock().unwrap().push(facts.is_some());
        if self.fail_always {
            return Err(ProviderError::Api("stub failure".to_string()));
        }
        if self.fail_with_facts && facts.is_some() {
            return Err(ProviderError::Api("facts unsupported downstream".to_string()));
        }
        Ok(self.analysis.clone())
    }

    async fn run_prompt(&self, _prompt: &str) -> Result<String, ProviderError> {
        let mut responses = self.prompt_responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ProviderError::Api("no canned response".to_string()));
        }
        Ok(responses.remove(0))
    }
}

/// Extractor returning a fixed fact map.
pub struct StubExtractor {
    pub name: String,
    pub facts: DocumentFacts,
}

impl StubExtractor {
    pub fn returning(name: &str, facts: DocumentFacts) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            facts,
        })
    }
}

#[async_trait]
impl FactExtractor for StubExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, _raw_text: &str) -> DocumentFacts {
        self.facts.clone()
    }
}
