//! Main workflow orchestration for healthcare document analysis.
//!
//! Sequences classification, fact extraction, phase-2 line-item parsing,
//! and issue analysis through a multi-phase pipeline, merging deterministic
//! and model-produced issues into one reconciled result. Every decision is
//! recorded in the workflow log, which is returned whether or not the run
//! succeeds.
//!
//! The orchestrator is single-threaded cooperative per document; multiple
//! `run` invocations may execute in parallel because the only shared state
//! is the read-only provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{PipelineError, ProviderError};
use crate::models::workflow::{AnalysisMode, PhaseTag, WorkflowLog, WorkflowLogBuilder};
use crate::models::{AnalysisResult, DocumentFacts, DocumentType};
use crate::services::classifier::{classify_document, extract_pre_facts, Classification};
use crate::services::extractor::{
    default_extractor_for, ExtractorKind, FactExtractor, HeuristicExtractor, RemoteFactExtractor,
};
use crate::services::llm::{AnalysisProvider, LlmClient, ProviderRegistry};
use crate::services::normalizer::normalize_facts;
use crate::services::{phase2, rules};

/// Progress callback invoked synchronously at the five pipeline
/// checkpoints with a snapshot of the evolving workflow log. Callback
/// panics are the caller's responsibility; a `None` callback is a no-op.
pub type ProgressCallback<'a> = dyn FnMut(&WorkflowLog, PhaseTag) + Send + 'a;

/// Routing decisions for one run, surfaced alongside the result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestrationSummary {
    pub classification: Option<Classification>,
    pub extractor: Option<String>,
    pub analyzer: Option<String>,
}

/// Full output of one orchestrator run. `analysis` is absent and `error`
/// present when the run failed or was cancelled; the workflow log is
/// always populated and sealed.
#[derive(Debug)]
pub struct RunOutcome {
    pub facts: DocumentFacts,
    pub analysis: Option<AnalysisResult>,
    pub orchestration: OrchestrationSummary,
    pub workflow_log: WorkflowLog,
    pub error: Option<PipelineError>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Multi-phase document analysis pipeline.
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    extractors: HashMap<ExtractorKind, Arc<dyn FactExtractor>>,
    phase2_runners: HashMap<ExtractorKind, Arc<dyn AnalysisProvider>>,
    fallback_analyzer: String,
    extractor_override: Option<ExtractorKind>,
    analyzer_override: Option<String>,
    profile_context: Option<String>,
}

impl Orchestrator {
    /// Minimal orchestrator: local heuristic extraction only. Remote
    /// extractors and phase-2 runners are attached with the builder
    /// methods; `from_config` wires the full set.
    pub fn new(registry: Arc<ProviderRegistry>, fallback_analyzer: impl Into<String>) -> Self {
        let mut extractors: HashMap<ExtractorKind, Arc<dyn FactExtractor>> = HashMap::new();
        extractors.insert(ExtractorKind::Heuristic, Arc::new(HeuristicExtractor::new()));

        Self {
            registry,
            extractors,
            phase2_runners: HashMap::new(),
            fallback_analyzer: fallback_analyzer.into(),
            extractor_override: None,
            analyzer_override: None,
            profile_context: None,
        }
    }

    /// Wire remote extractors and phase-2 runners from configuration.
    /// Phase-2 prompts route through the same backend that performed
    /// phase-1 extraction, so each remote extractor pairs with the
    /// registry provider of the same backend family.
    pub fn from_config(
        config: &Config,
        registry: Arc<ProviderRegistry>,
    ) -> Result<Self, ProviderError> {
        let client = Arc::new(LlmClient::new(config.retry.to_policy())?);
        let mut orchestrator = Self::new(registry.clone(), &config.analysis.fallback_analyzer);

        let openai = config.providers.openai.to_backend();
        let gemini = config.providers.gemini.to_backend();

        orchestrator = orchestrator.with_extractor(
            ExtractorKind::OpenAi,
            Arc::new(RemoteFactExtractor::new(
                ExtractorKind::OpenAi,
                openai.clone(),
                client.clone(),
            )),
        );
        orchestrator = orchestrator.with_extractor(
            ExtractorKind::Gemini,
            Arc::new(RemoteFactExtractor::new(
                ExtractorKind::Gemini,
                gemini.clone(),
                client.clone(),
            )),
        );

        if let Some(provider) = registry.get(&openai.model) {
            orchestrator = orchestrator.with_phase2_runner(ExtractorKind::OpenAi, provider);
        }
        if let Some(provider) = registry.get(&gemini.model) {
            orchestrator = orchestrator.with_phase2_runner(ExtractorKind::Gemini, provider);
        }

        Ok(orchestrator)
    }

    pub fn with_extractor(mut self, kind: ExtractorKind, extractor: Arc<dyn FactExtractor>) -> Self {
        self.extractors.insert(kind, extractor);
        self
    }

    pub fn with_phase2_runner(
        mut self,
        kind: ExtractorKind,
        provider: Arc<dyn AnalysisProvider>,
    ) -> Self {
        self.phase2_runners.insert(kind, provider);
        self
    }

    pub fn with_extractor_override(mut self, kind: ExtractorKind) -> Self {
        self.extractor_override = Some(kind);
        self
    }

    pub fn with_analyzer_override(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer_override = Some(analyzer.into());
        self
    }

    pub fn with_profile_context(mut self, context: impl Into<String>) -> Self {
        self.profile_context = Some(context.into());
        self
    }

    /// Run the full pipeline over one document.
    pub async fn run(
        &self,
        raw_text: &str,
        mut progress: Option<&mut ProgressCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> RunOutcome {
        let mut log = WorkflowLogBuilder::new();
        let mut summary = OrchestrationSummary::default();

        // ------------------------------------------------------------------
        // 1. Pre-extraction classification
        // ------------------------------------------------------------------
        notify(&mut progress, &log, PhaseTag::PreExtractionActive);
        if is_cancelled(cancel) {
            return cancelled_outcome(log, summary);
        }

        let classification = classify_document(raw_text);
        let pre_facts = extract_pre_facts(raw_text);
        summary.classification = Some(classification.clone());
        log.set_classification(classification.clone());
        log.set_pre_facts(pre_facts);

        // ------------------------------------------------------------------
        // 2. Choose extractor
        // ------------------------------------------------------------------
        let (selected_kind, reason) = match self.extractor_override {
            Some(kind) => (kind, "override"),
            None => (
                default_extractor_for(classification.document_type),
                "regex classification",
            ),
        };
        log.set_extractor_selection(selected_kind.as_str(), reason);

        // Unconfigured remote extractors degrade to the local heuristic.
        let (used_kind, extractor) = match self.extractors.get(&selected_kind) {
            Some(extractor) => (selected_kind, extractor.clone()),
            None => {
                tracing::warn!(
                    selected = selected_kind.as_str(),
                    "extractor unavailable, degrading to heuristic"
                );
                (
                    ExtractorKind::Heuristic,
                    self.extractors[&ExtractorKind::Heuristic].clone(),
                )
            },
        };
        summary.extractor = Some(used_kind.as_str().to_string());

        // ------------------------------------------------------------------
        // 3. Extract facts
        // ------------------------------------------------------------------
        notify(&mut progress, &log, PhaseTag::ExtractionActive);
        if is_cancelled(cancel) {
            return cancelled_outcome(log, summary);
        }

        let text_for_extraction = match &self.profile_context {
            Some(context) => format!(
                "{context}\n\n{sep}\nDOCUMENT TO ANALYZE:\n{sep}\n\n{raw_text}",
                sep = "=".repeat(50)
            ),
            None => raw_text.to_string(),
        };

        let mut facts = normalize_facts(extractor.extract(&text_for_extraction).await);
        log.set_extraction(used_kind.as_str(), &facts);

        // ------------------------------------------------------------------
        // 4. Phase-2 line items (dispatch on the normalized document type)
        // ------------------------------------------------------------------
        notify(&mut progress, &log, PhaseTag::LineItemsActive);
        if is_cancelled(cancel) {
            return cancelled_outcome(log, summary);
        }

        let doc_type = facts.document_type.unwrap_or(DocumentType::Unknown);
        if phase2::has_phase2(doc_type) {
            if let Some(runner) = self.phase2_runners.get(&used_kind) {
                phase2::run_phase2(runner.as_ref(), doc_type, raw_text, &mut facts, &mut log).await;
                log.update_facts(&facts);
            }
        }

        // ------------------------------------------------------------------
        // 5. Choose analyzer (with configured fallback)
        // ------------------------------------------------------------------
        let requested = self
            .analyzer_override
            .clone()
            .unwrap_or_else(|| self.fallback_analyzer.clone());

        let (analyzer_name, provider) = match self.registry.get(&requested) {
            Some(provider) => (requested.clone(), provider),
            None => match self.registry.get(&self.fallback_analyzer) {
                Some(provider) => {
                    log.set_fallback(&requested, &self.fallback_analyzer);
                    (self.fallback_analyzer.clone(), provider)
                },
                None => {
                    let error = PipelineError::AnalyzerUnavailable {
                        requested,
                        fallback: self.fallback_analyzer.clone(),
                    };
                    tracing::error!("{error}");
                    return RunOutcome {
                        facts,
                        analysis: None,
                        orchestration: summary,
                        workflow_log: log.seal_failed(),
                        error: Some(error),
                    };
                },
            },
        };
        summary.analyzer = Some(analyzer_name.clone());
        log.set_analyzer(&analyzer_name);

        // ------------------------------------------------------------------
        // 6. Analyze (fact-aware when the provider supports it)
        // ------------------------------------------------------------------
        notify(&mut progress, &log, PhaseTag::AnalysisActive);
        if is_cancelled(cancel) {
            return cancelled_outcome(log, summary);
        }

        let analysis = if provider.supports_facts() {
            match provider.analyze_document(raw_text, Some(&facts)).await {
                Ok(result) => {
                    log.set_mode(AnalysisMode::FactsAndText);
                    Ok(result)
                },
                Err(e) => {
                    tracing::warn!(
                        analyzer = %analyzer_name,
                        "fact-aware analysis failed ({e}), retrying text-only"
                    );
                    match provider.analyze_document(raw_text, None).await {
                        Ok(result) => {
                            log.set_mode(AnalysisMode::TextOnly);
                            Ok(result)
                        },
                        Err(e) => Err(e),
                    }
                },
            }
        } else {
            match provider.analyze_document(raw_text, None).await {
                Ok(result) => {
                    log.set_mode(AnalysisMode::TextOnly);
                    Ok(result)
                },
                Err(e) => Err(e),
            }
        };

        let mut analysis = match analysis {
            Ok(result) => result,
            Err(source) => {
                let error = PipelineError::AnalyzerFailed {
                    analyzer: analyzer_name,
                    source,
                };
                tracing::error!("{error}");
                return RunOutcome {
                    facts,
                    analysis: None,
                    orchestration: summary,
                    workflow_log: log.seal_failed(),
                    error: Some(error),
                };
            },
        };

        // ------------------------------------------------------------------
        // 7. Merge deterministic issues, enforce savings invariants
        // ------------------------------------------------------------------
        analysis.issues.extend(rules::deterministic_issues(&facts));
        rules::normalize_issue_savings(&mut analysis.issues);
        analysis.finalize_savings(rules::deterministic_savings(&facts));
        analysis.meta.provider = analyzer_name;

        log.set_result(&analysis);
        notify(&mut progress, &log, PhaseTag::Complete);

        RunOutcome {
            facts,
            analysis: Some(analysis),
            orchestration: summary,
            workflow_log: log.seal(),
            error: None,
        }
    }
}

fn notify(
    progress: &mut Option<&mut ProgressCallback<'_>>,
    log: &WorkflowLogBuilder,
    tag: PhaseTag,
) {
    if let Some(callback) = progress.as_deref_mut() {
        callback(&log.snapshot(), tag);
    }
}

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.map(|token| token.is_cancelled()).unwrap_or(false)
}

fn cancelled_outcome(log: WorkflowLogBuilder, summary: OrchestrationSummary) -> RunOutcome {
    RunOutcome {
        facts: DocumentFacts::default(),
        analysis: None,
        orchestration: summary,
        workflow_log: log.seal_cancelled(),
        error: Some(PipelineError::Cancelled),
    }
}
