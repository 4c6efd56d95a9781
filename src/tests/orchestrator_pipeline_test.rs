//! End-to-end pipeline tests over the orchestrator with stub providers.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use super::common::{StubAnalyzer, StubExtractor};
use crate::error::PipelineError;
use crate::models::workflow::{AnalysisMode, PhaseTag};
use crate::models::{
    AnalysisResult, DocumentFacts, DocumentType, Issue, IssueSource, IssueType, MedicalLineItem,
};
use crate::services::extractor::ExtractorKind;
use crate::services::llm::ProviderRegistry;
use crate::services::orchestrator::Orchestrator;

fn registry_with(providers: Vec<Arc<StubAnalyzer>>) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register_unchecked(provider);
    }
    Arc::new(registry)
}

fn medical_bill_facts_with_duplicate() -> DocumentFacts {
    let mut facts = DocumentFacts::default();
    facts.document_type = Some(DocumentType::MedicalBill);
    facts.medical_line_items = Some(vec![
        MedicalLineItem {
            date_of_service: Some("2024-01-15".into()),
            cpt_code: Some("99213".into()),
            patient_responsibility: Some(50.0),
            ..Default::default()
        },
        MedicalLineItem {
            date_of_service: Some("2024-01-15".into()),
            cpt_code: Some("99213".into()),
            patient_responsibility: Some(50.0),
            ..Default::default()
        },
    ]);
    facts
}

#[tokio::test]
async fn duplicate_cpt_bill_yields_deterministic_issue_and_savings() {
    let analyzer = StubAnalyzer::named("gpt-4o-mini").into_arc();
    let registry = registry_with(vec![analyzer]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_extractor(
            ExtractorKind::OpenAi,
            StubExtractor::returning("openai", medical_bill_facts_with_duplicate()),
        )
        .with_analyzer_override("gpt-4o-mini");

    let outcome = orchestrator
        .run("CPT 99213 Date of Service 01/15/2024", None, None)
        .await;

    assert!(outcome.is_success());
    let analysis = outcome.analysis.unwrap();

    let duplicates: Vec<&Issue> = analysis
        .issues
        .iter()
        .filter(|i| i.issue_type == IssueType::DuplicateCharge)
        .collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].code.as_deref(), Some("99213"));
    assert_eq!(duplicates[0].source, IssueSource::Deterministic);
    assert_eq!(duplicates[0].max_savings, Some(50.0));

    assert_eq!(analysis.meta.deterministic_savings, 50.0);
    assert!(analysis.meta.total_max_savings >= 50.0);
}

#[tokio::test]
async fn pharmacy_receipt_phase2_attaches_items_and_counts() {
    let analyzer = StubAnalyzer::named("gemini-1.5-flash")
        .text_only()
        .with_prompt_response(
            r#"{"receipt_items":[{"description":"Lisinopril 10mg","amount":10.00}]}"#,
        )
        .into_arc();
    let registry = registry_with(vec![analyzer.clone()]);

    let mut facts = DocumentFacts::default();
    facts.document_type = Some(DocumentType::PharmacyReceipt);

    let orchestrator = Orchestrator::new(registry, "gemini-1.5-flash")
        .with_extractor(ExtractorKind::Gemini, StubExtractor::returning("gemini", facts))
        .with_extractor_override(ExtractorKind::Gemini)
        .with_phase2_runner(ExtractorKind::Gemini, analyzer)
        .with_analyzer_override("gemini-1.5-flash");

    let outcome = orchestrator
        .run("Pharmacy Rx Copay receipt", None, None)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.facts.receipt_item_list().len(), 1);
    assert_eq!(
        outcome.facts.receipt_item_list()[0].description.as_deref(),
        Some("Lisinopril 10mg")
    );
    assert_eq!(outcome.workflow_log.extraction.receipt_item_count, Some(1));
    assert_eq!(
        outcome.workflow_log.analysis.mode,
        Some(AnalysisMode::TextOnly)
    );
}

#[tokio::test]
async fn missing_analyzer_falls_back_to_configured_provider() {
    let fallback = StubAnalyzer::named("gpt-4o-mini").into_arc();
    let registry = registry_with(vec![fallback]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_analyzer_override("claude-xyz")
        .with_extractor_override(ExtractorKind::Heuristic);

    let outcome = orchestrator.run("some document", None, None).await;

    assert!(outcome.is_success());
    let fallback_used = outcome.workflow_log.analysis.fallback_used.unwrap();
    assert_eq!(fallback_used.requested, "claude-xyz");
    assert_eq!(fallback_used.used, "gpt-4o-mini");
    assert_eq!(
        outcome.workflow_log.analysis.analyzer.as_deref(),
        Some("gpt-4o-mini")
    );
}

#[tokio::test]
async fn analyzer_unavailable_after_fallback_is_fatal() {
    let registry = Arc::new(ProviderRegistry::new());
    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_analyzer_override("nonexistent")
        .with_extractor_override(ExtractorKind::Heuristic);

    let outcome = orchestrator.run("some document", None, None).await;

    assert!(!outcome.is_success());
    assert!(matches!(
        outcome.error,
        Some(PipelineError::AnalyzerUnavailable { .. })
    ));
    assert!(outcome.analysis.is_none());
    let log = serde_json::to_value(&outcome.workflow_log).unwrap();
    assert_eq!(log["status"], serde_json::json!("failed"));
}

#[tokio::test]
async fn fact_aware_failure_retries_text_only() {
    let analyzer = StubAnalyzer::named("gpt-4o-mini")
        .failing_with_facts()
        .into_arc();
    let registry = registry_with(vec![analyzer.clone()]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_extractor_override(ExtractorKind::Heuristic)
        .with_analyzer_override("gpt-4o-mini");

    let outcome = orchestrator.run("some document", None, None).await;

    assert!(outcome.is_success());
    assert_eq!(
        outcome.workflow_log.analysis.mode,
        Some(AnalysisMode::TextOnly)
    );
    // First call carried facts, the retry did not.
    assert_eq!(*analyzer.analyze_calls.lock().unwrap(), vec![true, false]);
}

#[tokio::test]
async fn analyzer_failure_after_retry_is_fatal() {
    let analyzer = StubAnalyzer::named("gpt-4o-mini").failing_always().into_arc();
    let registry = registry_with(vec![analyzer]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_extractor_override(ExtractorKind::Heuristic)
        .with_analyzer_override("gpt-4o-mini");

    let outcome = orchestrator.run("some document", None, None).await;

    assert!(matches!(
        outcome.error,
        Some(PipelineError::AnalyzerFailed { .. })
    ));
    assert!(outcome.analysis.is_none());
}

#[tokio::test]
async fn issues_keep_analyzer_then_deterministic_order() {
    let llm_analysis = AnalysisResult {
        issues: vec![
            Issue::llm(IssueType::Overbilling, "model finding one"),
            Issue::llm(IssueType::InsuranceIssue, "model finding two"),
        ],
        meta: Default::default(),
    };
    let analyzer = StubAnalyzer::named("gpt-4o-mini")
        .with_analysis(llm_analysis)
        .into_arc();
    let registry = registry_with(vec![analyzer]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_extractor(
            ExtractorKind::OpenAi,
            StubExtractor::returning("openai", medical_bill_facts_with_duplicate()),
        )
        .with_analyzer_override("gpt-4o-mini");

    let outcome = orchestrator.run("CPT bill", None, None).await;
    let issues = outcome.analysis.unwrap().issues;

    assert_eq!(issues.len(), 3);
    assert_eq!(issues[0].summary, "model finding one");
    assert_eq!(issues[1].summary, "model finding two");
    assert_eq!(issues[2].source, IssueSource::Deterministic);
}

#[tokio::test]
async fn total_savings_is_max_of_llm_and_deterministic() {
    let llm_analysis = AnalysisResult {
        issues: vec![Issue {
            max_savings: Some(30.0),
            ..Issue::llm(IssueType::Overbilling, "overbilled visit")
        }],
        meta: Default::default(),
    };
    let analyzer = StubAnalyzer::named("gpt-4o-mini")
        .with_analysis(llm_analysis)
        .into_arc();
    let registry = registry_with(vec![analyzer]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_extractor(
            ExtractorKind::OpenAi,
            StubExtractor::returning("openai", medical_bill_facts_with_duplicate()),
        )
        .with_analyzer_override("gpt-4o-mini");

    let meta = orchestrator
        .run("CPT bill", None, None)
        .await
        .analysis
        .unwrap()
        .meta;

    assert_eq!(meta.llm_max_savings, 30.0);
    assert_eq!(meta.deterministic_savings, 50.0);
    assert_eq!(meta.total_max_savings, 50.0);
    assert_eq!(
        meta.total_max_savings,
        meta.llm_max_savings.max(meta.deterministic_savings)
    );
}

#[tokio::test]
async fn progress_callback_sees_all_five_checkpoints() {
    let analyzer = StubAnalyzer::named("gpt-4o-mini").into_arc();
    let registry = registry_with(vec![analyzer]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_extractor_override(ExtractorKind::Heuristic)
        .with_analyzer_override("gpt-4o-mini");

    let tags: Arc<Mutex<Vec<PhaseTag>>> = Arc::new(Mutex::new(vec![]));
    let tags_clone = tags.clone();
    let mut callback = move |_log: &crate::models::WorkflowLog, tag: PhaseTag| {
        tags_clone.lock().unwrap().push(tag);
    };

    let outcome = orchestrator
        .run("some document", Some(&mut callback), None)
        .await;

    assert!(outcome.is_success());
    assert_eq!(
        *tags.lock().unwrap(),
        vec![
            PhaseTag::PreExtractionActive,
            PhaseTag::ExtractionActive,
            PhaseTag::LineItemsActive,
            PhaseTag::AnalysisActive,
            PhaseTag::Complete,
        ]
    );
}

#[tokio::test]
async fn cancelled_token_seals_log_without_analysis() {
    let analyzer = StubAnalyzer::named("gpt-4o-mini").into_arc();
    let registry = registry_with(vec![analyzer]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_extractor_override(ExtractorKind::Heuristic)
        .with_analyzer_override("gpt-4o-mini");

    let token = CancellationToken::new();
    token.cancel();

    let outcome = orchestrator.run("some document", None, Some(&token)).await;

    assert!(matches!(outcome.error, Some(PipelineError::Cancelled)));
    assert!(outcome.analysis.is_none());
    assert!(outcome.workflow_log.cancelled);
}

#[tokio::test]
async fn successful_log_has_the_exact_top_level_shape() {
    let analyzer = StubAnalyzer::named("gpt-4o-mini").into_arc();
    let registry = registry_with(vec![analyzer]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_extractor_override(ExtractorKind::Heuristic)
        .with_analyzer_override("gpt-4o-mini");

    let outcome = orchestrator.run("some document", None, None).await;
    let value = serde_json::to_value(&outcome.workflow_log).unwrap();
    let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "analysis",
            "extraction",
            "pre_extraction",
            "timestamp",
            "workflow_id"
        ]
    );
}

#[tokio::test]
async fn override_is_recorded_with_override_reason() {
    let analyzer = StubAnalyzer::named("gpt-4o-mini").into_arc();
    let registry = registry_with(vec![analyzer]);

    let orchestrator = Orchestrator::new(registry, "gpt-4o-mini")
        .with_extractor_override(ExtractorKind::Heuristic)
        .with_analyzer_override("gpt-4o-mini");

    let outcome = orchestrator.run("CPT 99213", None, None).await;
    let pre = &outcome.workflow_log.pre_extraction;
    assert_eq!(pre.extractor_selected.as_deref(), Some("heuristic"));
    assert_eq!(pre.extractor_reason.as_deref(), Some("override"));
}

#[tokio::test]
async fn default_routing_uses_regex_classification_reason() {
    let analyzer = StubAnalyzer::named("gpt-4o-mini").into_arc();
    let registry = registry_with(vec![analyzer]);

    // No openai extractor attached: selection still records the map's
    // choice, extraction then degrades to the heuristic.
    let orchestrator =
        Orchestrator::new(registry, "gpt-4o-mini").with_analyzer_override("gpt-4o-mini");

    let outcome = orchestrator
        .run(
            "CPT 99213 Date of Service 01/15/2024 Patient Responsibility $50",
            None,
            None,
        )
        .await;

    let pre = &outcome.workflow_log.pre_extraction;
    assert_eq!(pre.extractor_selected.as_deref(), Some("openai"));
    assert_eq!(pre.extractor_reason.as_deref(), Some("regex classification"));
    assert_eq!(
        outcome.workflow_log.extraction.extractor.as_deref(),
        Some("heuristic")
    );
}
