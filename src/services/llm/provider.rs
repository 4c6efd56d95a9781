//! Analysis provider abstraction.
//!
//! Every backend — remote API or local heuristic — implements this trait.
//! Fact-awareness is an explicit capability: the orchestrator consults
//! `supports_facts()` and picks the matching call site instead of probing
//! with a failing call.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::{AnalysisResult, DocumentFacts, Issue, IssueSource, IssueType};
use crate::utils::round2;

/// Uniform contract over heterogeneous language-model backends.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Registry name (e.g. `gpt-4o-mini`, `heuristic`).
    fn name(&self) -> &str;

    /// Whether `analyze_document` makes use of a supplied fact map.
    fn supports_facts(&self) -> bool {
        false
    }

    /// Liveness probe run once at registration; failing providers are
    /// omitted from the registry.
    async fn health_check(&self) -> bool;

    /// Produce an analysis of the document. `facts` is `None` for
    /// text-only analysis.
    async fn analyze_document(
        &self,
        raw_text: &str,
        facts: Option<&DocumentFacts>,
    ) -> Result<AnalysisResult, ProviderError>;

    /// Run a raw prompt and return the text response. Used for phase-2
    /// direct JSON prompting.
    async fn run_prompt(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Parse a model-produced JSON issue array into an `AnalysisResult`.
///
/// Tolerates two shapes: a bare array, or an object with an `issues` key.
/// Unknown issue types map to `other`; savings are rounded and negative
/// amounts dropped.
pub fn parse_issue_array(provider_name: &str, cleaned_json: &str) -> AnalysisResult {
    let parsed: serde_json::Value = match serde_json::from_str(cleaned_json) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(provider = provider_name, "issue JSON parse failed: {e}");
            serde_json::Value::Array(vec![])
        },
    };

    let raw_issues = match &parsed {
        serde_json::Value::Array(items) => items.as_slice(),
        serde_json::Value::Object(obj) => obj
            .get("issues")
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
            .unwrap_or(&[]),
        _ => &[],
    };

    let issues: Vec<Issue> = raw_issues
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let get_str =
                |key: &str| obj.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());

            let max_savings = obj
                .get("max_savings")
                .and_then(|v| v.as_f64())
                .filter(|v| *v >= 0.0)
                .map(round2);

            Some(Issue {
                issue_type: get_str("type")
                    .as_deref()
                    .map(IssueType::parse_type)
                    .unwrap_or(IssueType::Other),
                summary: get_str("summary").unwrap_or_else(|| "Potential issue identified".into()),
                evidence: get_str("evidence"),
                code: get_str("code"),
                date: get_str("date"),
                max_savings,
                recommended_action: get_str("recommended_action"),
                source: IssueSource::Llm,
                confidence: obj
                    .get("confidence")
                    .and_then(|v| v.as_f64())
                    .map(|c| c.clamp(0.0, 1.0))
                    .unwrap_or(0.5),
            })
        })
        .collect();

    let total: f64 = issues.iter().filter_map(|i| i.max_savings).sum();

    let mut result = AnalysisResult {
        issues,
        meta: Default::default(),
    };
    result.meta.provider = provider_name.to_string();
    result.meta.issue_count = result.issues.len();
    result.meta.llm_max_savings = round2(total);
    result.meta.total_max_savings = round2(total);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_issue_array() {
        let json = r#"[
            {"type": "overbilling", "summary": "Charged above allowed amount",
             "evidence": "Billed $200, allowed $120", "max_savings": 80.0},
            {"type": "mystery_kind", "summary": "odd"}
        ]"#;

        let result = parse_issue_array("gpt-4o-mini", json);
        assert_eq!(result.issues.len(), 2);
        assert_eq!(result.issues[0].issue_type, IssueType::Overbilling);
        assert_eq!(result.issues[0].max_savings, Some(80.0));
        assert_eq!(result.issues[1].issue_type, IssueType::Other);
        assert_eq!(result.meta.provider, "gpt-4o-mini");
        assert_eq!(result.meta.issue_count, 2);
        assert_eq!(result.meta.total_max_savings, 80.0);
    }

    #[test]
    fn parses_an_object_with_issues_key() {
        let json = r#"{"issues": [{"type": "fsa_issue", "summary": "denied"}]}"#;
        let result = parse_issue_array("p", json);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].issue_type, IssueType::FsaIssue);
    }

    #[test]
    fn malformed_json_yields_empty_result() {
        let result = parse_issue_array("p", "not json at all");
        assert!(result.issues.is_empty());
        assert_eq!(result.meta.issue_count, 0);
    }

    #[test]
    fn negative_savings_are_dropped() {
        let json = r#"[{"type": "billing_error", "summary": "s", "max_savings": -5.0}]"#;
        let result = parse_issue_array("p", json);
        assert_eq!(result.issues[0].max_savings, None);
    }
}
