//! Benchmark result push.
//!
//! Narrow interface to the external persistence layer: the runner hands a
//! labeled payload to a `ResultsPusher`; the store behind the endpoint is
//! not this crate's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::runner::PatientBenchmarkMetrics;

/// Provenance-labeled benchmark upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkUpload {
    pub model_name: String,
    pub environment: String,
    pub commit_sha: Option<String>,
    pub branch_name: Option<String>,
    pub triggered_by: Option<String>,
    pub generated_at: String,
    pub metrics: PatientBenchmarkMetrics,
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait ResultsPusher: Send + Sync {
    async fn push(&self, upload: &BenchmarkUpload) -> Result<(), PushError>;
}

/// POSTs uploads to a REST endpoint (Supabase-style: `apikey` header plus
/// bearer authorization).
pub struct RestResultsPusher {
    endpoint: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl RestResultsPusher {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ResultsPusher for RestResultsPusher {
    async fn push(&self, upload: &BenchmarkUpload) -> Result<(), PushError> {
        let mut request = self.http.post(&self.endpoint).json(upload);
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(model = %upload.model_name, "benchmark results pushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::runner::BenchmarkRunner;
    use crate::services::llm::LocalHeuristicProvider;
    use std::sync::Arc;

    async fn sample_upload() -> BenchmarkUpload {
        use crate::bench::catalog::{ExpectedIssue, PatientCase};
        use crate::models::{PatientDocument, PatientProfile, Sex};

        let case = PatientCase {
            profile: PatientProfile {
                patient_id: "patient_001".into(),
                name: "Test".into(),
                age: 30,
                sex: Sex::M,
                date_of_birth: "1995-01-01".into(),
                conditions: vec![],
                allergies: vec![],
                surgeries: vec![],
            },
            documents: vec![PatientDocument {
                document_id: "doc-1".into(),
                text: "CPT 76805".into(),
            }],
            medical_history: None,
            expected_issues: vec![ExpectedIssue {
                issue_type: "gender_specific_contradiction".into(),
                severity: "high".into(),
                description: String::new(),
                requires_domain_knowledge: true,
                cpt_code: Some("76805".into()),
            }],
        };

        let runner =
            BenchmarkRunner::new("baseline", Arc::new(LocalHeuristicProvider::new()), 0.0005);
        let metrics = runner.run(&[case]).await.unwrap();

        BenchmarkUpload {
            model_name: "baseline".into(),
            environment: "local".into(),
            commit_sha: Some("abc123".into()),
            branch_name: Some("main".into()),
            triggered_by: Some("ci".into()),
            generated_at: metrics.generated_at.clone(),
            metrics,
        }
    }

    #[tokio::test]
    async fn pushes_labeled_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/benchmark_results")
            .match_header("apikey", "secret")
            .with_status(201)
            .create_async()
            .await;

        let pusher = RestResultsPusher::new(
            format!("{}/rest/v1/benchmark_results", server.url()),
            Some("secret".into()),
        );
        pusher.push(&sample_upload().await).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/benchmark_results")
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;

        let pusher = RestResultsPusher::new(
            format!("{}/rest/v1/benchmark_results", server.url()),
            None,
        );
        let err = pusher.push(&sample_upload().await).await.unwrap_err();
        assert!(matches!(err, PushError::Rejected { status: 401, .. }));
    }
}
