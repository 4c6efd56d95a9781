//! Error taxonomy for the analysis pipeline.
//!
//! Provider adapters surface `ProviderError`; the orchestrator maps those
//! into `PipelineError` kinds. Classification, pre-fact scanning,
//! normalization, and the deterministic engine never fail, so they carry no
//! error type at all.

use std::time::Duration;

/// Errors produced inside a provider adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider API error: {0}")]
    Api(String),

    #[error("provider response parsing error: {0}")]
    Parse(String),

    #[error("provider timeout after {0}s")]
    Timeout(u64),

    #[error("provider rate limited")]
    RateLimited {
        /// Server-suggested wait, when the response carried one.
        retry_after: Option<Duration>,
    },

    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("operation not supported by this provider: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Rate-limit-class failures are retried by the adapter itself; all
    /// other classes propagate to the orchestrator as a single error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Pipeline-level error kinds surfaced from `Orchestrator::run`.
///
/// Extraction and phase-2 failures are recovered inline (empty facts,
/// skipped line items) and recorded in the workflow log rather than raised.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no analysis provider: {requested} (and fallback {fallback} missing)")]
    AnalyzerUnavailable { requested: String, fallback: String },

    #[error("analyzer {analyzer} failed: {source}")]
    AnalyzerFailed {
        analyzer: String,
        #[source]
        source: ProviderError,
    },

    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Stable machine-readable kind label, mirrored into failed workflow
    /// logs and persisted result payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AnalyzerUnavailable { .. } => "analyzer_unavailable",
            Self::AnalyzerFailed { .. } => "analyzer_failed",
            Self::Cancelled => "cancelled",
        }
    }
}
