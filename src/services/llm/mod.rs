//! LLM Provider Module
//!
//! Uniform model interface over heterogeneous backends: remote chat APIs
//! and a local heuristic fallback. The registry routes analyzer names to
//! live provider instances.

pub mod backoff;
pub mod client;
pub mod heuristic;
pub mod provider;
pub mod registry;
pub mod remote;

pub use backoff::{parse_retry_hint, RetryPolicy};
pub use client::{BackendConfig, LlmClient};
pub use heuristic::{LocalHeuristicProvider, HEURISTIC_PROVIDER_NAME};
pub use provider::{parse_issue_array, AnalysisProvider};
pub use registry::ProviderRegistry;
pub use remote::RemoteAnalysisProvider;
