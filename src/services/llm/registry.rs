//! Provider registry.
//!
//! A mapping from provider name to a live provider instance. Registration
//! happens once at process start: each candidate's health check is invoked
//! and failing providers are omitted; a failure constructing one provider
//! never prevents others from registering. After installation the registry
//! is read-only, so concurrent orchestrator runs share it freely.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

use super::provider::AnalysisProvider;

static GLOBAL: OnceLock<Arc<ProviderRegistry>> = OnceLock::new();

/// Read-only provider lookup table.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn AnalysisProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider after a passing health check. Returns whether
    /// the provider was admitted.
    pub async fn register(&mut self, provider: Arc<dyn AnalysisProvider>) -> bool {
        let name = provider.name().to_string();
        if !provider.health_check().await {
            tracing::warn!(provider = %name, "health check failed, provider omitted");
            return false;
        }
        tracing::info!(provider = %name, "provider registered");
        self.providers.insert(name, provider);
        true
    }

    /// Register without a health check. Used for providers whose liveness
    /// is trivially true (the local heuristic) and in tests.
    pub fn register_unchecked(&mut self, provider: Arc<dyn AnalysisProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AnalysisProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Install the process-wide registry. Returns false (and changes
    /// nothing) once a registry has already been installed.
    pub fn install(registry: Arc<ProviderRegistry>) -> bool {
        GLOBAL.set(registry).is_ok()
    }

    /// The process-wide registry, if installed.
    pub fn global() -> Option<Arc<ProviderRegistry>> {
        GLOBAL.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::{AnalysisResult, DocumentFacts};
    use async_trait::async_trait;

    struct FixedHealth {
        name: String,
        healthy: bool,
    }

    #[async_trait]
    impl AnalysisProvider for FixedHealth {
        fn name(&self) -> &str {
            &self.name
        }

        async fn health_check(&self) -> bool {
            self.healthy
        }

        async fn analyze_document(
            &self,
            _raw_text: &str,
            _facts: Option<&DocumentFacts>,
        ) -> Result<AnalysisResult, ProviderError> {
            Ok(AnalysisResult::default())
        }

        async fn run_prompt(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn failing_health_check_omits_the_provider() {
        let mut registry = ProviderRegistry::new();
        let admitted = registry
            .register(Arc::new(FixedHealth {
                name: "down".into(),
                healthy: false,
            }))
            .await;
        assert!(!admitted);

        let admitted = registry
            .register(Arc::new(FixedHealth {
                name: "up".into(),
                healthy: true,
            }))
            .await;
        assert!(admitted);

        assert_eq!(registry.list(), vec!["up".to_string()]);
        assert!(registry.get("down").is_none());
        assert!(registry.get("up").is_some());
    }
}
