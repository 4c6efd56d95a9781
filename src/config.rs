//! Application configuration.
//!
//! Loaded from a TOML file with fallback defaults for every section, then
//! overridden by command-line arguments. API keys are never stored in the
//! file; each backend names the environment variable that carries its key.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::services::llm::{BackendConfig, RetryPolicy};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub analysis: AnalysisConfig,
    pub retry: RetryConfig,
    pub benchmark: BenchmarkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: BackendSettings,
    pub gemini: BackendSettings,
    /// Optional locally-hosted clinical model, registered only when set.
    pub medgemma: Option<BackendSettings>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: BackendSettings {
                api_base: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                temperature: 0.0,
                max_tokens: 4096,
                timeout_seconds: 60,
            },
            gemini: BackendSettings {
                api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
                model: "gemini-1.5-flash".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                temperature: 0.0,
                max_tokens: 4096,
                timeout_seconds: 60,
            },
            medgemma: None,
        }
    }
}

/// Connection settings for one chat-completion backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub api_base: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            model: String::new(),
            api_key_env: String::new(),
            temperature: 0.0,
            max_tokens: 4096,
            timeout_seconds: 60,
        }
    }
}

impl BackendSettings {
    /// Resolve into a live backend config, reading the API key from the
    /// environment. The key stays `None` when the variable is unset; the
    /// client reports `NotConfigured` on first use and the registry health
    /// check omits the provider.
    pub fn to_backend(&self) -> BackendConfig {
        BackendConfig {
            api_base: self.api_base.clone(),
            model: self.model.clone(),
            api_key: std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_seconds: self.timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analyzer used when the requested provider is not registered.
    pub fallback_analyzer: String,
    /// Documents above this size are rejected by callers, not the core.
    pub max_document_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fallback_analyzer: "gpt-4o-mini".to_string(),
            max_document_chars: 100_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: std::time::Duration::from_millis(self.base_delay_ms),
            max_delay: std::time::Duration::from_millis(self.max_delay_ms),
            exponential_base: self.exponential_base,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Directory of patient_*.json benchmark cases.
    pub profiles_dir: String,
    /// Where per-run result JSON files are written.
    pub results_dir: String,
    /// Inference cost assumption for the ROI metric, USD per second.
    pub cost_per_second: f64,
    /// REST endpoint for `--push-to-supabase`; unset disables pushing.
    pub push_endpoint: Option<String>,
    pub push_api_key_env: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            profiles_dir: "benchmarks/patients".to_string(),
            results_dir: "benchmarks/results".to_string(),
            cost_per_second: 0.0005,
            push_endpoint: None,
            push_api_key_env: "SUPABASE_SERVICE_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file is missing or a section is absent.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("config parse failed ({e}), using defaults");
                    Self::default()
                },
            },
            Err(e) => {
                tracing::warn!("config file unreadable ({e}), using defaults");
                Self::default()
            },
        }
    }
}
