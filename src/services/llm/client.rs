//! LLM HTTP client for OpenAI-compatible chat-completion APIs.
//!
//! Both remote backends route through this client: OpenAI natively, Gemini
//! through its OpenAI-compatible endpoint. Rate-limit responses (HTTP 429)
//! are retried internally with exponential backoff; every other failure
//! class surfaces to the caller after one attempt.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::backoff::{parse_retry_hint, RetryPolicy};
use crate::error::ProviderError;

/// Connection settings for one chat-completion backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

/// Shared HTTP client with retry policy.
pub struct LlmClient {
    http: Client,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(retry: RetryPolicy) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::Api(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, retry })
    }

    /// Run a chat completion, retrying rate-limit failures per policy.
    pub async fn chat_completion(
        &self,
        backend: &BackendConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        let mut attempt = 0u32;
        loop {
            match self.chat_once(backend, system_prompt, user_prompt).await {
                Err(ProviderError::RateLimited { retry_after })
                    if attempt < self.retry.max_retries =>
                {
                    let delay = self.retry.delay_for(attempt, retry_after);
                    attempt += 1;
                    tracing::warn!(
                        model = %backend.model,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                },
                other => return other,
            }
        }
    }

    async fn chat_once(
        &self,
        backend: &BackendConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        let api_key = backend.api_key.as_ref().ok_or_else(|| {
            ProviderError::NotConfigured(format!("{}: API key missing", backend.model))
        })?;

        let request = ChatCompletionRequest {
            model: backend.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens: Some(backend.max_tokens),
            temperature: Some(backend.temperature),
        };

        let url = format!("{}/chat/completions", backend.api_base.trim_end_matches('/'));
        tracing::debug!("calling LLM API: {} with model {}", url, backend.model);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(backend.timeout_seconds))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(backend.timeout_seconds)
                } else {
                    ProviderError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let header_hint = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            let retry_after = header_hint.or_else(|| parse_retry_hint(&body));
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Api(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ProviderError::Parse("Empty response from LLM".to_string()))
    }

    /// Cheap connectivity probe (models listing), used at registration.
    pub async fn health_check(&self, backend: &BackendConfig) -> bool {
        let Some(api_key) = backend.api_key.as_ref() else {
            return false;
        };

        let url = format!("{}/models", backend.api_base.trim_end_matches('/'));
        let result = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        match result {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(model = %backend.model, "health check failed: {e}");
                false
            },
        }
    }
}

// ============================================================================
// OpenAI API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
