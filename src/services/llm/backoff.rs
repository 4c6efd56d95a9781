//! Exponential backoff policy for rate-limited provider calls.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

/// "Please try again in 289ms" / "try again in 2s" hints from API errors.
static RETRY_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)try again in (\d+(?:\.\d+)?)\s*(ms|s)\b").unwrap());

/// Retry policy for rate-limit-class failures. All other failure classes
/// propagate to the orchestrator after a single attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (0-based).
    ///
    /// A server-provided hint wins over the exponential schedule: the hint
    /// gets a 500 ms buffer and is capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            let with_buffer = hint + Duration::from_millis(500);
            return with_buffer.min(self.max_delay);
        }

        let exp = self.base_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
    }
}

/// Extract a wait-duration hint from an API error message, if present.
pub fn parse_retry_hint(message: &str) -> Option<Duration> {
    let caps = RETRY_HINT.captures(message)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let duration = match caps.get(2)?.as_str().to_lowercase().as_str() {
        "ms" => Duration::from_secs_f64(value / 1000.0),
        _ => Duration::from_secs_f64(value),
    };
    Some(duration)
}
