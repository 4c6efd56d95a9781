//! LLM response text cleanup.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^```(?:json)?").unwrap());
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```$").unwrap());

/// Clean raw LLM output for JSON parsing.
///
/// Removes markdown code fences and any conversational preamble before the
/// first JSON delimiter (`{` or `[`). Returns the input unchanged when no
/// delimiter is present so the JSON parse error surfaces the real payload.
pub fn clean_llm_json(text: &str) -> String {
    let mut cleaned = text.trim().to_string();

    cleaned = FENCE_OPEN.replace(&cleaned, "").to_string();
    cleaned = FENCE_CLOSE.replace(&cleaned, "").to_string();

    let first_obj = cleaned.find('{');
    let first_arr = cleaned.find('[');
    let start = match (first_obj, first_arr) {
        (Some(o), Some(a)) => Some(o.min(a)),
        (Some(o), None) => Some(o),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    };
    if let Some(idx) = start {
        cleaned = cleaned[idx..].to_string();
    }

    cleaned.trim().to_string()
}
