//! Token usage completion
//!
//! SDKs report usage in several shapes. Resolution order:
//! 1. `tokensUsage { prompt, completion }` (native shape)
//! 2. `usage { promptTokens, completionTokens }` (OpenAI)
//! 3. `usage { inputTokens, outputTokens }` (Anthropic)
//!
//! Keys are read after camelCase normalization, so `prompt_tokens` and
//! `promptTokens` are equivalent.

use serde_json::{Map, Value as JsonValue};

use super::TokenUsage;
use crate::utils::json::json_as_u64;

/// Resolve token counts from a camelCased event payload.
///
/// Returns `None` when neither a prompt nor a completion count is present.
pub fn complete_token_usage(payload: &Map<String, JsonValue>) -> Option<TokenUsage> {
    if let Some(JsonValue::Object(explicit)) = payload.get("tokensUsage") {
        let usage = TokenUsage::from_counts(
            explicit.get("prompt").and_then(json_as_u64),
            explicit.get("completion").and_then(json_as_u64),
        );
        if usage.is_some() {
            return usage;
        }
    }

    let JsonValue::Object(usage) = payload.get("usage")? else {
        return None;
    };
    let prompt = first_count(usage, &["promptTokens", "inputTokens"]);
    let completion = first_count(usage, &["completionTokens", "outputTokens"]);
    TokenUsage::from_counts(prompt, completion)
}

fn first_count(map: &Map<String, JsonValue>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| map.get(*k).and_then(json_as_u64))
}
