//! Tolerant parsing of model completions.
//!
//! Models routinely wrap JSON in a markdown code fence. Every stage that
//! demands structure goes through `completion_json` — no stage decodes raw
//! completion text directly, so fence handling stays identical everywhere.

use crate::error::LlmError;

/// Strip a leading/trailing triple-backtick fence (optionally tagged
/// `json`) and surrounding whitespace.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a completion into a JSON value after fence normalization.
pub fn completion_json(raw: &str) -> Result<serde_json::Value, LlmError> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|e| LlmError::MalformedResponse {
        reason: e.to_string(),
    })
}
