//! Parsing of oracle replies into a reasoning verdict.
use serde::Deserialize;
use serde_json::Value;

/// Fielded reasoning reply. Unstructured replies fold the raw text into both
/// `cause` and `reasoning`.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleVerdict {
    pub status: Option<String>,
    pub cause: String,
    pub error_case: Option<String>,
    pub reasoning: String,
    pub structured: bool,
}

pub fn parse_verdict(raw: &str) -> OracleVerdict {
    let fields = serde_json::from_str::<Value>(extract_json(raw))
        .ok()
        .filter(Value::is_object)
        .or_else(|| extract_json_from_text(raw));
    let Some(Value::Object(fields)) = fields else {
        let text = raw.trim().to_string();
        return OracleVerdict {
            status: None,
            cause: text.clone(),
            error_case: None,
            reasoning: text,
            structured: false,
        };
    };

    let text_field = |names: &[&str]| {
        names.iter().find_map(|name| {
            fields
                .get(*name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
    };
    let cause = text_field(&["cause", "audit_cause", "reasoning"]);
    let reasoning = text_field(&["reasoning", "cause"]);
    let fallback = raw.trim().to_string();
    OracleVerdict {
        status: text_field(&["status"]),
        error_case: text_field(&["error_case", "errorCase"]),
        cause: cause.unwrap_or_else(|| fallback.clone()),
        reasoning: reasoning.unwrap_or(fallback),
        structured: true,
    }
}

/// Strip markdown code fences around a JSON payload.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip language identifier if present
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    text
}

/// First JSON object embedded anywhere in free text.
fn extract_json_from_text(raw: &str) -> Option<Value> {
    for (idx, ch) in raw.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(&raw[idx..]);
        if let Ok(value @ Value::Object(_)) = Value::deserialize(&mut deserializer) {
            return Some(value);
        }
    }
    None
}
