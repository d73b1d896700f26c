//! HTTP transport for the shipment data service.
use super::DataService;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::time::Duration;

/// Calls `POST {base_url}/tools/{tool}` with the arguments as JSON body.
pub struct HttpDataService {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDataService {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn tool_url(&self, tool: &str) -> String {
        format!("{}/tools/{}", self.base_url, tool)
    }
}

impl DataService for HttpDataService {
    fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value> {
        let url = self.tool_url(tool);
        let mut request = self.agent.post(&url);
        if let Some(key) = self.api_key.as_deref() {
            request = request.header("api_key", key);
        }
        let mut response = request
            .send_json(arguments)
            .with_context(|| format!("POST {url}"))?;
        let body: Value = response
            .body_mut()
            .read_json()
            .with_context(|| format!("decode {tool} response"))?;
        unwrap_tool_result(body)
    }
}

/// Unwraps a `{"content": [{"text": ...}]}` tool-result envelope.
///
/// The text is parsed as JSON when it is JSON; an `isError` envelope becomes
/// an error record. Bare payloads pass through unchanged.
pub(crate) fn unwrap_tool_result(body: Value) -> Result<Value> {
    let Some(content) = body.get("content").and_then(Value::as_array) else {
        return Ok(body);
    };
    let text = content
        .iter()
        .find_map(|item| item.get("text").and_then(Value::as_str))
        .ok_or_else(|| anyhow!("tool result carried no text content"))?;
    if body.get("isError").and_then(Value::as_bool) == Some(true) {
        return Ok(serde_json::json!({ "error": text }));
    }
    Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_payload_passes_through() {
        let body = json!({"carrierBillWeight": 15});
        assert_eq!(unwrap_tool_result(body.clone()).expect("unwrap"), body);
    }

    #[test]
    fn text_envelope_is_parsed() {
        let body = json!({"content": [{"type": "text", "text": "{\"calcBillWeight\": 10}"}]});
        assert_eq!(
            unwrap_tool_result(body).expect("unwrap"),
            json!({"calcBillWeight": 10})
        );
    }

    #[test]
    fn error_envelope_becomes_error_record() {
        let body = json!({"isError": true, "content": [{"text": "not found"}]});
        assert_eq!(
            unwrap_tool_result(body).expect("unwrap"),
            json!({"error": "not found"})
        );
    }

    #[test]
    fn tool_url_joins_base() {
        let service = HttpDataService::new("http://localhost:8099/", None, Duration::from_secs(1));
        assert_eq!(
            service.tool_url("get_rated_data"),
            "http://localhost:8099/tools/get_rated_data"
        );
    }
}
