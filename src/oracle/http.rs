//! Anthropic messages API backend.
use super::ReasoningOracle;
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::thread;
use std::time::{Duration, Instant};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpOracleConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub timeout: Duration,
}

pub struct HttpOracle {
    agent: ureq::Agent,
    config: HttpOracleConfig,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            config,
        }
    }

    fn request_body(&self, system_prompt: &str, input: &str) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": system_prompt,
            "messages": [{ "role": "user", "content": input }],
        })
    }

    fn send(&self, body: &Value) -> std::result::Result<Value, ureq::Error> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let mut response = self
            .agent
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send_json(body)?;
        response.body_mut().read_json::<Value>()
    }
}

impl ReasoningOracle for HttpOracle {
    fn generate(&self, system_prompt: &str, input: &str) -> Result<String> {
        let body = self.request_body(system_prompt, input);
        let start = Instant::now();
        let mut attempt = 0;
        loop {
            match self.send(&body) {
                Ok(response) => {
                    let text = response_text(&response)?;
                    tracing::info!(
                        elapsed_ms = start.elapsed().as_millis(),
                        attempt,
                        response_bytes = text.len(),
                        "lm invoke complete"
                    );
                    return Ok(text);
                }
                Err(err) if attempt < self.config.max_retries && is_retryable(&err) => {
                    let delay = retry_delay(attempt);
                    tracing::warn!(attempt, error = %err, ?delay, "lm request failed, retrying");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("anthropic messages request after {} attempt(s)", attempt + 1)
                    });
                }
            }
        }
    }
}

/// Exponential backoff from `RETRY_BASE_DELAY`, capped at `RETRY_MAX_DELAY`.
fn retry_delay(attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| RETRY_BASE_DELAY.checked_mul(factor))
        .map_or(RETRY_MAX_DELAY, |delay| delay.min(RETRY_MAX_DELAY))
}

fn is_retryable(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::StatusCode(code) => *code == 429 || *code >= 500,
        _ => true,
    }
}

/// Concatenated text blocks of a messages API response.
fn response_text(response: &Value) -> Result<String> {
    let blocks = response
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("messages response has no content array"))?;
    let text: Vec<&str> = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return Err(anyhow!("messages response has no text blocks"));
    }
    Ok(text.join(""))
}
