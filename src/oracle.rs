//! Reasoning oracle backends.
//!
//! The pipeline only sees `ReasoningOracle::generate`: a system instruction
//! plus a rendered input block in, free text out. Backends are a local
//! command (prompt on stdin, response on stdout) or the Anthropic messages
//! API over HTTP. Call-level timeout and retry live in the backend.
use anyhow::{anyhow, Result};

mod command;
mod http;
mod response;

pub use command::CommandOracle;
pub use http::{HttpOracle, HttpOracleConfig};
pub use response::parse_verdict;

pub trait ReasoningOracle {
    fn generate(&self, system_prompt: &str, input: &str) -> Result<String>;
}

/// Stand-in used when no oracle is configured; every call fails, which
/// sends reasoning and summary down their deterministic fallbacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableOracle;

impl ReasoningOracle for UnavailableOracle {
    fn generate(&self, _system_prompt: &str, _input: &str) -> Result<String> {
        Err(anyhow!("no reasoning oracle configured"))
    }
}

impl<T: ReasoningOracle + ?Sized> ReasoningOracle for Box<T> {
    fn generate(&self, system_prompt: &str, input: &str) -> Result<String> {
        (**self).generate(system_prompt, input)
    }
}
