//! Oracle invocation logging.
//!
//! When an oracle log path is configured, every oracle call appends one line
//! of JSON:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"kind":"reasoning","duration_ms":4200,"outcome":"success",...}
//! {"schema_version":1,"ts":1707900004300,"kind":"summary","duration_ms":3100,"outcome":"failed","error":"..."}
//! ```
//!
//! Logging failures are reported through tracing and never fail the call.
use crate::oracle::ReasoningOracle;
use crate::util::{now_epoch_ms, preview};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Current schema version for oracle log entries.
pub const ORACLE_LOG_SCHEMA_VERSION: u32 = 1;

const PREVIEW_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleCallKind {
    Reasoning,
    Summary,
}

impl std::fmt::Display for OracleCallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reasoning => write!(f, "reasoning"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the call started.
    pub ts: u64,

    pub kind: OracleCallKind,

    pub duration_ms: u64,

    pub outcome: OracleOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// First ~500 bytes of the input block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
}

/// Collects timing and previews for a single call.
pub struct OracleLogBuilder {
    start: Instant,
    ts: u64,
    kind: OracleCallKind,
    prompt_preview: Option<String>,
}

impl OracleLogBuilder {
    pub fn new(kind: OracleCallKind) -> Self {
        Self {
            start: Instant::now(),
            ts: now_epoch_ms(),
            kind,
            prompt_preview: None,
        }
    }

    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        self.prompt_preview = Some(preview(prompt, PREVIEW_BYTES));
        self
    }

    pub fn success(self, response: &str) -> OracleLogEntry {
        let response_preview = Some(preview(response, PREVIEW_BYTES));
        self.build(OracleOutcome::Success, None, response_preview)
    }

    pub fn failed(self, error: impl Into<String>) -> OracleLogEntry {
        self.build(OracleOutcome::Failed, Some(error.into()), None)
    }

    fn build(
        self,
        outcome: OracleOutcome,
        error: Option<String>,
        response_preview: Option<String>,
    ) -> OracleLogEntry {
        OracleLogEntry {
            schema_version: ORACLE_LOG_SCHEMA_VERSION,
            ts: self.ts,
            kind: self.kind,
            duration_ms: self.start.elapsed().as_millis() as u64,
            outcome,
            error,
            prompt_preview: self.prompt_preview,
            response_preview,
        }
    }
}

pub fn append_oracle_log(path: &Path, entry: &OracleLogEntry) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create oracle log directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open oracle log for append: {}", path.display()))?;
    let line = serde_json::to_string(entry).context("serialize oracle log entry")?;
    writeln!(file, "{line}").context("write oracle log entry")?;
    Ok(())
}

/// Oracle wrapper that appends one log entry per call.
pub struct LoggedOracle<O> {
    inner: O,
    kind: OracleCallKind,
    path: PathBuf,
}

impl<O: ReasoningOracle> LoggedOracle<O> {
    pub fn new(inner: O, kind: OracleCallKind, path: PathBuf) -> Self {
        Self { inner, kind, path }
    }
}

impl<O: ReasoningOracle> ReasoningOracle for LoggedOracle<O> {
    fn generate(&self, system_prompt: &str, input: &str) -> Result<String> {
        let builder = OracleLogBuilder::new(self.kind).with_prompt_preview(input);
        let result = self.inner.generate(system_prompt, input);
        let entry = match &result {
            Ok(text) => builder.success(text),
            Err(err) => builder.failed(format!("{err:#}")),
        };
        if let Err(err) = append_oracle_log(&self.path, &entry) {
            let message = format!("{err:#}");
            tracing::warn!(kind = %self.kind, error = %message, "failed to append oracle log");
        }
        result
    }
}
