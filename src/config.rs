//! Audit configuration.
//!
//! A JSON document controls the enrichment cap, the data service and oracle
//! backends, and overrides for the required-field and field-source tables.
//! Resolution order is defaults, then the config file, then environment
//! variables, then CLI flags (applied by the caller).
use crate::enrichment::DataSource;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_MAX_ENRICHMENT_ITERATIONS: u32 = 3;
pub const MAX_ENRICHMENT_ITERATIONS_LIMIT: u32 = 20;
pub const MAX_ORACLE_RETRIES_LIMIT: u32 = 8;

pub const ENV_DATA_URL: &str = "PARCEL_AUDIT_DATA_URL";
pub const ENV_FIXTURES: &str = "PARCEL_AUDIT_FIXTURES";
pub const ENV_LM_COMMAND: &str = "PARCEL_AUDIT_LM_COMMAND";
pub const ENV_MAX_ITERATIONS: &str = "PARCEL_AUDIT_MAX_ITERATIONS";

const CONFIG_DIR_NAME: &str = "parcel-audit";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    pub schema_version: u32,
    #[serde(default = "default_max_iterations")]
    pub max_enrichment_iterations: u32,
    #[serde(default)]
    pub data_service: DataServiceConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Audit type to required fields, replacing the built-in entry per type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requirements: BTreeMap<String, Vec<String>>,
    /// Field to data source, replacing the built-in entry per field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_sources: BTreeMap<String, DataSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataServiceKind {
    #[default]
    Http,
    Fixtures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataServiceConfig {
    #[serde(default)]
    pub kind: DataServiceKind,
    #[serde(default = "default_data_url", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_data_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures_dir: Option<PathBuf>,
    #[serde(default = "default_data_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DataServiceConfig {
    fn default() -> Self {
        Self {
            kind: DataServiceKind::Http,
            base_url: default_data_url(),
            api_key_env: default_data_api_key_env(),
            fixtures_dir: None,
            timeout_secs: default_data_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    /// No oracle; reasoning and summary use their deterministic fallbacks.
    #[default]
    None,
    Command,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OracleConfig {
    #[serde(default)]
    pub kind: OracleKind,
    /// Local LM command, split with shell-words. Prompt on stdin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default = "default_oracle_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_oracle_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_reasoning_temperature")]
    pub reasoning_temperature: f32,
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: OracleKind::None,
            command: None,
            base_url: default_oracle_url(),
            model: None,
            api_key_env: default_oracle_api_key_env(),
            reasoning_temperature: default_reasoning_temperature(),
            summary_temperature: default_summary_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ENRICHMENT_ITERATIONS
}

fn default_data_url() -> Option<String> {
    Some("http://localhost:8099/aitossx".to_string())
}

fn default_data_api_key_env() -> String {
    "PARCEL_AUDIT_API_KEY".to_string()
}

fn default_data_timeout_secs() -> u64 {
    30
}

fn default_oracle_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_oracle_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_reasoning_temperature() -> f32 {
    0.1
}

fn default_summary_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_max_retries() -> u32 {
    2
}

fn default_oracle_timeout_secs() -> u64 {
    120
}

/// Config used when no file is present.
pub fn default_config() -> AuditConfig {
    AuditConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        max_enrichment_iterations: DEFAULT_MAX_ENRICHMENT_ITERATIONS,
        data_service: DataServiceConfig::default(),
        oracle: OracleConfig::default(),
        requirements: BTreeMap::new(),
        field_sources: BTreeMap::new(),
        oracle_log: None,
    }
}

/// Pretty JSON for a config, suitable as a starting config file.
pub fn config_stub(config: &AuditConfig) -> Result<String> {
    serde_json::to_string_pretty(config).context("serialize config stub")
}

/// `$XDG_CONFIG_HOME/parcel-audit/config.json` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load an explicit config file, else the default one if it exists, else
/// built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<AuditConfig> {
    if let Some(path) = path {
        return read_config(path);
    }
    match default_config_path() {
        Some(path) if path.exists() => read_config(&path),
        _ => Ok(default_config()),
    }
}

pub fn read_config(path: &Path) -> Result<AuditConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: AuditConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

pub fn write_config(path: &Path, config: &AuditConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create config dir")?;
    }
    let text = config_stub(config)?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Apply environment overrides through `lookup` (normally `std::env::var`).
pub fn apply_env_overrides<F>(config: &mut AuditConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_DATA_URL).filter(|value| !value.trim().is_empty()) {
        config.data_service.kind = DataServiceKind::Http;
        config.data_service.base_url = Some(url);
    }
    if let Some(dir) = lookup(ENV_FIXTURES).filter(|value| !value.trim().is_empty()) {
        config.data_service.kind = DataServiceKind::Fixtures;
        config.data_service.fixtures_dir = Some(PathBuf::from(dir));
    }
    if let Some(command) = lookup(ENV_LM_COMMAND).filter(|value| !value.trim().is_empty()) {
        config.oracle.kind = OracleKind::Command;
        config.oracle.command = Some(command);
    }
    if let Some(raw) = lookup(ENV_MAX_ITERATIONS) {
        config.max_enrichment_iterations = raw
            .trim()
            .parse()
            .with_context(|| format!("parse {ENV_MAX_ITERATIONS}={raw:?}"))?;
    }
    Ok(())
}

/// Validate schema, backend settings and table overrides.
pub fn validate_config(config: &AuditConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.max_enrichment_iterations > MAX_ENRICHMENT_ITERATIONS_LIMIT {
        return Err(anyhow!(
            "max_enrichment_iterations must be at most {MAX_ENRICHMENT_ITERATIONS_LIMIT} (got {})",
            config.max_enrichment_iterations
        ));
    }
    validate_data_service(&config.data_service)?;
    validate_oracle(&config.oracle)?;
    for (audit_type, fields) in &config.requirements {
        if audit_type.trim().is_empty() {
            return Err(anyhow!("requirements keys must be non-empty audit types"));
        }
        if fields.iter().any(|field| field.trim().is_empty()) {
            return Err(anyhow!(
                "requirements for {audit_type} contain an empty field name"
            ));
        }
    }
    if config.field_sources.keys().any(|field| field.trim().is_empty()) {
        return Err(anyhow!("field_sources keys must be non-empty field names"));
    }
    Ok(())
}

fn validate_data_service(config: &DataServiceConfig) -> Result<()> {
    match config.kind {
        DataServiceKind::Http => {
            let url = config.base_url.as_deref().unwrap_or("").trim();
            if url.is_empty() {
                return Err(anyhow!("data_service.base_url is required for kind \"http\""));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow!(
                    "data_service.base_url must be an http(s) URL (got {url:?})"
                ));
            }
        }
        DataServiceKind::Fixtures => {
            if config.fixtures_dir.is_none() {
                return Err(anyhow!(
                    "data_service.fixtures_dir is required for kind \"fixtures\""
                ));
            }
        }
    }
    if config.timeout_secs == 0 {
        return Err(anyhow!("data_service.timeout_secs must be positive"));
    }
    Ok(())
}

fn validate_oracle(config: &OracleConfig) -> Result<()> {
    if config.max_retries > MAX_ORACLE_RETRIES_LIMIT {
        return Err(anyhow!(
            "oracle.max_retries must be at most {MAX_ORACLE_RETRIES_LIMIT} (got {})",
            config.max_retries
        ));
    }
    match config.kind {
        OracleKind::None => {}
        OracleKind::Command => {
            let command = config.command.as_deref().unwrap_or("");
            let args = shell_words::split(command)
                .with_context(|| format!("parse oracle.command: {command}"))?;
            let program = args
                .first()
                .ok_or_else(|| anyhow!("oracle.command is required for kind \"command\""))?;
            which::which(program)
                .with_context(|| format!("oracle.command program not found: {program}"))?;
        }
        OracleKind::Http => {
            if config.model.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(anyhow!("oracle.model is required for kind \"http\""));
            }
            for (name, value) in [
                ("reasoning_temperature", config.reasoning_temperature),
                ("summary_temperature", config.summary_temperature),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(anyhow!("oracle.{name} must be within 0.0..=1.0 (got {value})"));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
