//! Builds a pipeline from a validated config.
use crate::config::{AuditConfig, DataServiceConfig, DataServiceKind, OracleConfig, OracleKind};
use crate::enrichment::FieldSourceTable;
use crate::facade::{DataService, FixtureDataService, HttpDataService};
use crate::oracle::{CommandOracle, HttpOracle, HttpOracleConfig, ReasoningOracle, UnavailableOracle};
use crate::oracle_log::{LoggedOracle, OracleCallKind};
use crate::pipeline::AuditPipeline;
use crate::requirements::RequirementTable;
use anyhow::{anyhow, Result};
use std::time::Duration;

pub fn build_pipeline(config: &AuditConfig) -> Result<AuditPipeline> {
    let service = build_data_service(&config.data_service)?;
    let reasoning = build_oracle(config, OracleCallKind::Reasoning)?;
    let summary = build_oracle(config, OracleCallKind::Summary)?;
    Ok(AuditPipeline::new(service, reasoning, summary)
        .with_requirements(RequirementTable::with_overrides(&config.requirements))
        .with_field_sources(FieldSourceTable::with_overrides(&config.field_sources))
        .with_max_iterations(config.max_enrichment_iterations))
}

fn build_data_service(config: &DataServiceConfig) -> Result<Box<dyn DataService>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.kind {
        DataServiceKind::Http => {
            let base_url = config
                .base_url
                .as_deref()
                .ok_or_else(|| anyhow!("data_service.base_url is not set"))?;
            let api_key = env_nonempty(&config.api_key_env);
            if api_key.is_none() {
                tracing::debug!(env = %config.api_key_env, "no data service API key set");
            }
            tracing::debug!(base_url, "using HTTP data service");
            Ok(Box::new(HttpDataService::new(base_url, api_key, timeout)))
        }
        DataServiceKind::Fixtures => {
            let dir = config
                .fixtures_dir
                .as_ref()
                .ok_or_else(|| anyhow!("data_service.fixtures_dir is not set"))?;
            tracing::debug!(dir = %dir.display(), "using fixture data service");
            Ok(Box::new(FixtureDataService::new(dir.clone())))
        }
    }
}

fn build_oracle(config: &AuditConfig, kind: OracleCallKind) -> Result<Box<dyn ReasoningOracle>> {
    let oracle = oracle_backend(&config.oracle, kind)?;
    match &config.oracle_log {
        Some(path) if config.oracle.kind != OracleKind::None => {
            Ok(Box::new(LoggedOracle::new(oracle, kind, path.clone())))
        }
        _ => Ok(oracle),
    }
}

fn oracle_backend(config: &OracleConfig, kind: OracleCallKind) -> Result<Box<dyn ReasoningOracle>> {
    match config.kind {
        OracleKind::None => Ok(Box::new(UnavailableOracle)),
        OracleKind::Command => {
            let command = config
                .command
                .clone()
                .ok_or_else(|| anyhow!("oracle.command is not set"))?;
            Ok(Box::new(CommandOracle::new(command)))
        }
        OracleKind::Http => {
            let api_key = env_nonempty(&config.api_key_env)
                .ok_or_else(|| anyhow!("{} is not set", config.api_key_env))?;
            let model = config
                .model
                .clone()
                .ok_or_else(|| anyhow!("oracle.model is not set"))?;
            let temperature = match kind {
                OracleCallKind::Reasoning => config.reasoning_temperature,
                OracleCallKind::Summary => config.summary_temperature,
            };
            Ok(Box::new(HttpOracle::new(HttpOracleConfig {
                base_url: config.base_url.clone(),
                api_key,
                model,
                temperature,
                max_tokens: config.max_tokens,
                max_retries: config.max_retries,
                timeout: Duration::from_secs(config.timeout_secs),
            })))
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::state::AuditRequest;

    #[test]
    fn fixture_config_builds_a_runnable_pipeline() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("get_rated_data.json"),
            r#"{"*": {"category": "Matched"}}"#,
        )
        .expect("write fixture");
        let mut config = default_config();
        config.data_service.kind = DataServiceKind::Fixtures;
        config.data_service.fixtures_dir = Some(dir.path().to_path_buf());
        config.max_enrichment_iterations = 1;

        let pipeline = build_pipeline(&config).expect("pipeline");
        assert_eq!(pipeline.max_iterations(), 1);
        let state = pipeline
            .run_audit(&AuditRequest::new("1Z", "C1", "UPS"))
            .expect("matched run");
        assert_eq!(state.audit_type.as_deref(), Some("Matched"));
    }

    #[test]
    fn http_oracle_requires_an_api_key() {
        let mut config = default_config();
        config.oracle.kind = OracleKind::Http;
        config.oracle.model = Some("claude-sonnet-4-5".to_string());
        config.oracle.api_key_env = "PARCEL_AUDIT_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        let err = build_pipeline(&config).err().expect("missing key");
        assert!(err.to_string().contains("PARCEL_AUDIT_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
