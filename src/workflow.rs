use crate::classify::{self, normalize_audit_type};
use crate::cli::{
    AuditArgs, BatchArgs, ClassifyArgs, ConfigArgs, OutputFormat, RequirementsArgs, RuntimeArgs,
};
use crate::config::{self, AuditConfig, DataServiceKind, OracleKind};
use crate::enrichment::FieldSourceTable;
use crate::error::AuditError;
use crate::output::{render_report, to_json_line, to_json_pretty, AuditResult};
use crate::requirements::RequirementTable;
use crate::runtime::build_pipeline;
use crate::state::{AuditRequest, AuditState, Record};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;

/// Effective config: file, then environment, then flags.
pub fn resolve_config(args: &RuntimeArgs) -> Result<AuditConfig> {
    let mut config = config::load_config(args.config.as_deref())?;
    config::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    apply_flags(&mut config, args);
    Ok(config)
}

fn apply_flags(config: &mut AuditConfig, args: &RuntimeArgs) {
    if let Some(url) = &args.data_url {
        config.data_service.kind = DataServiceKind::Http;
        config.data_service.base_url = Some(url.clone());
    }
    if let Some(dir) = &args.fixtures {
        config.data_service.kind = DataServiceKind::Fixtures;
        config.data_service.fixtures_dir = Some(dir.clone());
    }
    if let Some(command) = &args.lm {
        config.oracle.kind = OracleKind::Command;
        config.oracle.command = Some(command.clone());
    }
    if let Some(max) = args.max_iterations {
        config.max_enrichment_iterations = max;
    }
    if let Some(path) = &args.oracle_log {
        config.oracle_log = Some(path.clone());
    }
}

fn resolve_validated(args: &RuntimeArgs) -> Result<AuditConfig> {
    let config = resolve_config(args)?;
    config::validate_config(&config).context("invalid configuration")?;
    Ok(config)
}

pub fn run_audit(args: AuditArgs) -> Result<()> {
    let config = resolve_validated(&args.runtime)?;
    let pipeline = build_pipeline(&config)?;
    let request = AuditRequest::new(args.tracking_number, args.client_id, args.carrier_id);
    let mut run = pipeline.start(&request)?;
    for update in run.by_ref() {
        if args.stream {
            println!("{}", to_json_line(&update)?);
        }
    }
    tracing::debug!(
        reason_passes = run.reason_passes(),
        max_iterations = pipeline.max_iterations(),
        "audit run drained"
    );
    match run.finish() {
        Ok(state) => print_outcome(&state, args.output),
        Err(err) => {
            if let Some(state) = err.state() {
                print_outcome(state, args.output)?;
            }
            Err(err.into())
        }
    }
}

fn print_outcome(state: &AuditState, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", render_report(&AuditResult::from_state(state))),
        OutputFormat::Json => println!("{}", to_json_pretty(&AuditResult::from_state(state))?),
        OutputFormat::State => println!("{}", to_json_pretty(state)?),
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct BatchTally {
    completed: usize,
    exhausted: usize,
    invalid: usize,
}

impl BatchTally {
    fn failed(&self) -> usize {
        self.exhausted + self.invalid
    }
}

pub fn run_batch(args: BatchArgs) -> Result<()> {
    let config = resolve_validated(&args.runtime)?;
    let pipeline = build_pipeline(&config)?;
    let bytes =
        fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;
    let requests: Vec<AuditRequest> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse batch requests {}", args.input.display()))?;

    tracing::info!(
        requests = requests.len(),
        max_iterations = pipeline.max_iterations(),
        "starting batch"
    );
    let mut tally = BatchTally::default();
    for request in &requests {
        let result = match pipeline.run_audit(request) {
            Ok(state) => {
                tally.completed += 1;
                AuditResult::from_state(&state)
            }
            Err(AuditError::EnrichmentExhausted { state, .. }) => {
                tally.exhausted += 1;
                AuditResult::from_state(&state)
            }
            Err(err @ AuditError::InvalidRequest(_)) => {
                tally.invalid += 1;
                let mut state = AuditState::new(request);
                state.error = Some(err.to_string());
                AuditResult::from_state(&state)
            }
        };
        println!("{}", to_json_line(&result)?);
    }

    eprintln!(
        "audited {}: {} completed, {} exhausted, {} invalid",
        requests.len(),
        tally.completed,
        tally.exhausted,
        tally.invalid
    );
    if tally.failed() > 0 {
        return Err(anyhow!(
            "{} of {} audits did not complete",
            tally.failed(),
            requests.len()
        ));
    }
    Ok(())
}

pub fn run_classify(args: ClassifyArgs) -> Result<()> {
    let bytes = fs::read(&args.rated_data)
        .with_context(|| format!("read {}", args.rated_data.display()))?;
    let rated: Record = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse rated data {}", args.rated_data.display()))?;
    let result = classify::classify(Some(&rated));
    if args.json {
        println!("{}", to_json_pretty(&result)?);
        return Ok(());
    }
    println!("audit type: {}", result.audit_type);
    println!("category: {}", result.audit_category);
    println!("group: {}", result.audit_group);
    println!("confidence: {:.2}", result.confidence);
    println!(
        "source: {}",
        if result.inferred {
            "inferred from carrier vs calculated fields"
        } else {
            "category code"
        }
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct RequiredField {
    field: String,
    source: String,
}

pub fn run_requirements(args: RequirementsArgs) -> Result<()> {
    let config = resolve_config(&args.runtime)?;
    let requirements = RequirementTable::with_overrides(&config.requirements);
    let sources = FieldSourceTable::with_overrides(&config.field_sources);

    let selected = match args.audit_type.as_deref() {
        Some(raw) => {
            let audit_type = normalize_audit_type(raw);
            if !requirements.is_known(&audit_type) {
                return Err(anyhow!("no requirements for audit type {audit_type}"));
            }
            vec![audit_type]
        }
        None => requirements.iter().map(|(audit_type, _)| audit_type.clone()).collect(),
    };

    let table: Vec<(String, Vec<RequiredField>)> = selected
        .into_iter()
        .map(|audit_type| {
            let fields = requirements
                .required_fields(&audit_type)
                .iter()
                .map(|field| RequiredField {
                    field: field.clone(),
                    source: sources.source_for(field).to_string(),
                })
                .collect();
            (audit_type, fields)
        })
        .collect();

    if args.json {
        let map = table
            .into_iter()
            .map(|(audit_type, fields)| serde_json::to_value(fields).map(|value| (audit_type, value)))
            .collect::<serde_json::Result<serde_json::Map<String, serde_json::Value>>>()
            .context("serialize requirements")?;
        println!("{}", to_json_pretty(&map)?);
        return Ok(());
    }
    for (audit_type, fields) in table {
        println!("{audit_type} ({}):", classify::label_for(&audit_type));
        if fields.is_empty() {
            println!("  (no required fields)");
        }
        for field in fields {
            println!("  - {} ({})", field.field, field.source);
        }
    }
    Ok(())
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    let config = resolve_config(&args.runtime)?;
    if let Err(err) = config::validate_config(&config) {
        let message = format!("{err:#}");
        tracing::warn!(error = %message, "effective configuration does not validate");
    }
    match &args.write {
        Some(path) => {
            if path.exists() && !args.force {
                return Err(anyhow!(
                    "config already exists at {} (use --force to overwrite)",
                    path.display()
                ));
            }
            config::write_config(path, &config)?;
            println!("wrote {}", path.display());
        }
        None => print!("{}", config::config_stub(&config)?),
    }
    Ok(())
}
