//! Root-cause audits for parcel invoice discrepancies.
//!
//! The binary wires the CLI to a synchronous audit pipeline: fetch, classify,
//! fetch reference data, reason, then summarize, enrich and retry, or abort.
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod classify;
mod cli;
mod config;
mod enrichment;
mod error;
mod facade;
mod oracle;
mod oracle_log;
mod output;
mod pipeline;
mod prompts;
mod reasoning;
mod requirements;
mod runtime;
mod state;
mod summary;
#[cfg(test)]
mod test_support;
mod util;
mod workflow;

/// Filter directives are read from this variable.
const LOG_ENV: &str = "PARCEL_AUDIT_LOG";

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    init_tracing(verbose(&args.command));
    match args.command {
        cli::Command::Audit(args) => workflow::run_audit(args),
        cli::Command::Batch(args) => workflow::run_batch(args),
        cli::Command::Classify(args) => workflow::run_classify(args),
        cli::Command::Requirements(args) => workflow::run_requirements(args),
        cli::Command::Config(args) => workflow::run_config(args),
    }
}

fn verbose(command: &cli::Command) -> bool {
    match command {
        cli::Command::Audit(args) => args.runtime.verbose,
        cli::Command::Batch(args) => args.runtime.verbose,
        cli::Command::Requirements(args) => args.runtime.verbose,
        cli::Command::Config(args) => args.runtime.verbose,
        cli::Command::Classify(_) => false,
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
