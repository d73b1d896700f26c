//! CLI argument parsing for the audit workflow.
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "paudit",
    version,
    about = "Root-cause audits for parcel invoice discrepancies",
    after_help = "Commands:\n  audit --tracking-number <T> --client-id <C> --carrier-id <K>  Audit one shipment\n  batch --input <file>                 Audit every request in a JSON array\n  classify --rated-data <file>         Classify a rated-data record offline\n  requirements                          Show required fields and their sources\n  config                                Print the effective configuration\n\nExamples:\n  paudit audit --fixtures ./fixtures --tracking-number 1Z999AA10123456784 --client-id C100 --carrier-id UPS\n  paudit audit --lm 'llm -m claude' --output json --tracking-number 1Z999 --client-id C100 --carrier-id UPS\n  paudit batch --fixtures ./fixtures --input requests.json\n  paudit requirements --audit-type BILL_WEIGHT_AUDIT",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Audit(AuditArgs),
    Batch(BatchArgs),
    Classify(ClassifyArgs),
    Requirements(RequirementsArgs),
    Config(ConfigArgs),
}

/// Settings shared by every command that builds a pipeline. Flags win over
/// environment and config file.
#[derive(Args, Debug, Clone, Default)]
pub struct RuntimeArgs {
    /// Config file (default: the user config dir, when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Answer data calls from fixture files in DIR
    #[arg(long, value_name = "DIR", conflicts_with = "data_url")]
    pub fixtures: Option<PathBuf>,

    /// Base URL of the HTTP data service
    #[arg(long, value_name = "URL")]
    pub data_url: Option<String>,

    /// LM command for reasoning and summaries (prompt on stdin)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Maximum enrichment passes before aborting
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<u32>,

    /// Append one JSON line per oracle call to PATH
    #[arg(long, value_name = "PATH")]
    pub oracle_log: Option<PathBuf>,

    /// Emit a verbose transcript of the workflow
    #[arg(long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// Result projection as JSON
    Json,
    /// Full run state as JSON
    State,
}

/// Audit a single shipment.
#[derive(Parser, Debug)]
#[command(about = "Audit one shipment")]
pub struct AuditArgs {
    #[arg(long, value_name = "TRACKING")]
    pub tracking_number: String,

    #[arg(long, value_name = "ID")]
    pub client_id: String,

    #[arg(long, value_name = "ID")]
    pub carrier_id: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Print one JSON line per step delta before the final output
    #[arg(long)]
    pub stream: bool,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Audit every request in a JSON array file")]
pub struct BatchArgs {
    /// JSON array of {tracking_number, client_id, carrier_id}
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Classify a rated-data record without fetching anything")]
pub struct ClassifyArgs {
    /// JSON object with rated-data fields
    #[arg(long, value_name = "FILE")]
    pub rated_data: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Show required fields per audit type and where each is fetched from")]
pub struct RequirementsArgs {
    /// Only show this audit type
    #[arg(long, value_name = "TYPE")]
    pub audit_type: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Print the effective configuration")]
pub struct ConfigArgs {
    /// Write the configuration to PATH instead of printing it
    #[arg(long, value_name = "PATH")]
    pub write: Option<PathBuf>,

    /// Overwrite an existing file at the --write path
    #[arg(long, requires = "write")]
    pub force: bool,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}
