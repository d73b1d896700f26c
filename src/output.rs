//! Result projection and report rendering for the CLI.
use crate::state::AuditState;
use anyhow::{Context, Result};
use serde::Serialize;

/// Caller-facing view of a finished (or aborted) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditResult {
    pub tracking_number: String,
    pub audit_type: Option<String>,
    pub audit_category: Option<String>,
    pub audit_group: Option<String>,
    pub audit_cause: Option<String>,
    pub error_case: Option<String>,
    pub audit_summary: Option<String>,
    pub summary_bullets: Vec<String>,
    pub classification_confidence: f64,
    pub enrichment_iterations: u32,
    pub missing_fields: Vec<String>,
    pub error: Option<String>,
}

impl AuditResult {
    pub fn from_state(state: &AuditState) -> Self {
        Self {
            tracking_number: state.tracking_number.clone(),
            audit_type: state.audit_type.clone(),
            audit_category: state.audit_category.clone(),
            audit_group: state.audit_group.clone(),
            audit_cause: state.audit_cause.clone(),
            error_case: state.error_case.clone(),
            audit_summary: state.audit_summary.clone(),
            summary_bullets: state.summary_bullets.clone(),
            classification_confidence: state.classification_confidence,
            enrichment_iterations: state.enrichment_iterations,
            missing_fields: state.missing_fields.iter().cloned().collect(),
            error: state.error.clone(),
        }
    }
}

/// Plain-text report, one `key: value` line per populated field, then the
/// summary body.
pub fn render_report(result: &AuditResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("tracking number: {}\n", result.tracking_number));
    let audit_type = result.audit_type.as_deref().unwrap_or("N/A");
    match &result.audit_category {
        Some(category) => {
            out.push_str(&format!("audit type: {audit_type} ({category})\n"));
        }
        None => {
            out.push_str(&format!("audit type: {audit_type}\n"));
        }
    }
    if let Some(group) = &result.audit_group {
        out.push_str(&format!("group: {group}\n"));
    }
    out.push_str(&format!("confidence: {:.2}\n", result.classification_confidence));
    out.push_str(&format!("enrichment iterations: {}\n", result.enrichment_iterations));
    if let Some(error_case) = &result.error_case {
        out.push_str(&format!("error case: {error_case}\n"));
    }
    if let Some(cause) = &result.audit_cause {
        out.push_str(&format!("cause: {cause}\n"));
    }
    if !result.missing_fields.is_empty() {
        out.push_str(&format!("missing: {}\n", result.missing_fields.join(", ")));
    }
    if let Some(error) = &result.error {
        out.push_str(&format!("error: {error}\n"));
    }
    if let Some(summary) = &result.audit_summary {
        out.push('\n');
        out.push_str(summary.trim_end());
        out.push('\n');
    }
    out
}

pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize output")
}

pub fn to_json_line<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("serialize output")
}
