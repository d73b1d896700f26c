//! Oracle prompt templates.
//!
//! Templates are compiled in and filled in one pass over `{placeholder}`
//! names, so substituted text is never rescanned.
use crate::classify::BILL_WEIGHT_AUDIT;
use crate::state::Record;
use serde_json::Value;

const REASONING_GENERIC: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/reasoning_generic.md"
));
const REASONING_BILL_WEIGHT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/reasoning_bill_weight.md"
));
const REASONING_INPUT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/reasoning_input.md"
));
const SUMMARY_GENERIC: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/summary_generic.md"
));
const SUMMARY_BILL_WEIGHT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/summary_bill_weight.md"
));
const SUMMARY_INPUT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/summary_input.md"
));

/// Blocks of prior context handed to the reasoning oracle.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningContext<'a> {
    pub audit_category: &'a str,
    pub audit_group: &'a str,
    pub parcel: Option<&'a Record>,
    pub agreements: Option<&'a Record>,
    pub reference_data: Option<&'a Record>,
    pub default_dim_divisors: &'a [Record],
    pub enriched_data: &'a Record,
}

pub fn reasoning_system_prompt(audit_type: &str, context: &ReasoningContext<'_>) -> String {
    let template = if audit_type == BILL_WEIGHT_AUDIT {
        REASONING_BILL_WEIGHT
    } else {
        REASONING_GENERIC
    };
    fill(
        template,
        &[
            ("audit_type", audit_type),
            ("audit_category", context.audit_category),
            ("audit_group", context.audit_group),
        ],
    )
}

pub fn render_reasoning_input(relevant: &Record, context: &ReasoningContext<'_>) -> String {
    let divisors = Value::Array(
        context
            .default_dim_divisors
            .iter()
            .cloned()
            .map(Value::Object)
            .collect(),
    );
    let relevant = pretty_record(Some(relevant));
    let parcel = pretty_record(context.parcel);
    let agreements = pretty_record(context.agreements);
    let reference_data = pretty_record(context.reference_data);
    let divisors = pretty(&divisors);
    let enriched = pretty_record(Some(context.enriched_data));
    fill(
        REASONING_INPUT,
        &[
            ("relevant_data", relevant.as_str()),
            ("parcel_characteristics", parcel.as_str()),
            ("agreements", agreements.as_str()),
            ("reference_data", reference_data.as_str()),
            ("dim_divisors", divisors.as_str()),
            ("enriched_data", enriched.as_str()),
        ],
    )
}

pub fn summary_system_prompt(audit_type: &str) -> &'static str {
    if audit_type == BILL_WEIGHT_AUDIT {
        SUMMARY_BILL_WEIGHT
    } else {
        SUMMARY_GENERIC
    }
}

/// Inputs for the summary request.
#[derive(Debug, Clone, Copy)]
pub struct SummaryPromptInput<'a> {
    pub audit_type: &'a str,
    pub error_case: &'a str,
    pub cause: &'a str,
    pub reasoning: &'a str,
    pub key_fields: &'a Record,
    pub parcel: Option<&'a Record>,
}

pub fn render_summary_input(input: &SummaryPromptInput<'_>) -> String {
    let key_fields = pretty_record(Some(input.key_fields));
    let parcel = pretty_record(input.parcel);
    fill(
        SUMMARY_INPUT,
        &[
            ("audit_type", input.audit_type),
            ("error_case", input.error_case),
            ("cause", input.cause),
            ("reasoning", input.reasoning),
            ("key_fields", key_fields.as_str()),
            ("parcel", parcel.as_str()),
        ],
    )
}

/// Replace each `{name}` in `template` with its value. Unknown names and
/// stray braces are kept as written.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find(|(name, _)| {
            tail.strip_prefix(*name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn pretty_record(record: Option<&Record>) -> String {
    match record {
        Some(record) if !record.is_empty() => pretty(&Value::Object(record.clone())),
        _ => "(none)".to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
