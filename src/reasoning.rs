//! Cause reasoning over the gathered audit data.
//!
//! `Matched` and `EXCEPTION` resolve without data checks or oracle calls.
//! Every other type must first pass the sufficiency check; only then is the
//! oracle asked for a cause and error case.
use crate::classify::{BILL_WEIGHT_AUDIT, EXCEPTION, MATCHED};
use crate::oracle::{parse_verdict, ReasoningOracle};
use crate::prompts::{self, ReasoningContext};
use crate::requirements::RequirementTable;
use crate::state::{field_display, ReasoningStatus, Record, StateDelta};
use serde_json::Value;
use std::collections::BTreeSet;

pub const MATCHED_RESULT: &str = "No discrepancy found. Carrier charges match calculated charges.";
pub const MATCHED_CAUSE: &str = "Matched - No audit required. Carrier charges are correct.";
pub const MATCHED_ERROR_CASE: &str = "Case 4: No Error - Calculation Correct";
pub const EXCEPTION_ERROR_CASE: &str = "Exception";
pub const NEEDS_ENRICHMENT_ERROR_CASE: &str =
    "Case 3: Improperly Populated Parcel Characteristic (Possible - need invoice details)";
const DEFAULT_EXCEPTION_MESSAGE: &str = "Exception occurred during rating";

/// Fields sent to the oracle for every audit type.
const COMMON_FIELDS: &[&str] = &[
    "trackingNumber",
    "invoiceNumber",
    "category",
    "carrierTotalNetCharge",
    "calcTotalNetCharge",
    "overRated",
    "message",
];

/// Dimensional inputs the bill-weight prompt recomputes from.
const DIM_FIELDS: &[&str] = &[
    "length",
    "width",
    "height",
    "carrierDimDivisor",
    "calcDimDivisor",
    "carrierDimWeight",
    "calcDimWeight",
];

fn context_fields(audit_type: &str) -> &'static [&'static str] {
    if audit_type == BILL_WEIGHT_AUDIT {
        DIM_FIELDS
    } else {
        &[]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningOutcome {
    pub status: ReasoningStatus,
    pub reasoning_result: String,
    pub cause: Option<String>,
    pub error_case: Option<String>,
    pub missing_fields: BTreeSet<String>,
}

impl ReasoningOutcome {
    pub fn into_delta(self) -> StateDelta {
        StateDelta {
            reasoning_status: Some(self.status),
            reasoning_result: Some(self.reasoning_result),
            audit_cause: Some(self.cause),
            error_case: Some(self.error_case),
            missing_fields: Some(self.missing_fields),
            ..StateDelta::default()
        }
    }
}

pub fn synthesized_error_case(audit_type: &str) -> String {
    format!("Case: {audit_type} - Analysis Complete")
}

pub struct CauseReasoner<'a> {
    requirements: &'a RequirementTable,
    oracle: &'a dyn ReasoningOracle,
}

impl<'a> CauseReasoner<'a> {
    pub fn new(requirements: &'a RequirementTable, oracle: &'a dyn ReasoningOracle) -> Self {
        Self {
            requirements,
            oracle,
        }
    }

    pub fn reason(
        &self,
        audit_type: &str,
        combined: &Record,
        context: &ReasoningContext<'_>,
    ) -> ReasoningOutcome {
        if audit_type == MATCHED {
            return ReasoningOutcome {
                status: ReasoningStatus::Sufficient,
                reasoning_result: MATCHED_RESULT.to_string(),
                cause: Some(MATCHED_CAUSE.to_string()),
                error_case: Some(MATCHED_ERROR_CASE.to_string()),
                missing_fields: BTreeSet::new(),
            };
        }
        if audit_type == EXCEPTION {
            let message = combined
                .get("message")
                .and_then(Value::as_str)
                .filter(|text| !text.trim().is_empty())
                .unwrap_or(DEFAULT_EXCEPTION_MESSAGE);
            return ReasoningOutcome {
                status: ReasoningStatus::Sufficient,
                reasoning_result: format!("Exception: {message}"),
                cause: Some(format!("Rating exception: {message}")),
                error_case: Some(EXCEPTION_ERROR_CASE.to_string()),
                missing_fields: BTreeSet::new(),
            };
        }

        let missing = self.requirements.check_sufficiency(audit_type, combined);
        if !missing.is_empty() {
            tracing::info!(audit_type, ?missing, "required fields missing");
            return ReasoningOutcome {
                status: ReasoningStatus::Insufficient,
                reasoning_result: format!("Missing required fields for {audit_type}"),
                cause: None,
                error_case: Some(NEEDS_ENRICHMENT_ERROR_CASE.to_string()),
                missing_fields: missing,
            };
        }

        let relevant = self.relevant_data(audit_type, combined);
        let system_prompt = prompts::reasoning_system_prompt(audit_type, context);
        let input = prompts::render_reasoning_input(&relevant, context);
        match self.oracle.generate(&system_prompt, &input) {
            Ok(raw) => {
                let verdict = parse_verdict(&raw);
                if !verdict.structured {
                    tracing::warn!(audit_type, "oracle reply was not structured, using raw text");
                }
                if verdict.status.as_deref() == Some("insufficient") {
                    tracing::info!(
                        audit_type,
                        "oracle reported insufficient data after required fields were present"
                    );
                }
                let error_case = verdict
                    .error_case
                    .unwrap_or_else(|| synthesized_error_case(audit_type));
                ReasoningOutcome {
                    status: ReasoningStatus::Sufficient,
                    reasoning_result: verdict.reasoning,
                    cause: Some(verdict.cause),
                    error_case: Some(error_case),
                    missing_fields: BTreeSet::new(),
                }
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::warn!(audit_type, error = %message, "reasoning oracle failed, using field comparison");
                let cause = deterministic_cause(audit_type, &relevant, self.requirements);
                ReasoningOutcome {
                    status: ReasoningStatus::Sufficient,
                    reasoning_result: cause.clone(),
                    cause: Some(cause),
                    error_case: Some(synthesized_error_case(audit_type)),
                    missing_fields: BTreeSet::new(),
                }
            }
        }
    }

    /// Common fields, the type's required fields and its context fields,
    /// where present.
    fn relevant_data(&self, audit_type: &str, combined: &Record) -> Record {
        let required = self.requirements.required_fields(audit_type);
        COMMON_FIELDS
            .iter()
            .copied()
            .chain(required.iter().map(String::as_str))
            .chain(context_fields(audit_type).iter().copied())
            .filter_map(|field| {
                combined
                    .get(field)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect()
    }
}

fn deterministic_cause(audit_type: &str, relevant: &Record, requirements: &RequirementTable) -> String {
    let required = requirements.required_fields(audit_type);
    if required.is_empty() {
        return format!("{audit_type}: carrier and calculated charges differ; no oracle analysis available");
    }
    let values: Vec<String> = required
        .iter()
        .map(|field| format!("{field}={}", field_display(relevant, field)))
        .collect();
    format!(
        "{audit_type}: no oracle analysis available; compared {}",
        values.join(", ")
    )
}

#[cfg(test)]
#[path = "reasoning_tests.rs"]
mod tests;
