//! Final audit summary: oracle-written when possible, rule-based otherwise.
use crate::classify::{group_for, label_for, AuditGroup, UNKNOWN};
use crate::oracle::ReasoningOracle;
use crate::prompts::{self, SummaryPromptInput};
use crate::state::{field_display, field_number, AuditState, Record, StateDelta};
use regex::Regex;
use std::sync::LazyLock;

/// Rated-data fields worth showing in a summary.
const SUMMARY_KEY_FIELDS: &[&str] = &[
    "trackingNumber",
    "invoiceNumber",
    "category",
    "carrierBillWeight",
    "calcBillWeight",
    "actualWeight",
    "carrierZone",
    "calcZone",
    "carrierOriginalService",
    "calcOriginalService",
    "carrierTotalNetCharge",
    "calcTotalNetCharge",
    "carrierTotalDiscountPercentage",
    "calcTotalDiscountPercentage",
    "carrierTotalSurcharges",
    "calcTotalSurcharges",
    "overRated",
    "message",
];

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:•\s*|[-*]\s+)(.+?)\s*$").expect("bullet pattern compiles")
});

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub summary: String,
    pub bullets: Vec<String>,
    pub from_oracle: bool,
}

impl SummaryOutcome {
    pub fn into_delta(self) -> StateDelta {
        StateDelta {
            audit_summary: Some(self.summary),
            summary_bullets: Some(self.bullets),
            ..StateDelta::default()
        }
    }
}

pub struct SummaryGenerator<'a> {
    oracle: &'a dyn ReasoningOracle,
}

impl<'a> SummaryGenerator<'a> {
    pub fn new(oracle: &'a dyn ReasoningOracle) -> Self {
        Self { oracle }
    }

    /// Only called once reasoning is sufficient.
    pub fn summarize(&self, state: &AuditState) -> SummaryOutcome {
        debug_assert!(state.is_sufficient(), "summary before sufficient reasoning");
        let audit_type = state.audit_type.as_deref().unwrap_or(UNKNOWN);
        let combined = state.combined_data();
        let key_fields = key_fields(&combined);
        let input = prompts::render_summary_input(&SummaryPromptInput {
            audit_type,
            error_case: state.error_case.as_deref().unwrap_or("N/A"),
            cause: state.audit_cause.as_deref().unwrap_or("N/A"),
            reasoning: state.reasoning_result.as_deref().unwrap_or("N/A"),
            key_fields: &key_fields,
            parcel: state.parcel_characteristics.as_ref(),
        });

        match self
            .oracle
            .generate(prompts::summary_system_prompt(audit_type), &input)
        {
            Ok(text) if !text.trim().is_empty() => {
                let summary = text.trim().to_string();
                SummaryOutcome {
                    bullets: extract_bullets(&summary),
                    summary,
                    from_oracle: true,
                }
            }
            Ok(_) => {
                tracing::warn!(audit_type, "summary oracle returned nothing, using rule-based summary");
                rule_based(state, &combined)
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::warn!(audit_type, error = %message, "summary oracle failed, using rule-based summary");
                rule_based(state, &combined)
            }
        }
    }
}

fn rule_based(state: &AuditState, combined: &Record) -> SummaryOutcome {
    let summary = rule_based_summary(state, combined);
    SummaryOutcome {
        bullets: extract_bullets(&summary),
        summary,
        from_oracle: false,
    }
}

fn key_fields(combined: &Record) -> Record {
    SUMMARY_KEY_FIELDS
        .iter()
        .filter_map(|field| {
            combined
                .get(*field)
                .map(|value| ((*field).to_string(), value.clone()))
        })
        .collect()
}

/// Deterministic summary built from the known data fields.
pub fn rule_based_summary(state: &AuditState, combined: &Record) -> String {
    let audit_type = state.audit_type.as_deref().unwrap_or(UNKNOWN);
    let label = state
        .audit_category
        .clone()
        .unwrap_or_else(|| label_for(audit_type));
    let carrier_net = field_number(combined, "carrierTotalNetCharge").unwrap_or(0.0);
    let calc_net = field_number(combined, "calcTotalNetCharge").unwrap_or(0.0);
    let overcharge = carrier_net - calc_net;

    let mut out = String::new();
    out.push_str(&format!("**Audit Type**: {label} ({audit_type})\n"));
    out.push_str(&format!("**Finding**: {}\n", state.error_case.as_deref().unwrap_or("N/A")));
    out.push_str(&format!("**Cause**: {}\n", state.audit_cause.as_deref().unwrap_or("N/A")));
    out.push('\n');
    out.push_str("**Key Details**:\n");
    let tracking = if state.tracking_number.is_empty() {
        field_display(combined, "trackingNumber")
    } else {
        state.tracking_number.clone()
    };
    out.push_str(&format!("- Tracking Number: {tracking}\n"));
    out.push_str(&format!("- Invoice Number: {}\n", field_display(combined, "invoiceNumber")));
    out.push_str(&format!("- Ship Date: {}\n", field_display(combined, "shipDate")));
    for (label, line) in group_details(group_for(audit_type), combined) {
        out.push_str(&format!("- {label}: {line}\n"));
    }
    out.push('\n');
    out.push_str("**Charges**:\n");
    out.push_str(&format!("- Carrier Net Charge: {}\n", money(carrier_net)));
    out.push_str(&format!("- Calculated Net Charge: {}\n", money(calc_net)));
    out.push_str(&format!("- Overcharge: {}\n", money(overcharge)));
    out.push('\n');
    let recommendation = if overcharge > 0.0 {
        "File dispute with carrier for refund."
    } else {
        "No action required - charges are correct or undercharged."
    };
    out.push_str(&format!("**Recommendation**: {recommendation}\n"));
    out.push_str(&format!("**Potential Recovery**: {}", money(overcharge.max(0.0))));
    out
}

fn group_details(group: AuditGroup, combined: &Record) -> Vec<(&'static str, String)> {
    let pair = |carrier: &str, calc: &str| {
        format!(
            "carrier {} vs calculated {}",
            field_display(combined, carrier),
            field_display(combined, calc)
        )
    };
    match group {
        AuditGroup::Weight => vec![
            ("Bill Weight", pair("carrierBillWeight", "calcBillWeight")),
            ("Actual Weight", field_display(combined, "actualWeight")),
            (
                "Dimensions",
                format!(
                    "{} x {} x {}",
                    field_display(combined, "length"),
                    field_display(combined, "width"),
                    field_display(combined, "height")
                ),
            ),
            ("DIM Divisor", pair("carrierDimDivisor", "calcDimDivisor")),
        ],
        AuditGroup::Discount => vec![(
            "Total Discount %",
            pair("carrierTotalDiscountPercentage", "calcTotalDiscountPercentage"),
        )],
        AuditGroup::Rate => vec![("List Rate", pair("carrierListRate", "calcListRate"))],
        AuditGroup::Surcharge => vec![
            (
                "Total Surcharges",
                pair("carrierTotalSurcharges", "calcTotalSurcharges"),
            ),
            (
                "Fuel Amount",
                pair(
                    "carrierTransportationFuelAmount",
                    "calcTransportationFuelAmount",
                ),
            ),
        ],
        AuditGroup::Transportation => vec![(
            "Net Transportation",
            pair(
                "carrierNetTransportationCharge",
                "calcNetTransportationCharge",
            ),
        )],
        AuditGroup::NoAudit | AuditGroup::Error | AuditGroup::Unknown => Vec::new(),
    }
}

fn money(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${amount:.2}")
    }
}

/// Lines starting with `•`, or `-`/`*` plus whitespace, without the marker.
pub fn extract_bullets(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| BULLET.captures(line))
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
