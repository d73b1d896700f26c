//! Rule-based audit classification.
//!
//! Maps the rated-data category code to a normalized audit type, label, group
//! and confidence. When no code is present the type is inferred from the
//! carrier vs calculated field deltas using a single ordered decision table.
use crate::state::{field_number, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MATCHED: &str = "Matched";
pub const EXCEPTION: &str = "EXCEPTION";
pub const BILL_WEIGHT_AUDIT: &str = "BILL_WEIGHT_AUDIT";
pub const UNKNOWN: &str = "UNKNOWN";

/// Discrepancy family an audit type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditGroup {
    Discount,
    Weight,
    Rate,
    Transportation,
    Surcharge,
    NoAudit,
    Error,
    Unknown,
}

impl AuditGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discount => "DISCOUNT",
            Self::Weight => "WEIGHT",
            Self::Rate => "RATE",
            Self::Transportation => "TRANSPORTATION",
            Self::Surcharge => "SURCHARGE",
            Self::NoAudit => "NO_AUDIT",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "DISCOUNT" => Self::Discount,
            "WEIGHT" => Self::Weight,
            "RATE" => Self::Rate,
            "TRANSPORTATION" => Self::Transportation,
            "SURCHARGE" => Self::Surcharge,
            "NO_AUDIT" => Self::NoAudit,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for AuditGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const KNOWN_TYPES: &[(&str, &str, AuditGroup)] = &[
    (
        "BASE_DISCOUNTS_PERCENTAGE_AUDIT",
        "Base Discount Percentage Audit",
        AuditGroup::Discount,
    ),
    (
        "DISCOUNTS_PERCENTAGE_AUDIT",
        "Discount Percentage Audit",
        AuditGroup::Discount,
    ),
    (
        "EARNED_DISCOUNTS_PERCENTAGE_AUDIT",
        "Earned Discount Percentage Audit",
        AuditGroup::Discount,
    ),
    (BILL_WEIGHT_AUDIT, "Bill Weight Audit", AuditGroup::Weight),
    ("LIST_RATE_AUDIT", "List Rate Audit", AuditGroup::Rate),
    ("LIST_RATE_NULL_AUDIT", "List Rate Null Audit", AuditGroup::Rate),
    (
        "MWT_LIST_RATE_AUDIT",
        "Multi-Weight List Rate Audit",
        AuditGroup::Rate,
    ),
    (
        "NET_TRANSPORTATION_AUDIT",
        "Net Transportation Audit",
        AuditGroup::Transportation,
    ),
    ("SURCHARGE_AUDIT", "Surcharge Audit", AuditGroup::Surcharge),
    (
        "SURCHARGE_APPLICABILITY_AUDIT",
        "Surcharge Applicability Audit",
        AuditGroup::Surcharge,
    ),
    ("SURCHARGE_NULL_AUDIT", "Surcharge Null Audit", AuditGroup::Surcharge),
    ("FUEL_SURCHARGE_AUDIT", "Fuel Surcharge Audit", AuditGroup::Surcharge),
    (MATCHED, "Matched - No Discrepancy", AuditGroup::NoAudit),
    (EXCEPTION, "Exception", AuditGroup::Error),
];

/// Result of classifying one rated-data record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub audit_type: String,
    pub audit_category: String,
    pub audit_group: AuditGroup,
    pub confidence: f64,
    /// True when the type came from field deltas rather than a category code.
    pub inferred: bool,
}

/// Canonical spelling for a raw category code.
///
/// Exact match first, then case-insensitive; unknown codes come back trimmed.
pub fn normalize_audit_type(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN.to_string();
    }
    if let Some((code, _, _)) = KNOWN_TYPES.iter().find(|(code, _, _)| *code == trimmed) {
        return (*code).to_string();
    }
    if let Some((code, _, _)) = KNOWN_TYPES
        .iter()
        .find(|(code, _, _)| code.eq_ignore_ascii_case(trimmed))
    {
        return (*code).to_string();
    }
    trimmed.to_string()
}

pub fn is_known_type(audit_type: &str) -> bool {
    KNOWN_TYPES.iter().any(|(code, _, _)| *code == audit_type)
}

pub fn group_for(audit_type: &str) -> AuditGroup {
    KNOWN_TYPES
        .iter()
        .find(|(code, _, _)| *code == audit_type)
        .map(|(_, _, group)| *group)
        .unwrap_or(AuditGroup::Unknown)
}

pub fn label_for(audit_type: &str) -> String {
    KNOWN_TYPES
        .iter()
        .find(|(code, _, _)| *code == audit_type)
        .map(|(_, label, _)| (*label).to_string())
        .unwrap_or_else(|| format!("Unknown: {audit_type}"))
}

/// Classify a rated-data record. Missing records classify as `UNKNOWN`.
pub fn classify(rated_data: Option<&Record>) -> Classification {
    let Some(rated) = rated_data else {
        return classification(UNKNOWN.to_string(), true);
    };
    match category_code(rated) {
        Some(code) => classification(normalize_audit_type(&code), false),
        None => classification(infer_audit_type(rated).to_string(), true),
    }
}

fn classification(audit_type: String, inferred: bool) -> Classification {
    let known = is_known_type(&audit_type);
    Classification {
        audit_category: label_for(&audit_type),
        audit_group: group_for(&audit_type),
        confidence: if known { 1.0 } else { 0.5 },
        inferred,
        audit_type,
    }
}

fn category_code(rated: &Record) -> Option<String> {
    match rated.get("category")? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    }
}

fn amount(rated: &Record, key: &str) -> f64 {
    field_number(rated, key).unwrap_or(0.0)
}

fn differs(rated: &Record, carrier_key: &str, calc_key: &str) -> bool {
    amount(rated, carrier_key) != amount(rated, calc_key)
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => {
            let text = text.trim();
            !text.is_empty() && !text.eq_ignore_ascii_case("false") && text != "0"
        }
        _ => false,
    }
}

/// Ordered decision table over carrier vs calculated field deltas.
///
/// Absent numbers compare as zero; the first matching rule wins.
pub fn infer_audit_type(rated: &Record) -> &'static str {
    if differs(rated, "carrierBillWeight", "calcBillWeight") {
        return BILL_WEIGHT_AUDIT;
    }

    let carrier_list = amount(rated, "carrierListRate");
    let calc_list = amount(rated, "calcListRate");
    if carrier_list != 0.0 && calc_list != 0.0 && carrier_list != calc_list {
        return "LIST_RATE_AUDIT";
    }
    if carrier_list != 0.0 && calc_list == 0.0 {
        return "LIST_RATE_NULL_AUDIT";
    }

    if differs(
        rated,
        "carrierTotalDiscountPercentage",
        "calcTotalDiscountPercentage",
    ) {
        if differs(
            rated,
            "carrierBaseDiscountEffectivePercentage",
            "calcBaseDiscountEffectivePercentage",
        ) {
            return "BASE_DISCOUNTS_PERCENTAGE_AUDIT";
        }
        if differs(
            rated,
            "carrierEarnedDiscountEffectivePercentage",
            "calcEarnedDiscountEffectivePercentage",
        ) {
            return "EARNED_DISCOUNTS_PERCENTAGE_AUDIT";
        }
        return "DISCOUNTS_PERCENTAGE_AUDIT";
    }

    if differs(rated, "carrierTotalSurcharges", "calcTotalSurcharges") {
        if differs(
            rated,
            "carrierTransportationFuelAmount",
            "calcTransportationFuelAmount",
        ) {
            return "FUEL_SURCHARGE_AUDIT";
        }
        return "SURCHARGE_AUDIT";
    }

    if differs(
        rated,
        "carrierNetTransportationCharge",
        "calcNetTransportationCharge",
    ) {
        return "NET_TRANSPORTATION_AUDIT";
    }

    if !differs(rated, "carrierTotalNetCharge", "calcTotalNetCharge") {
        return MATCHED;
    }

    if truthy(rated.get("overRated")) {
        return EXCEPTION;
    }

    UNKNOWN
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
