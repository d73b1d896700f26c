//! Audit run state and the partial updates each pipeline step produces.
//!
//! A run owns exactly one `AuditState`. Steps never replace it; they return a
//! `StateDelta` that is folded in with `AuditState::apply`, which keeps the
//! enrichment store additive and the iteration counter monotonic.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Fetched records are loosely typed JSON objects keyed by field name.
pub type Record = Map<String, Value>;

/// Identity of a single audit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub tracking_number: String,
    pub client_id: String,
    pub carrier_id: String,
}

impl AuditRequest {
    pub fn new(
        tracking_number: impl Into<String>,
        client_id: impl Into<String>,
        carrier_id: impl Into<String>,
    ) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            client_id: client_id.into(),
            carrier_id: carrier_id.into(),
        }
    }
}

/// Whether the gathered data is enough to explain the discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningStatus {
    Sufficient,
    Insufficient,
}

impl std::fmt::Display for ReasoningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sufficient => write!(f, "sufficient"),
            Self::Insufficient => write!(f, "insufficient"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditState {
    pub tracking_number: String,
    pub client_id: String,
    pub carrier_id: String,

    pub rated_data: Option<Record>,
    pub parcel_characteristics: Option<Record>,
    pub agreements: Option<Record>,
    pub reference_data: Option<Record>,
    #[serde(default)]
    pub default_dim_divisors: Vec<Record>,

    pub audit_type: Option<String>,
    pub audit_category: Option<String>,
    pub audit_group: Option<String>,
    #[serde(default)]
    pub classification_confidence: f64,

    pub reasoning_status: Option<ReasoningStatus>,
    pub reasoning_result: Option<String>,
    #[serde(default)]
    pub missing_fields: BTreeSet<String>,
    pub audit_cause: Option<String>,
    pub error_case: Option<String>,

    #[serde(default)]
    pub enrichment_iterations: u32,
    #[serde(default)]
    pub enriched_data: Record,

    pub audit_summary: Option<String>,
    #[serde(default)]
    pub summary_bullets: Vec<String>,

    pub error: Option<String>,
}

impl AuditState {
    /// Fresh state for a request: every optional field empty, zero iterations.
    pub fn new(request: &AuditRequest) -> Self {
        Self {
            tracking_number: request.tracking_number.clone(),
            client_id: request.client_id.clone(),
            carrier_id: request.carrier_id.clone(),
            ..Self::default()
        }
    }

    /// Fold a step's partial update into the running state.
    ///
    /// `enriched_data` is merged key by key (later values win) and never
    /// shrinks. `enrichment_iterations` only moves forward.
    pub fn apply(&mut self, delta: &StateDelta) {
        if let Some(value) = &delta.rated_data {
            self.rated_data = Some(value.clone());
        }
        if let Some(value) = &delta.parcel_characteristics {
            self.parcel_characteristics = Some(value.clone());
        }
        if let Some(value) = &delta.agreements {
            self.agreements = Some(value.clone());
        }
        if let Some(value) = &delta.reference_data {
            self.reference_data = Some(value.clone());
        }
        if let Some(value) = &delta.default_dim_divisors {
            self.default_dim_divisors = value.clone();
        }
        if let Some(value) = &delta.audit_type {
            self.audit_type = Some(value.clone());
        }
        if let Some(value) = &delta.audit_category {
            self.audit_category = Some(value.clone());
        }
        if let Some(value) = &delta.audit_group {
            self.audit_group = Some(value.clone());
        }
        if let Some(value) = delta.classification_confidence {
            self.classification_confidence = value;
        }
        if let Some(value) = delta.reasoning_status {
            self.reasoning_status = Some(value);
        }
        if let Some(value) = &delta.reasoning_result {
            self.reasoning_result = Some(value.clone());
        }
        if let Some(value) = &delta.missing_fields {
            self.missing_fields = value.clone();
        }
        if let Some(value) = &delta.audit_cause {
            self.audit_cause = value.clone();
        }
        if let Some(value) = &delta.error_case {
            self.error_case = value.clone();
        }
        if let Some(value) = delta.enrichment_iterations {
            self.enrichment_iterations = self.enrichment_iterations.max(value);
        }
        if let Some(value) = &delta.enriched_data {
            for (key, entry) in value {
                self.enriched_data.insert(key.clone(), entry.clone());
            }
        }
        if let Some(value) = &delta.audit_summary {
            self.audit_summary = Some(value.clone());
        }
        if let Some(value) = &delta.summary_bullets {
            self.summary_bullets = value.clone();
        }
        if let Some(value) = &delta.error {
            self.error = Some(value.clone());
        }
    }

    /// Parcel characteristics overlaid by rated data, then by any non-null
    /// values gathered through enrichment.
    pub fn combined_data(&self) -> Record {
        let mut combined = self.parcel_characteristics.clone().unwrap_or_default();
        if let Some(rated) = &self.rated_data {
            for (key, value) in rated {
                combined.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &self.enriched_data {
            if !value.is_null() {
                combined.insert(key.clone(), value.clone());
            }
        }
        combined
    }

    pub fn is_sufficient(&self) -> bool {
        self.reasoning_status == Some(ReasoningStatus::Sufficient)
    }
}

/// Partial update returned by one pipeline step.
///
/// `None` leaves the state field untouched. The doubly optional fields can
/// also clear a value (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rated_data: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parcel_characteristics: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreements: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_data: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_dim_divisors: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_status: Option<ReasoningStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_cause: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_case: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_iterations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enriched_data: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_bullets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Numeric view of a loosely typed field: numbers, numeric strings and
/// booleans are accepted, anything else reads as absent.
pub fn field_number(record: &Record, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Human-readable rendering of a field, `N/A` when absent or null.
pub fn field_display(record: &Record, key: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
