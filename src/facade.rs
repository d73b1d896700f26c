//! Data access facade over the external shipment data service.
//!
//! Every named operation fails soft: transport errors and malformed payloads
//! become an `error` key inside the returned record (or an empty list), so a
//! broken fetch reads downstream as ordinarily missing data.
use crate::state::Record;
use anyhow::Result;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Instant;

mod fixtures;
mod http;

pub use fixtures::FixtureDataService;
pub use http::HttpDataService;

pub const TOOL_RATED_DATA: &str = "get_rated_data";
pub const TOOL_PARCEL_CHARACTERISTICS: &str = "get_parcel_characteristic";
pub const TOOL_ADDITIONAL_SERVICES: &str = "get_rated_data_additional_services";
pub const TOOL_AGREEMENTS: &str = "get_agreement_details_json";
pub const TOOL_FULL_TRACKING_ANALYSIS: &str = "get_full_tracking_analysis";
pub const TOOL_DEFAULT_DIM_DIVISORS: &str = "get_default_dim_divisors";
pub const TOOL_FETCH_MISSING_FIELDS: &str = "fetch_missing_fields";

/// Request names that are answered by the full tracking analysis.
const TRACKING_ANALYSIS_FIELDS: &[&str] = &[
    "invoiceDetails",
    "trackingDetails",
    "upsTrackingDetails",
    "invoice_details",
    "tracking_details",
];

/// Raw transport to the data service: one named tool call, JSON in and out.
pub trait DataService {
    fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value>;
}

/// Identifiers available to enrichment fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchContext {
    pub tracking_number: String,
    pub client_id: String,
    pub carrier_id: String,
    pub origin_zip: Option<String>,
    pub destination_zip: Option<String>,
    pub rated_data_id: Option<Value>,
    pub audit_type: String,
}

pub struct DataFacade<'a> {
    service: &'a dyn DataService,
}

impl<'a> DataFacade<'a> {
    pub fn new(service: &'a dyn DataService) -> Self {
        Self { service }
    }

    pub fn get_rated_data(&self, tracking_number: &str) -> Record {
        self.fetch_record(TOOL_RATED_DATA, json!({ "trackingNumber": tracking_number }))
    }

    pub fn get_parcel_characteristics(&self, tracking_number: &str) -> Record {
        self.fetch_record(
            TOOL_PARCEL_CHARACTERISTICS,
            json!({ "trackingNumber": tracking_number }),
        )
    }

    pub fn get_rated_data_additional_services(&self, rated_data_id: &Value) -> Vec<Value> {
        self.fetch_list(
            TOOL_ADDITIONAL_SERVICES,
            json!({ "ratedDataId": rated_data_id }),
        )
    }

    pub fn get_agreements(&self, client_id: &str, carrier_id: &str) -> Record {
        self.fetch_record(
            TOOL_AGREEMENTS,
            json!({ "clientId": client_id, "carrierId": carrier_id }),
        )
    }

    /// Invoice details plus carrier tracking details for a shipment.
    pub fn get_full_tracking_analysis(&self, tracking_number: &str) -> Record {
        self.fetch_record(
            TOOL_FULL_TRACKING_ANALYSIS,
            json!({ "trackingNumber": tracking_number }),
        )
    }

    pub fn get_default_dim_divisors(&self, ship_date: &str) -> Vec<Record> {
        self.fetch_list(TOOL_DEFAULT_DIM_DIVISORS, json!({ "shipDate": ship_date }))
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Generic fetch for whatever fields are still missing.
    ///
    /// Also pulls the tracking analysis and additional services when those
    /// are among the requested names.
    pub fn fetch_missing_data(&self, fields: &BTreeSet<String>, context: &FetchContext) -> Record {
        let mut merged = Record::new();
        let arguments = json!({
            "fields": fields,
            "trackingNumber": context.tracking_number,
            "clientId": context.client_id,
            "carrierId": context.carrier_id,
            "originZip": context.origin_zip,
            "destinationZip": context.destination_zip,
        });
        let generic = self.fetch_record(TOOL_FETCH_MISSING_FIELDS, arguments);
        merge_fetched(&mut merged, generic, "missing_fields");

        if fields
            .iter()
            .any(|field| TRACKING_ANALYSIS_FIELDS.contains(&field.as_str()))
        {
            let analysis = self.get_full_tracking_analysis(&context.tracking_number);
            merged.insert("full_tracking_analysis".to_string(), Value::Object(analysis));
        }
        if fields.contains("additional_services") {
            if let Some(id) = &context.rated_data_id {
                let services = self.get_rated_data_additional_services(id);
                merged.insert("additional_services".to_string(), Value::Array(services));
            }
        }
        merged
    }

    fn call(&self, tool: &str, arguments: &Value) -> Result<Value> {
        let start = Instant::now();
        tracing::debug!(tool, %arguments, "data call");
        let result = self.service.call_tool(tool, arguments);
        let elapsed_ms = start.elapsed().as_millis();
        match &result {
            Ok(_) => tracing::debug!(tool, elapsed_ms, "data call complete"),
            Err(err) => {
                let message = format!("{err:#}");
                tracing::warn!(tool, elapsed_ms, error = %message, "data call failed");
            }
        }
        result
    }

    fn fetch_record(&self, tool: &str, arguments: Value) -> Record {
        match self.call(tool, &arguments) {
            Ok(Value::Object(record)) => {
                if let Some(error) = record.get("error") {
                    tracing::warn!(tool, %error, "data service reported error");
                }
                record
            }
            Ok(other) => {
                tracing::warn!(tool, "data service returned a non-object payload");
                error_record("invalid data format", Some(other))
            }
            Err(err) => error_record(&format!("{err:#}"), None),
        }
    }

    fn fetch_list(&self, tool: &str, arguments: Value) -> Vec<Value> {
        match self.call(tool, &arguments) {
            Ok(Value::Array(items)) => items,
            Ok(Value::Null) => Vec::new(),
            Ok(other) => {
                tracing::warn!(tool, payload = %other, "expected a list from data service");
                Vec::new()
            }
            Err(_) => Vec::new(),
        }
    }
}

/// Record carrying a fetch failure marker.
pub fn error_record(message: &str, raw_response: Option<Value>) -> Record {
    let mut record = Record::new();
    record.insert("error".to_string(), Value::String(message.to_string()));
    if let Some(raw) = raw_response {
        record.insert("raw_response".to_string(), Value::String(raw.to_string()));
    }
    record
}

/// Static audit rules for an audit type. Types without rules get an empty
/// record.
pub fn reference_rules(audit_type: &str) -> Record {
    let rules = match audit_type {
        "BILL_WEIGHT_AUDIT" => json!({
            "dim_divisor_standard": 139,
            "weight_rounding_rule": "UP_TO_NEXT_POUND",
            "minimum_billable_weight": 1.0
        }),
        "LIST_RATE_AUDIT" | "LIST_RATE_NULL_AUDIT" | "MWT_LIST_RATE_AUDIT" => {
            json!({ "rate_type": "LIST", "rate_source": "CARRIER_TARIFF" })
        }
        "SURCHARGE_AUDIT" | "SURCHARGE_APPLICABILITY_AUDIT" | "FUEL_SURCHARGE_AUDIT" => json!({
            "surcharge_types": ["FUEL", "RESIDENTIAL", "DELIVERY_AREA", "EXTENDED_AREA"]
        }),
        "BASE_DISCOUNTS_PERCENTAGE_AUDIT"
        | "DISCOUNTS_PERCENTAGE_AUDIT"
        | "EARNED_DISCOUNTS_PERCENTAGE_AUDIT" => {
            json!({ "discount_types": ["BASE", "EARNED", "OTHER"] })
        }
        _ => Value::Null,
    };
    match rules {
        Value::Object(rules) => rules,
        _ => Record::new(),
    }
}

pub fn has_error(record: &Record) -> bool {
    record.get("error").is_some_and(|value| !value.is_null())
}

/// Merge a fetched record into `target`; failures land as `<label>_error`.
pub fn merge_fetched(target: &mut Record, record: Record, label: &str) {
    if has_error(&record) {
        let error = record.get("error").cloned().unwrap_or(Value::Null);
        target.insert(format!("{label}_error"), error);
        return;
    }
    for (key, value) in record {
        target.insert(key, value);
    }
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
