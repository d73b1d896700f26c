//! Enrichment: fetch data for fields the sufficiency check reported missing.
//!
//! Missing fields are routed to data sources through a `FieldSourceTable`;
//! each distinct source is fetched once, then a generic missing-field fetch
//! covers whatever the table does not route.
use crate::facade::{merge_fetched, reference_rules, DataFacade, FetchContext};
use crate::state::{Record, StateDelta};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    ParcelCharacteristics,
    RatedData,
    ReferenceData,
    Agreements,
    InvoiceDetails,
    TrackingNumberDetails,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParcelCharacteristics => "parcel_characteristics",
            Self::RatedData => "rated_data",
            Self::ReferenceData => "reference_data",
            Self::Agreements => "agreements",
            Self::InvoiceDetails => "invoice_details",
            Self::TrackingNumberDetails => "tracking_number_details",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_FIELD_SOURCES: &[(&str, DataSource)] = &[
    ("actualWeight", DataSource::ParcelCharacteristics),
    ("length", DataSource::ParcelCharacteristics),
    ("width", DataSource::ParcelCharacteristics),
    ("height", DataSource::ParcelCharacteristics),
    ("packageType", DataSource::ParcelCharacteristics),
    ("senderPostal", DataSource::ParcelCharacteristics),
    ("receiverPostal", DataSource::ParcelCharacteristics),
    ("shipDate", DataSource::ParcelCharacteristics),
    ("carrierBillWeight", DataSource::RatedData),
    ("calcBillWeight", DataSource::RatedData),
    ("carrierDimDivisor", DataSource::RatedData),
    ("calcDimDivisor", DataSource::RatedData),
    ("carrierZone", DataSource::RatedData),
    ("calcZone", DataSource::RatedData),
    ("carrierOriginalService", DataSource::RatedData),
    ("calcOriginalService", DataSource::RatedData),
    ("carrierListRate", DataSource::RatedData),
    ("calcListRate", DataSource::RatedData),
    ("isCarrierMultiweight", DataSource::RatedData),
    ("isCalcMultiweight", DataSource::RatedData),
    ("carrierTotalDiscountPercentage", DataSource::RatedData),
    ("calcTotalDiscountPercentage", DataSource::RatedData),
    ("carrierBaseDiscountEffectivePercentage", DataSource::RatedData),
    ("calcBaseDiscountEffectivePercentage", DataSource::RatedData),
    ("carrierEarnedDiscountEffectivePercentage", DataSource::RatedData),
    ("calcEarnedDiscountEffectivePercentage", DataSource::RatedData),
    ("carrierNetTransportationCharge", DataSource::RatedData),
    ("calcNetTransportationCharge", DataSource::RatedData),
    ("carrierTotalSurcharges", DataSource::RatedData),
    ("calcTotalSurcharges", DataSource::RatedData),
    ("carrierTransportationFuelAmount", DataSource::RatedData),
    ("calcTransportationFuelAmount", DataSource::RatedData),
    ("fuelPercentage", DataSource::RatedData),
    ("baseDiscountPercentage", DataSource::Agreements),
    ("earnedDiscountPercentage", DataSource::Agreements),
    ("dimDivisorsPerTerm", DataSource::Agreements),
    ("zoneChart", DataSource::ReferenceData),
    ("invoiceDetails", DataSource::InvoiceDetails),
    ("trackingDetails", DataSource::TrackingNumberDetails),
    ("upsTrackingDetails", DataSource::TrackingNumberDetails),
];

/// Where to look for a missing field. Unlisted fields go to invoice details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSourceTable {
    by_field: BTreeMap<String, DataSource>,
}

impl Default for FieldSourceTable {
    fn default() -> Self {
        Self {
            by_field: DEFAULT_FIELD_SOURCES
                .iter()
                .map(|(field, source)| ((*field).to_string(), *source))
                .collect(),
        }
    }
}

impl FieldSourceTable {
    pub fn with_overrides(overrides: &BTreeMap<String, DataSource>) -> Self {
        let mut table = Self::default();
        for (field, source) in overrides {
            table.by_field.insert(field.clone(), *source);
        }
        table
    }

    pub fn source_for(&self, field: &str) -> DataSource {
        match self.by_field.get(field) {
            Some(source) => *source,
            None => {
                tracing::warn!(field, "no data source for field, routing to invoice details");
                DataSource::InvoiceDetails
            }
        }
    }

    /// Distinct sources needed for a set of fields, in stable order.
    pub fn sources_for(&self, fields: &BTreeSet<String>) -> BTreeSet<DataSource> {
        fields.iter().map(|field| self.source_for(field)).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentOutcome {
    /// Accumulated store after this step.
    pub enriched_data: Record,
    /// Only what this step fetched.
    pub fetched: Record,
    pub enrichment_iterations: u32,
    pub missing_fields: BTreeSet<String>,
    pub sources: Vec<DataSource>,
}

impl EnrichmentOutcome {
    pub fn into_delta(self) -> StateDelta {
        StateDelta {
            enriched_data: Some(self.enriched_data),
            enrichment_iterations: Some(self.enrichment_iterations),
            missing_fields: Some(self.missing_fields),
            ..StateDelta::default()
        }
    }
}

pub struct EnrichmentStep<'a> {
    facade: &'a DataFacade<'a>,
    sources: &'a FieldSourceTable,
}

impl<'a> EnrichmentStep<'a> {
    pub fn new(facade: &'a DataFacade<'a>, sources: &'a FieldSourceTable) -> Self {
        Self { facade, sources }
    }

    pub fn enrich(
        &self,
        missing_fields: &BTreeSet<String>,
        context: &FetchContext,
        accumulated: &Record,
        iterations: u32,
    ) -> EnrichmentOutcome {
        if missing_fields.is_empty() {
            return EnrichmentOutcome {
                enriched_data: accumulated.clone(),
                fetched: Record::new(),
                enrichment_iterations: iterations,
                missing_fields: BTreeSet::new(),
                sources: Vec::new(),
            };
        }

        let sources = self.sources.sources_for(missing_fields);
        let mut fetched = Record::new();
        for source in &sources {
            let record = self.fetch_source(*source, context);
            merge_fetched(&mut fetched, record, source.as_str());
        }
        let remaining = self.facade.fetch_missing_data(missing_fields, context);
        for (key, value) in remaining {
            fetched.insert(key, value);
        }

        let mut enriched_data = accumulated.clone();
        for (key, value) in &fetched {
            enriched_data.insert(key.clone(), value.clone());
        }
        let iteration = iterations + 1;
        tracing::info!(
            iteration,
            sources = ?sources,
            fetched_keys = fetched.len(),
            "enrichment complete"
        );
        EnrichmentOutcome {
            enriched_data,
            fetched,
            enrichment_iterations: iteration,
            missing_fields: BTreeSet::new(),
            sources: sources.into_iter().collect(),
        }
    }

    fn fetch_source(&self, source: DataSource, context: &FetchContext) -> Record {
        let tracking = context.tracking_number.as_str();
        match source {
            DataSource::ParcelCharacteristics => self.facade.get_parcel_characteristics(tracking),
            DataSource::RatedData => self.facade.get_rated_data(tracking),
            DataSource::Agreements => self
                .facade
                .get_agreements(&context.client_id, &context.carrier_id),
            DataSource::ReferenceData => {
                let mut record = Record::new();
                record.insert(
                    "reference_data".to_string(),
                    Value::Object(reference_rules(&context.audit_type)),
                );
                record
            }
            DataSource::InvoiceDetails => {
                let analysis = self.facade.get_full_tracking_analysis(tracking);
                pick_keys(analysis, &["invoiceDetails"])
            }
            DataSource::TrackingNumberDetails => {
                let analysis = self.facade.get_full_tracking_analysis(tracking);
                pick_keys(analysis, &["upsTrackingDetails", "trackingDetails"])
            }
        }
    }
}

/// Keep only `keys` (and any error marker) from a fetched record.
fn pick_keys(mut record: Record, keys: &[&str]) -> Record {
    let mut picked = Record::new();
    for key in keys.iter().copied().chain(["error"]) {
        if let Some(value) = record.remove(key) {
            picked.insert(key.to_string(), value);
        }
    }
    picked
}

#[cfg(test)]
#[path = "enrichment_tests.rs"]
mod tests;
