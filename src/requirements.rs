//! Required-field tables and the sufficiency check.
use crate::state::Record;
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_REQUIREMENTS: &[(&str, &[&str])] = &[
    (
        "BILL_WEIGHT_AUDIT",
        &["carrierBillWeight", "calcBillWeight", "actualWeight"],
    ),
    (
        "BASE_DISCOUNTS_PERCENTAGE_AUDIT",
        &[
            "carrierBaseDiscountEffectivePercentage",
            "calcBaseDiscountEffectivePercentage",
            "baseDiscountPercentage",
        ],
    ),
    (
        "DISCOUNTS_PERCENTAGE_AUDIT",
        &[
            "carrierTotalDiscountPercentage",
            "calcTotalDiscountPercentage",
        ],
    ),
    (
        "EARNED_DISCOUNTS_PERCENTAGE_AUDIT",
        &[
            "carrierEarnedDiscountEffectivePercentage",
            "calcEarnedDiscountEffectivePercentage",
            "earnedDiscountPercentage",
        ],
    ),
    ("LIST_RATE_AUDIT", &["carrierListRate", "calcListRate"]),
    ("LIST_RATE_NULL_AUDIT", &["carrierListRate"]),
    (
        "MWT_LIST_RATE_AUDIT",
        &[
            "carrierListRate",
            "calcListRate",
            "isCarrierMultiweight",
            "isCalcMultiweight",
        ],
    ),
    (
        "NET_TRANSPORTATION_AUDIT",
        &[
            "carrierNetTransportationCharge",
            "calcNetTransportationCharge",
        ],
    ),
    (
        "SURCHARGE_AUDIT",
        &["carrierTotalSurcharges", "calcTotalSurcharges"],
    ),
    (
        "SURCHARGE_APPLICABILITY_AUDIT",
        &["carrierTotalSurcharges", "calcTotalSurcharges"],
    ),
    ("SURCHARGE_NULL_AUDIT", &["carrierTotalSurcharges"]),
    (
        "FUEL_SURCHARGE_AUDIT",
        &[
            "fuelPercentage",
            "carrierTransportationFuelAmount",
            "calcTransportationFuelAmount",
        ],
    ),
    ("Matched", &[]),
    ("EXCEPTION", &[]),
];

/// Audit type to ordered required field names.
///
/// Built once per pipeline from the defaults plus config overrides and handed
/// to the reasoner; nothing here is process-global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementTable {
    by_type: BTreeMap<String, Vec<String>>,
}

impl Default for RequirementTable {
    fn default() -> Self {
        let by_type = DEFAULT_REQUIREMENTS
            .iter()
            .map(|(audit_type, fields)| {
                (
                    (*audit_type).to_string(),
                    fields.iter().map(|field| (*field).to_string()).collect(),
                )
            })
            .collect();
        Self { by_type }
    }
}

impl RequirementTable {
    /// Defaults with per-type replacements layered on top.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::default();
        for (audit_type, fields) in overrides {
            table.by_type.insert(audit_type.clone(), fields.clone());
        }
        table
    }

    /// Required fields for a type; unknown types require nothing.
    pub fn required_fields(&self, audit_type: &str) -> &[String] {
        self.by_type
            .get(audit_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_known(&self, audit_type: &str) -> bool {
        self.by_type.contains_key(audit_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.by_type.iter()
    }

    /// Required fields whose value is absent or null. Zero is present.
    pub fn check_sufficiency(&self, audit_type: &str, combined: &Record) -> BTreeSet<String> {
        if !self.is_known(audit_type) {
            tracing::warn!(
                audit_type,
                "no requirement entry for audit type, treating as sufficient"
            );
        }
        self.required_fields(audit_type)
            .iter()
            .filter(|field| {
                combined
                    .get(field.as_str())
                    .filter(|value| !value.is_null())
                    .is_none()
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().expect("object literal")
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn reports_absent_and_null_fields() {
        let table = RequirementTable::default();
        let data = record(json!({"carrierBillWeight": 15, "calcBillWeight": null}));
        assert_eq!(
            table.check_sufficiency("BILL_WEIGHT_AUDIT", &data),
            set(&["actualWeight", "calcBillWeight"])
        );
    }

    #[test]
    fn zero_counts_as_present() {
        let table = RequirementTable::default();
        let data = record(json!({"carrierListRate": 0, "calcListRate": 0.0}));
        assert!(table.check_sufficiency("LIST_RATE_AUDIT", &data).is_empty());
    }

    #[test]
    fn unknown_type_requires_nothing() {
        let table = RequirementTable::default();
        assert!(table
            .check_sufficiency("ZONE_AUDIT", &Record::new())
            .is_empty());
        assert!(!table.is_known("ZONE_AUDIT"));
    }

    #[test]
    fn superset_of_sufficient_data_stays_sufficient() {
        let table = RequirementTable::default();
        let base = record(json!({
            "carrierBillWeight": 15,
            "calcBillWeight": 10,
            "actualWeight": 9.5
        }));
        let mut wider = base.clone();
        wider.insert("carrierZone".to_string(), json!("004"));
        wider.insert("extra".to_string(), json!(null));
        for audit_type in ["BILL_WEIGHT_AUDIT", "Matched", "ZONE_AUDIT"] {
            assert!(table.check_sufficiency(audit_type, &base).is_empty());
            assert!(table.check_sufficiency(audit_type, &wider).is_empty());
        }
    }

    #[test]
    fn overrides_replace_single_type() {
        let mut overrides = BTreeMap::new();
        overrides.insert("LIST_RATE_AUDIT".to_string(), vec!["carrierZone".to_string()]);
        let table = RequirementTable::with_overrides(&overrides);
        assert_eq!(table.required_fields("LIST_RATE_AUDIT"), ["carrierZone"]);
        assert_eq!(table.required_fields("BILL_WEIGHT_AUDIT").len(), 3);
    }
}
