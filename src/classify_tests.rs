use super::*;
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().expect("object literal")
}

#[test]
fn known_code_classifies_with_full_confidence() {
    let rated = record(json!({"category": "BILL_WEIGHT_AUDIT"}));
    let result = classify(Some(&rated));
    assert_eq!(result.audit_type, "BILL_WEIGHT_AUDIT");
    assert_eq!(result.audit_category, "Bill Weight Audit");
    assert_eq!(result.audit_group, AuditGroup::Weight);
    assert_eq!(result.confidence, 1.0);
    assert!(!result.inferred);
}

#[test]
fn code_matching_is_trimmed_and_case_insensitive() {
    assert_eq!(normalize_audit_type("  surcharge_audit "), "SURCHARGE_AUDIT");
    assert_eq!(normalize_audit_type("matched"), "Matched");
    assert_eq!(normalize_audit_type(""), "UNKNOWN");
}

#[test]
fn unknown_code_keeps_raw_value_with_half_confidence() {
    let rated = record(json!({"category": "ZONE_AUDIT"}));
    let result = classify(Some(&rated));
    assert_eq!(result.audit_type, "ZONE_AUDIT");
    assert_eq!(result.audit_category, "Unknown: ZONE_AUDIT");
    assert_eq!(result.audit_group, AuditGroup::Unknown);
    assert_eq!(result.confidence, 0.5);
}

#[test]
fn classifying_twice_is_identical() {
    let rated = record(json!({"category": "fuel_surcharge_audit"}));
    assert_eq!(classify(Some(&rated)), classify(Some(&rated)));
}

#[test]
fn missing_record_is_unknown() {
    let result = classify(None);
    assert_eq!(result.audit_type, UNKNOWN);
    assert_eq!(result.audit_group, AuditGroup::Unknown);
}

#[test]
fn infers_bill_weight_first() {
    let rated = record(json!({
        "carrierBillWeight": 15,
        "calcBillWeight": 10,
        "carrierListRate": 20.0,
        "calcListRate": 18.0
    }));
    assert_eq!(infer_audit_type(&rated), BILL_WEIGHT_AUDIT);
}

#[test]
fn infers_list_rate_variants() {
    let both = record(json!({"carrierListRate": 20.0, "calcListRate": 18.0}));
    assert_eq!(infer_audit_type(&both), "LIST_RATE_AUDIT");
    let carrier_only = record(json!({"carrierListRate": 20.0, "calcListRate": null}));
    assert_eq!(infer_audit_type(&carrier_only), "LIST_RATE_NULL_AUDIT");
}

#[test]
fn infers_discount_component() {
    let base = record(json!({
        "carrierTotalDiscountPercentage": 30,
        "calcTotalDiscountPercentage": 35,
        "carrierBaseDiscountEffectivePercentage": 20,
        "calcBaseDiscountEffectivePercentage": 25
    }));
    assert_eq!(infer_audit_type(&base), "BASE_DISCOUNTS_PERCENTAGE_AUDIT");

    let earned = record(json!({
        "carrierTotalDiscountPercentage": 30,
        "calcTotalDiscountPercentage": 35,
        "carrierEarnedDiscountEffectivePercentage": 5,
        "calcEarnedDiscountEffectivePercentage": 10
    }));
    assert_eq!(infer_audit_type(&earned), "EARNED_DISCOUNTS_PERCENTAGE_AUDIT");

    let other = record(json!({
        "carrierTotalDiscountPercentage": "30",
        "calcTotalDiscountPercentage": "35"
    }));
    assert_eq!(infer_audit_type(&other), "DISCOUNTS_PERCENTAGE_AUDIT");
}

#[test]
fn infers_surcharge_kinds() {
    let fuel = record(json!({
        "carrierTotalSurcharges": 5.0,
        "calcTotalSurcharges": 4.0,
        "carrierTransportationFuelAmount": 2.0,
        "calcTransportationFuelAmount": 1.0
    }));
    assert_eq!(infer_audit_type(&fuel), "FUEL_SURCHARGE_AUDIT");
    let plain = record(json!({"carrierTotalSurcharges": 5.0, "calcTotalSurcharges": 4.0}));
    assert_eq!(infer_audit_type(&plain), "SURCHARGE_AUDIT");
}

#[test]
fn infers_matched_exception_and_unknown() {
    let transport = record(json!({
        "carrierNetTransportationCharge": 12.0,
        "calcNetTransportationCharge": 11.0
    }));
    assert_eq!(infer_audit_type(&transport), "NET_TRANSPORTATION_AUDIT");

    let matched = record(json!({"carrierTotalNetCharge": 21.53, "calcTotalNetCharge": 21.53}));
    assert_eq!(infer_audit_type(&matched), MATCHED);

    let exception = record(json!({
        "carrierTotalNetCharge": 25.0,
        "calcTotalNetCharge": 21.0,
        "overRated": true
    }));
    assert_eq!(infer_audit_type(&exception), EXCEPTION);

    let unknown = record(json!({"carrierTotalNetCharge": 25.0, "calcTotalNetCharge": 21.0}));
    assert_eq!(infer_audit_type(&unknown), UNKNOWN);
}

#[test]
fn empty_record_reads_as_matched() {
    let result = classify(Some(&Record::new()));
    assert_eq!(result.audit_type, MATCHED);
    assert!(result.inferred);
}
