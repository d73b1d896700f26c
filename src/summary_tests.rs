use super::*;
use crate::state::ReasoningStatus;
use crate::test_support::ScriptedOracle;
use serde_json::json;

fn bill_weight_state() -> AuditState {
    AuditState {
        tracking_number: "1Z999AA10123456784".to_string(),
        client_id: "CLIENT001".to_string(),
        carrier_id: "UPS".to_string(),
        rated_data: json!({
            "invoiceNumber": "INV-2024-001",
            "carrierBillWeight": 15,
            "calcBillWeight": 10,
            "carrierTotalNetCharge": 25.82,
            "calcTotalNetCharge": 21.53,
            "shipDate": "2024-01-15"
        })
        .as_object()
        .cloned(),
        parcel_characteristics: json!({"actualWeight": 9.4, "length": 12, "width": 10, "height": 8})
            .as_object()
            .cloned(),
        audit_type: Some("BILL_WEIGHT_AUDIT".to_string()),
        audit_category: Some("Bill Weight Audit".to_string()),
        reasoning_status: Some(ReasoningStatus::Sufficient),
        audit_cause: Some("Carrier billed DIM weight with divisor 166".to_string()),
        error_case: Some("Incorrect DIM Divisor Selection".to_string()),
        ..AuditState::default()
    }
}

#[test]
fn oracle_summary_is_used_when_available() {
    let oracle = ScriptedOracle::replying(
        "**Audit Type**: Bill Weight Audit\n- Carrier billed 15 lbs\n- Calculated 10 lbs\n",
    );
    let outcome = SummaryGenerator::new(&oracle).summarize(&bill_weight_state());
    assert!(outcome.from_oracle);
    assert_eq!(outcome.bullets, vec!["Carrier billed 15 lbs", "Calculated 10 lbs"]);
    assert!(oracle.system_prompts()[0].contains("Bill Weight Summary"));
}

#[test]
fn oracle_failure_falls_back_to_rules() {
    let oracle = ScriptedOracle::failing("timeout");
    let outcome = SummaryGenerator::new(&oracle).summarize(&bill_weight_state());
    assert!(!outcome.from_oracle);
    assert!(outcome.summary.contains("**Audit Type**: Bill Weight Audit (BILL_WEIGHT_AUDIT)"));
    assert!(outcome.summary.contains("- Overcharge: $4.29"));
    assert!(outcome
        .summary
        .contains("**Recommendation**: File dispute with carrier for refund."));
    assert!(outcome.summary.contains("**Potential Recovery**: $4.29"));
    assert!(outcome
        .bullets
        .contains(&"Bill Weight: carrier 15 vs calculated 10".to_string()));
    assert!(outcome
        .bullets
        .contains(&"Tracking Number: 1Z999AA10123456784".to_string()));
}

#[test]
fn empty_oracle_reply_falls_back() {
    let oracle = ScriptedOracle::replying("   \n");
    let outcome = SummaryGenerator::new(&oracle).summarize(&bill_weight_state());
    assert!(!outcome.from_oracle);
    assert!(!outcome.summary.is_empty());
}

#[test]
fn undercharge_needs_no_action() {
    let mut state = bill_weight_state();
    if let Some(rated) = state.rated_data.as_mut() {
        rated.insert("carrierTotalNetCharge".to_string(), json!(20.0));
    }
    let summary = rule_based_summary(&state, &state.combined_data());
    assert!(summary.contains("No action required"));
    assert!(summary.contains("**Potential Recovery**: $0.00"));
    assert!(summary.contains("- Overcharge: -$1.53"));
}

#[test]
fn bullets_skip_bold_headings() {
    let text = "**Finding**: x\n• First\n  - Second  \n* Third\n-not a bullet\n";
    assert_eq!(extract_bullets(text), vec!["First", "Second", "Third"]);
}
