//! End-to-end audits through the `paudit` binary and the fixture data
//! service.

mod common;

use common::{json_stdout, read_lines, stderr, stdout, AuditFixture, TRACKING};
use serde_json::{json, Value};

fn bill_weight_rated() -> Value {
    json!({"category": "BILL_WEIGHT_AUDIT", "carrierBillWeight": 15, "carrierTotalNetCharge": 24.10, "calcTotalNetCharge": 19.85})
}

#[test]
fn matched_shipment_reports_no_discrepancy() {
    let fixture = AuditFixture::new(json!({
        "category": "Matched",
        "carrierTotalNetCharge": 12.5,
        "calcTotalNetCharge": 12.5
    }));
    let output = fixture.audit(&[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let report = stdout(&output);
    assert!(report.contains(&format!("tracking number: {TRACKING}")));
    assert!(report.contains("audit type: Matched"));
    assert!(report.contains("error case: Case 4: No Error - Calculation Correct"));
    assert!(report.contains("enrichment iterations: 0"));
    assert!(report.contains("**Recommendation**"));
}

#[test]
fn bill_weight_gap_is_enriched_then_summarized() {
    let fixture = AuditFixture::new(bill_weight_rated());
    fixture.tool(
        "fetch_missing_fields",
        json!({ (TRACKING): {"calcBillWeight": 10, "actualWeight": 9.4} }),
    );
    let lm = fixture.mock_lm();
    let log = fixture.path("logs/oracle.jsonl");
    let log_arg = log.to_str().expect("utf-8 path");
    let output = fixture.audit(&["--lm", &lm, "--oracle-log", log_arg, "--output", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let result = json_stdout(&output);
    assert_eq!(result["audit_type"], "BILL_WEIGHT_AUDIT");
    assert_eq!(result["audit_group"], "WEIGHT");
    assert_eq!(result["enrichment_iterations"], 1);
    assert_eq!(
        result["audit_cause"],
        "Carrier used DIM divisor 166 instead of 139"
    );
    assert_eq!(result["error_case"], "Case 1: Wrong DIM Divisor");
    assert_eq!(
        result["summary_bullets"],
        json!(["Carrier billed 15 lbs", "Correct bill weight is 10 lbs"])
    );
    assert_eq!(result["error"], Value::Null);

    let entries = read_lines(&log);
    let kinds: Vec<&str> = entries
        .iter()
        .filter_map(|entry| entry["kind"].as_str())
        .collect();
    assert_eq!(kinds, vec!["reasoning", "summary"]);
    assert!(entries.iter().all(|entry| entry["outcome"] == "success"));
}

#[test]
fn unavailable_fields_exhaust_enrichment_and_fail() {
    let fixture = AuditFixture::new(bill_weight_rated());
    let output = fixture.audit(&["--output", "json"]);
    assert!(!output.status.success());

    let result = json_stdout(&output);
    assert_eq!(result["enrichment_iterations"], 3);
    assert_eq!(
        result["missing_fields"],
        json!(["actualWeight", "calcBillWeight"])
    );
    assert_eq!(result["audit_summary"], Value::Null);
    assert!(result["error"].is_string());
    assert!(stderr(&output).contains("enrichment exhausted after 3 iteration(s)"));
}

#[test]
fn iteration_flag_caps_enrichment() {
    let fixture = AuditFixture::new(bill_weight_rated());
    let output = fixture.audit(&["--max-iterations", "0", "--output", "json"]);
    assert!(!output.status.success());
    assert_eq!(json_stdout(&output)["enrichment_iterations"], 0);

    let output = fixture.audit(&["--max-iterations", "1", "--output", "json"]);
    assert!(!output.status.success());
    assert_eq!(json_stdout(&output)["enrichment_iterations"], 1);
}

#[test]
fn stream_prints_one_delta_per_step() {
    let fixture = AuditFixture::new(bill_weight_rated());
    let output = fixture.audit(&["--stream", "--max-iterations", "1"]);
    assert!(!output.status.success());
    let steps: Vec<String> = stdout(&output)
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(|line| {
            let update: Value = serde_json::from_str(line).expect("delta line");
            update["step"].as_str().expect("step name").to_string()
        })
        .collect();
    assert_eq!(
        steps,
        vec![
            "fetch_initial",
            "classify",
            "fetch_reference",
            "reason",
            "enrich",
            "reason",
            "abort"
        ]
    );
    assert!(stdout(&output).contains("missing: actualWeight, calcBillWeight"));
}

#[test]
fn state_output_includes_gathered_data() {
    let fixture = AuditFixture::new(json!({"category": "Matched"}));
    let output = fixture.audit(&["--output", "state"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let state = json_stdout(&output);
    assert_eq!(state["agreements"]["dimDivisor"], 139);
    assert_eq!(state["default_dim_divisors"], json!([{"dimDivisor": 139}]));
    assert_eq!(
        state["reference_data"]["auditReference"]["audit_group"],
        "NO_AUDIT"
    );
}

#[test]
fn empty_tracking_number_is_rejected() {
    let fixture = AuditFixture::new(json!({"category": "Matched"}));
    let fixtures = fixture.fixtures_dir();
    let output = fixture.run(&[
        "audit",
        "--fixtures",
        fixtures.to_str().expect("utf-8 path"),
        "--tracking-number",
        "",
        "--client-id",
        "C100",
        "--carrier-id",
        "UPS",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid audit request"));
}
