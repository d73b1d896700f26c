//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const TRACKING: &str = "1Z999AA10123456784";
pub const CLIENT: &str = "C100";
pub const CARRIER: &str = "UPS";

/// Environment variables the binary reads; cleared for every run.
const AUDIT_ENV: &[&str] = &[
    "PARCEL_AUDIT_LOG",
    "PARCEL_AUDIT_DATA_URL",
    "PARCEL_AUDIT_FIXTURES",
    "PARCEL_AUDIT_LM_COMMAND",
    "PARCEL_AUDIT_MAX_ITERATIONS",
    "PARCEL_AUDIT_API_KEY",
];

const MOCK_LM: &str = r#"#!/bin/sh
input=$(cat)
case "$input" in
  *"AUDIT SUMMARY REQUEST"*)
    printf '%s\n' "**Finding**: Carrier applied the wrong DIM divisor" \
      "- Carrier billed 15 lbs" \
      "- Correct bill weight is 10 lbs"
    ;;
  *)
    printf '%s\n' '{"status": "sufficient", "cause": "Carrier used DIM divisor 166 instead of 139", "error_case": "Case 1: Wrong DIM Divisor", "reasoning": "Recomputed dimensional weight with the contract divisor."}'
    ;;
esac
"#;

/// Temporary fixture directory for the fixture data service, plus a scratch
/// area for config, logs and the mock LM script.
pub struct AuditFixture {
    root: TempDir,
}

impl AuditFixture {
    /// Fixtures for a shipment whose rated data is `rated`. Every other
    /// initial-fetch tool gets a plausible answer.
    pub fn new(rated: Value) -> Self {
        let fixture = Self {
            root: TempDir::new().expect("tempdir"),
        };
        std::fs::create_dir_all(fixture.fixtures_dir()).expect("create fixtures dir");
        fixture.tool("get_rated_data", json!({ (TRACKING): rated }));
        fixture.tool(
            "get_parcel_characteristic",
            json!({ "*": {"shipDate": "2024-03-04", "senderPostal": "30301", "receiverPostal": "94105"} }),
        );
        fixture.tool(
            "get_agreement_details_json",
            json!({ (format!("{CLIENT}:{CARRIER}")): {"dimDivisor": 139} }),
        );
        fixture.tool(
            "get_default_dim_divisors",
            json!({ "2024-03-04": [{"dimDivisor": 139}] }),
        );
        fixture.tool(
            "get_full_tracking_analysis",
            json!({ "*": {"invoiceDetails": {"invoiceNumber": "INV-1"}} }),
        );
        fixture.tool("get_rated_data_additional_services", json!({ "*": [] }));
        fixture
    }

    /// Write (or replace) the fixture table for one tool.
    pub fn tool(&self, name: &str, table: Value) {
        let path = self.fixtures_dir().join(format!("{name}.json"));
        std::fs::write(&path, serde_json::to_vec_pretty(&table).expect("serialize"))
            .expect("write fixture");
    }

    pub fn fixtures_dir(&self) -> PathBuf {
        self.root.path().join("fixtures")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// `--lm` value for a shell-script oracle that answers reasoning with a
    /// JSON verdict and summaries with bullets.
    #[allow(dead_code)]
    pub fn mock_lm(&self) -> String {
        let script = self.path("mock-lm.sh");
        std::fs::write(&script, MOCK_LM).expect("write mock lm");
        format!("sh {}", script.display())
    }

    /// Run `paudit` with an isolated config dir and no audit env vars.
    pub fn run(&self, args: &[&str]) -> Output {
        let mut command = Command::new(env!("CARGO_BIN_EXE_paudit"));
        for name in AUDIT_ENV {
            command.env_remove(name);
        }
        command
            .env("XDG_CONFIG_HOME", self.path("config-home"))
            .env("HOME", self.root.path())
            .args(args)
            .output()
            .expect("run paudit")
    }

    /// `audit` for the default shipment against the fixture data service.
    pub fn audit(&self, extra: &[&str]) -> Output {
        let fixtures = self.fixtures_dir();
        let fixtures = fixtures.to_str().expect("utf-8 path");
        let mut args = vec![
            "audit",
            "--fixtures",
            fixtures,
            "--tracking-number",
            TRACKING,
            "--client-id",
            CLIENT,
            "--carrier-id",
            CARRIER,
        ];
        args.extend_from_slice(extra);
        self.run(&args)
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn json_stdout(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!("stdout is not JSON ({err}): {}", stdout(output));
    })
}

#[allow(dead_code)]
pub fn read_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .expect("read jsonl")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}
