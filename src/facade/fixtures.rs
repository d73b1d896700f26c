//! Offline data service backed by JSON fixture files.
//!
//! Each tool reads `{dir}/{tool}.json`, an object keyed by the call's lookup
//! key. `"*"` matches any call the file has no specific entry for.
use super::DataService;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

pub struct FixtureDataService {
    dir: PathBuf,
}

impl FixtureDataService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DataService for FixtureDataService {
    fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value> {
        let path = self.dir.join(format!("{tool}.json"));
        let bytes = fs::read(&path).with_context(|| format!("read fixture {}", path.display()))?;
        let table: Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse fixture {}", path.display()))?;
        let Value::Object(entries) = table else {
            return Err(anyhow!("fixture {} must be a JSON object", path.display()));
        };
        let key = lookup_key(arguments);
        key.as_deref()
            .and_then(|key| entries.get(key))
            .or_else(|| entries.get("*"))
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "no fixture entry for {} in {}",
                    key.unwrap_or_else(|| "<no key>".to_string()),
                    path.display()
                )
            })
    }
}

/// `trackingNumber`, else `ratedDataId`, else `shipDate`, else
/// `{clientId}:{carrierId}`.
fn lookup_key(arguments: &Value) -> Option<String> {
    for name in ["trackingNumber", "ratedDataId", "shipDate"] {
        match arguments.get(name) {
            Some(Value::String(text)) => return Some(text.clone()),
            Some(Value::Number(number)) => return Some(number.to_string()),
            _ => {}
        }
    }
    let client = arguments.get("clientId").and_then(Value::as_str)?;
    let carrier = arguments.get("carrierId").and_then(Value::as_str)?;
    Some(format!("{client}:{carrier}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_key_priority() {
        assert_eq!(
            lookup_key(&json!({"trackingNumber": "1Z", "clientId": "C"})),
            Some("1Z".to_string())
        );
        assert_eq!(lookup_key(&json!({"ratedDataId": 42})), Some("42".to_string()));
        assert_eq!(
            lookup_key(&json!({"clientId": "C1", "carrierId": "UPS"})),
            Some("C1:UPS".to_string())
        );
        assert_eq!(lookup_key(&json!({})), None);
    }

    #[test]
    fn reads_keyed_and_wildcard_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("get_rated_data.json"),
            r#"{"1Z": {"calcBillWeight": 10}, "*": {"error": "not found"}}"#,
        )
        .expect("write fixture");
        let service = FixtureDataService::new(dir.path());
        assert_eq!(
            service
                .call_tool("get_rated_data", &json!({"trackingNumber": "1Z"}))
                .expect("keyed"),
            json!({"calcBillWeight": 10})
        );
        assert_eq!(
            service
                .call_tool("get_rated_data", &json!({"trackingNumber": "2Z"}))
                .expect("wildcard"),
            json!({"error": "not found"})
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = FixtureDataService::new(dir.path());
        assert!(service
            .call_tool("get_rated_data", &json!({"trackingNumber": "1Z"}))
            .is_err());
    }
}
