use std::path::Path;

use serde_json::{Map, Value};

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

const REDACTED_KEYS: &[&str] = &["api_key", "authorization", "bearer", "token"];
const OMITTED_KEYS: &[&str] = &["embedding", "embeddings"];

/// Builds the record written for one completion call: what was sent, what came
/// back, and how the pipeline judged it.
pub fn build_receipt(
    operation: &str,
    provider_request: &Map<String, Value>,
    response_text: Option<&str>,
    outcome: &Map<String, Value>,
) -> Value {
    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    root.insert(
        "operation".to_string(),
        Value::String(operation.to_string()),
    );
    root.insert(
        "provider_request".to_string(),
        sanitize_payload(&Value::Object(provider_request.clone())),
    );
    root.insert(
        "response_text".to_string(),
        response_text
            .map(|text| Value::String(text.to_string()))
            .unwrap_or(Value::Null),
    );
    root.insert(
        "outcome".to_string(),
        sanitize_payload(&Value::Object(outcome.clone())),
    );
    Value::Object(root)
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}

fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::Array(rows) => Value::Array(rows.iter().map(sanitize_payload).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, row) in map {
                let lowered = key.to_ascii_lowercase();
                if REDACTED_KEYS.contains(&lowered.as_str()) {
                    out.insert(key.clone(), Value::String("<redacted>".to_string()));
                } else if OMITTED_KEYS.contains(&lowered.as_str()) {
                    out.insert(key.clone(), Value::String("<omitted>".to_string()));
                } else {
                    out.insert(key.clone(), sanitize_payload(row));
                }
            }
            Value::Object(out)
        }
        _ => value.clone(),
    }
}
