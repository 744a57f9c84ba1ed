//! Decoding the broker's permissive field bag into a typed telemetry record.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use crate::error::CollectorError;

const RESERVED_METRIC_KEYS: [&str; 3] = ["gpu_id", "value", "metric_name"];

/// The wire form a streamer publishes to the broker: a loosely typed field
/// bag plus an optional timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamerMessage {
    /// Unix timestamp in seconds; zero or absent means "use decode time".
    #[serde(default)]
    pub timestamp: i64,
    /// Arbitrary producer-supplied fields.
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

/// A normalized telemetry record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Telemetry {
    /// Non-empty GPU identifier.
    pub gpu_id: String,
    /// Hostname the sample was collected on, if known.
    pub hostname: String,
    /// Every float-coercible field, including the resolved primary metric.
    pub metrics: HashMap<String, f64>,
    /// Collection time.
    pub timestamp: DateTime<Utc>,
}

/// Decode a raw JSON field bag into a [`Telemetry`] record.
///
/// Returns [`CollectorError::UnresolvableGpuId`] if no field yields a
/// usable `gpu_id` (see [module docs](self) for the resolution order).
pub fn decode(raw: &[u8]) -> Result<Telemetry, CollectorError> {
    let msg: StreamerMessage = serde_json::from_slice(raw)?;

    let gpu_id = resolve_gpu_id(&msg.fields).ok_or(CollectorError::UnresolvableGpuId)?;
    let hostname = msg
        .fields
        .get("Hostname")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut metrics = HashMap::new();
    if let Some(value) = msg.fields.get("value").and_then(coerce_f64) {
        let key = msg
            .fields
            .get("metric_name")
            .and_then(Value::as_str)
            .unwrap_or("value");
        metrics.insert(key.to_string(), value);
    }
    for (key, value) in &msg.fields {
        if RESERVED_METRIC_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(f) = coerce_f64(value) {
            metrics.insert(key.clone(), f);
        }
    }

    let timestamp = if msg.timestamp == 0 {
        Utc::now()
    } else {
        DateTime::from_timestamp(msg.timestamp, 0).unwrap_or_else(Utc::now)
    };

    Ok(Telemetry {
        gpu_id,
        hostname,
        metrics,
        timestamp,
    })
}

fn resolve_gpu_id(fields: &HashMap<String, Value>) -> Option<String> {
    if let Some(uuid) = fields.get("uuid").and_then(Value::as_str) {
        return Some(uuid.to_string());
    }
    match fields.get("gpu_id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => n.as_i64().map(|i| format!("gpu-{i:04}")),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn s5_decodes_dcgm_shaped_message() {
        let raw = br#"{
            "uuid": "GPU-11111111-2222-3333-4444-555555555555",
            "Hostname": "node-a",
            "metric_name": "DCGM_FI_DEV_GPU_UTIL",
            "value": "75.5",
            "timestamp": 0
        }"#;

        let telemetry = decode(raw).unwrap();

        assert_eq!(telemetry.gpu_id, "GPU-11111111-2222-3333-4444-555555555555");
        assert_eq!(telemetry.hostname, "node-a");
        assert_eq!(telemetry.metrics.get("DCGM_FI_DEV_GPU_UTIL"), Some(&75.5));
        assert!((Utc::now() - telemetry.timestamp).num_seconds() < 5);
    }

    #[test]
    fn synthesizes_gpu_id_from_numeric_gpu_id_field() {
        let raw = br#"{"gpu_id": 3, "value": 10}"#;
        let telemetry = decode(raw).unwrap();
        assert_eq!(telemetry.gpu_id, "gpu-0003");
    }

    #[test]
    fn string_gpu_id_field_used_directly() {
        let raw = br#"{"gpu_id": "gpu-alpha", "value": 1}"#;
        let telemetry = decode(raw).unwrap();
        assert_eq!(telemetry.gpu_id, "gpu-alpha");
    }

    #[test]
    fn missing_gpu_id_is_a_decode_error() {
        let raw = br#"{"value": 1}"#;
        let result = decode(raw);
        assert!(matches!(result, Err(CollectorError::UnresolvableGpuId)));
    }

    #[test]
    fn additional_fields_are_captured_excluding_reserved_keys() {
        let raw = br#"{
            "uuid": "gpu-1",
            "value": 1,
            "metric_name": "util",
            "temperature": 65.0,
            "power_watts": "250.2",
            "driver_version": "535.1"
        }"#;
        let telemetry = decode(raw).unwrap();

        assert_eq!(telemetry.metrics.get("util"), Some(&1.0));
        assert_eq!(telemetry.metrics.get("temperature"), Some(&65.0));
        assert_eq!(telemetry.metrics.get("power_watts"), Some(&250.2));
        assert!(!telemetry.metrics.contains_key("driver_version"));
        assert!(!telemetry.metrics.contains_key("gpu_id"));
    }

    #[test]
    fn nonzero_timestamp_is_preserved() {
        let raw = br#"{"uuid": "gpu-1", "value": 1, "timestamp": 1700000000}"#;
        let telemetry = decode(raw).unwrap();
        assert_eq!(telemetry.timestamp.timestamp(), 1700000000);
    }

    #[test]
    fn decode_is_deterministic_for_nonzero_timestamp() {
        let raw = br#"{"uuid": "gpu-1", "value": 1, "timestamp": 42}"#;
        let first = decode(raw).unwrap();
        let second = decode(raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let result = decode(b"not json");
        assert!(matches!(result, Err(CollectorError::InvalidPayload(_))));
    }
}
