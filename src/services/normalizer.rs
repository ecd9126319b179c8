//! Maps raw vendor device records onto the normalized model
//!
//! [`normalize`] is a pure function of the payload: it never fails, skips
//! what it cannot map with a warning and never invents values.

use crate::client::{RawDevice, RawPayload};
use crate::services::models::{Calibration, Device, DosingState, Metric, ModelGroup, Reading, Snapshot};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Epoch values above this are milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

/// Build a snapshot from one fetched payload
pub fn normalize(payload: &RawPayload) -> Snapshot {
    let mut by_id: BTreeMap<String, (Device, Vec<Reading>)> = BTreeMap::new();

    for raw in &payload.devices {
        let Some(entry) = normalize_device(raw, payload.fetched_at) else {
            continue;
        };
        let device_id = entry.0.device_id.clone();
        if by_id.insert(device_id.clone(), entry).is_some() {
            warn!("Duplicate device id {} in payload, keeping the last entry", device_id);
        }
    }

    let mut snapshot = Snapshot {
        devices: Vec::with_capacity(by_id.len()),
        readings: Vec::new(),
        fetched_at: Some(payload.fetched_at),
    };
    for (_, (device, readings)) in by_id {
        snapshot.devices.push(device);
        snapshot.readings.extend(readings);
    }

    debug!(
        "Normalized {} devices and {} readings",
        snapshot.devices.len(),
        snapshot.readings.len()
    );
    snapshot
}

fn normalize_device(raw: &RawDevice, fetched_at: DateTime<Utc>) -> Option<(Device, Vec<Reading>)> {
    let Some(device_id) = raw.did.as_deref().map(str::trim).filter(|id| !id.is_empty()) else {
        warn!("Skipping device record without DID");
        return None;
    };

    let model_group = match raw.model_group.as_deref().map(ModelGroup::parse) {
        Some(Some(group)) => group,
        Some(None) => {
            warn!(
                "Skipping device {} with unsupported model group {:?}",
                device_id,
                raw.model_group.as_deref().unwrap_or_default()
            );
            return None;
        }
        None => {
            warn!("Skipping device {} without model group", device_id);
            return None;
        }
    };

    let dinfo = raw.dinfo.clone().unwrap_or_default();
    let messages = raw.reading.as_ref().and_then(|r| r.messages());
    let status_block = messages
        .as_ref()
        .and_then(|m| m.get("status"))
        .and_then(Value::as_object);

    let name = non_empty(raw.device_name.as_deref())
        .or_else(|| non_empty(dinfo.device_name.as_deref()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Device {device_id}"));

    let status = status_block
        .and_then(|s| s.get("StatusColor"))
        .and_then(value_to_string)
        .or_else(|| raw.status.as_ref().and_then(value_to_string));

    let last_update = raw.last_updated.as_ref().and_then(parse_timestamp);

    let device = Device {
        device_id: device_id.to_string(),
        name,
        model_group,
        firmware: dinfo.device_version.as_ref().and_then(value_to_string),
        tank_name: non_empty(dinfo.tank_name.as_deref()).map(str::to_string),
        battery_status: raw.battery_status.as_ref().and_then(value_to_string),
        last_update,
        status,
        connection_state: messages
            .as_ref()
            .and_then(|m| m.get("connectionState"))
            .and_then(value_to_string),
        alarms: string_list(messages.as_ref(), "alarms"),
        warnings: string_list(messages.as_ref(), "warnings"),
        errors: string_list(messages.as_ref(), "errors"),
        status_details: status_block.map(status_details).unwrap_or_default(),
        dosing: dosing_state(device_id, status_block, messages.as_ref()),
        calibration: calibration(device_id, messages.as_ref()),
    };

    let timestamp = raw
        .reading
        .as_ref()
        .and_then(|r| r.dt.as_ref())
        .and_then(parse_timestamp)
        .or(last_update)
        .unwrap_or(fetched_at);

    let readings = Metric::ALL
        .into_iter()
        .filter_map(|metric| {
            let (value, unit) = find_metric(metric, messages.as_ref(), &raw.extra)?;
            let value = to_number(device_id, metric, value)?;
            let value = to_canonical_unit(metric, value, unit)?;
            Some(Reading {
                device_id: device_id.to_string(),
                metric,
                value,
                unit: metric.unit().to_string(),
                timestamp,
            })
        })
        .collect();

    Some((device, readings))
}

/// Locate the raw value of `metric`, with its unit if the vendor gave one
///
/// Order: `messages.parameters[]`, then flat keys of `messages`, then flat
/// keys of the device record.
fn find_metric<'a>(
    metric: Metric,
    messages: Option<&'a Map<String, Value>>,
    device_fields: &'a Map<String, Value>,
) -> Option<(&'a Value, Option<&'a str>)> {
    let names = metric.vendor_names();
    let matches = |key: &str| names.iter().any(|n| n.eq_ignore_ascii_case(key));

    if let Some(parameters) = messages
        .and_then(|m| m.get("parameters"))
        .and_then(Value::as_array)
    {
        let found = parameters.iter().filter_map(Value::as_object).find(|p| {
            p.get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| matches(name))
        });
        if let Some(parameter) = found {
            return parameter
                .get("value")
                .filter(|v| !v.is_null())
                .map(|v| (v, parameter.get("unit").and_then(Value::as_str)));
        }
    }

    let flat = |fields: &'a Map<String, Value>| {
        fields
            .iter()
            .find(|(key, value)| matches(key.as_str()) && !value.is_null())
            .map(|(_, value)| (value, None))
    };

    messages.and_then(flat).or_else(|| flat(device_fields))
}

fn to_number(device_id: &str, metric: Metric, value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Some(n),
        _ => {
            warn!(
                "Device {} reported non-numeric {} value {}",
                device_id,
                metric.key(),
                value
            );
            None
        }
    }
}

/// Convert to Celsius / mV / pH
fn to_canonical_unit(metric: Metric, value: f64, unit: Option<&str>) -> Option<f64> {
    let Some(unit) = unit.map(str::trim).filter(|u| !u.is_empty()) else {
        return Some(value);
    };

    match metric {
        Metric::TemperatureC => match unit.trim_start_matches('°').to_ascii_lowercase().as_str() {
            "c" | "celsius" => Some(value),
            "f" | "fahrenheit" => Some((value - 32.0) * 5.0 / 9.0),
            "k" | "kelvin" => Some(value - 273.15),
            other => {
                warn!("Unknown temperature unit {:?}, dropping reading", other);
                None
            }
        },
        Metric::RedoxMv => match unit.to_ascii_lowercase().as_str() {
            "mv" => Some(value),
            "v" => Some(value * 1000.0),
            other => {
                warn!("Unknown redox unit {:?}, dropping reading", other);
                None
            }
        },
        Metric::Ph => Some(value),
    }
}

/// Parse the timestamp formats the vendor mixes
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_epoch(n.as_f64()?),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(naive.and_utc());
                }
            }
            s.parse::<f64>().ok().and_then(from_epoch)
        }
        _ => None,
    }
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = if value >= EPOCH_MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };
    DateTime::from_timestamp_millis(millis as i64)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => non_empty(Some(s)).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn status_details(status: &Map<String, Value>) -> BTreeMap<String, String> {
    status
        .iter()
        .filter_map(|(key, value)| Some((key.to_lowercase(), value_to_string(value)?)))
        .collect()
}

fn dosing_state(
    device_id: &str,
    status: Option<&Map<String, Value>>,
    messages: Option<&Map<String, Value>>,
) -> DosingState {
    let volumes = object_field(messages, "lastDosedVolumes");
    DosingState {
        ph_pump: status.and_then(|s| s.get("phPumpColor")).and_then(value_to_string),
        chlorine_pump: status.and_then(|s| s.get("clPumpColor")).and_then(value_to_string),
        acid_base_last_dosed: number_field(device_id, volumes, "acidBase"),
        chlorine_last_dosed: number_field(device_id, volumes, "cl"),
    }
}

fn calibration(device_id: &str, messages: Option<&Map<String, Value>>) -> Calibration {
    let glp = object_field(messages, "glp");
    Calibration {
        ph_calibrated_at: glp.and_then(|g| g.get("pHDateTime")).and_then(value_to_string),
        orp_calibrated_at: glp.and_then(|g| g.get("orpDateTime")).and_then(value_to_string),
        ph_slope: number_field(device_id, glp, "pHSlope"),
        ph_offset: number_field(device_id, glp, "pHOffset"),
    }
}

fn object_field<'a>(parent: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a Map<String, Value>> {
    parent?.get(key)?.as_object()
}

/// Numeric field that may arrive as a number or a numeric string
fn number_field(device_id: &str, parent: Option<&Map<String, Value>>, key: &str) -> Option<f64> {
    let value = parent?.get(key)?;
    let number = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number.filter(|n| n.is_finite()) {
        Some(n) => Some(n),
        None => {
            warn!("Device {} reported non-numeric {} value {}", device_id, key, value);
            None
        }
    }
}

fn string_list(messages: Option<&Map<String, Value>>, key: &str) -> Vec<String> {
    match messages.and_then(|m| m.get(key)) {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
        Some(other) => value_to_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}
