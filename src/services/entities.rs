//! Host-facing entity descriptors built from a [`HostView`]

use crate::services::coordinator::HostView;
use crate::services::models::{Device, Metric};
use serde::Serialize;
use std::collections::BTreeMap;

pub const MANUFACTURER: &str = "Hanna Instruments";

/// Entity value: status text or a metric number
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Text(String),
    Number(f64),
}

/// Device registry information shared by all entities of a device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: String,
    pub sw_version: Option<String>,
}

/// One entity the host should expose
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDescriptor {
    /// `<device_id>_<key>`
    pub unique_id: String,
    pub name: String,
    /// `status` or a metric key
    pub key: &'static str,
    pub unit: Option<&'static str>,
    pub value: Option<EntityValue>,
    pub available: bool,
    pub device: DeviceInfo,
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Describe every entity for the current view
///
/// Each device gets a status entity plus one entity per metric it reported.
pub fn describe(view: &HostView) -> Vec<EntityDescriptor> {
    let available = view.status.available;
    let mut entities = Vec::new();

    for device in &view.snapshot.devices {
        let info = device_info(device);
        let attributes = device_attributes(device);

        let mut status_attributes = attributes.clone();
        insert_list(&mut status_attributes, "alarms", &device.alarms);
        insert_list(&mut status_attributes, "warnings", &device.warnings);
        insert_list(&mut status_attributes, "errors", &device.errors);
        if let Some(state) = &device.connection_state {
            status_attributes.insert("connection_state".into(), state.clone().into());
        }
        insert_controller_state(&mut status_attributes, device);

        entities.push(EntityDescriptor {
            unique_id: format!("{}_status", device.device_id),
            name: format!("{} Status", device.name),
            key: "status",
            unit: None,
            value: device.status.clone().map(EntityValue::Text),
            available,
            device: info.clone(),
            attributes: status_attributes,
        });

        for metric in Metric::ALL {
            let Some(reading) = view.snapshot.reading(&device.device_id, metric) else {
                continue;
            };
            let mut attributes = attributes.clone();
            attributes.insert("reading_time".into(), reading.timestamp.to_rfc3339().into());

            entities.push(EntityDescriptor {
                unique_id: format!("{}_{}", device.device_id, metric.key()),
                name: format!("{} {}", device.name, metric.label()),
                key: metric.key(),
                unit: Some(metric.unit()),
                value: Some(EntityValue::Number(reading.value)),
                available,
                device: info.clone(),
                attributes,
            });
        }
    }

    entities
}

fn device_info(device: &Device) -> DeviceInfo {
    DeviceInfo {
        identifier: device.device_id.clone(),
        name: device.name.clone(),
        manufacturer: MANUFACTURER,
        model: device.model_group.to_string(),
        sw_version: device.firmware.clone(),
    }
}

fn device_attributes(device: &Device) -> BTreeMap<String, serde_json::Value> {
    let mut attributes = BTreeMap::new();
    attributes.insert("device_id".into(), device.device_id.clone().into());
    attributes.insert("device_name".into(), device.name.clone().into());
    attributes.insert("model_group".into(), device.model_group.as_str().into());
    if let Some(firmware) = &device.firmware {
        attributes.insert("firmware".into(), firmware.clone().into());
    }
    if let Some(tank) = &device.tank_name {
        attributes.insert("tank_name".into(), tank.clone().into());
    }
    if let Some(battery) = &device.battery_status {
        attributes.insert("battery_status".into(), battery.clone().into());
    }
    if let Some(updated) = device.last_update {
        attributes.insert("last_updated".into(), updated.to_rfc3339().into());
    }
    attributes
}

fn insert_controller_state(attributes: &mut BTreeMap<String, serde_json::Value>, device: &Device) {
    for (key, value) in &device.status_details {
        attributes.insert(format!("status_{key}"), value.clone().into());
    }

    let dosing = &device.dosing;
    let calibration = &device.calibration;
    let text = [
        ("ph_pump", &dosing.ph_pump),
        ("chlorine_pump", &dosing.chlorine_pump),
        ("ph_calibration_date", &calibration.ph_calibrated_at),
        ("orp_calibration_date", &calibration.orp_calibrated_at),
    ];
    for (key, value) in text {
        if let Some(value) = value {
            attributes.insert(key.into(), value.clone().into());
        }
    }

    let numbers = [
        ("acid_base_last_dosed_l", dosing.acid_base_last_dosed),
        ("chlorine_last_dosed_l", dosing.chlorine_last_dosed),
        ("ph_slope_percent", calibration.ph_slope),
        ("ph_offset_mv", calibration.ph_offset),
    ];
    for (key, value) in numbers {
        if let Some(value) = value {
            attributes.insert(key.into(), value.into());
        }
    }
}

fn insert_list(attributes: &mut BTreeMap<String, serde_json::Value>, key: &str, values: &[String]) {
    if !values.is_empty() {
        attributes.insert(key.into(), values.to_vec().into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::coordinator::PollStatus;
    use crate::services::models::{Calibration, DosingState, ModelGroup, Reading, Snapshot};
    use chrono::Utc;
    use std::sync::Arc;

    fn view(available: bool) -> HostView {
        let now = Utc::now();
        let device = Device {
            device_id: "dev-1".into(),
            name: "Pool".into(),
            model_group: ModelGroup::Halo,
            firmware: Some("1.4".into()),
            tank_name: Some("Main".into()),
            battery_status: None,
            last_update: Some(now),
            status: Some("Green".into()),
            connection_state: None,
            alarms: vec!["Low pH".into()],
            warnings: vec![],
            errors: vec![],
            status_details: [("statuscolor".to_string(), "Green".to_string())].into(),
            dosing: DosingState {
                ph_pump: Some("Green".into()),
                acid_base_last_dosed: Some(0.35),
                ..Default::default()
            },
            calibration: Calibration {
                ph_slope: Some(98.5),
                ..Default::default()
            },
        };
        let reading = |metric: Metric, value: f64| Reading {
            device_id: "dev-1".into(),
            metric,
            value,
            unit: metric.unit().into(),
            timestamp: now,
        };
        HostView {
            snapshot: Arc::new(Snapshot {
                devices: vec![device],
                readings: vec![reading(Metric::Ph, 7.2), reading(Metric::TemperatureC, 25.3)],
                fetched_at: Some(now),
            }),
            status: PollStatus {
                available,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_status_plus_one_entity_per_reading() {
        let entities = describe(&view(true));
        let ids: Vec<_> = entities.iter().map(|e| e.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["dev-1_status", "dev-1_ph", "dev-1_temperature"]);

        let ph = &entities[1];
        assert_eq!(ph.name, "Pool pH");
        assert_eq!(ph.unit, Some("pH"));
        assert_eq!(ph.value, Some(EntityValue::Number(7.2)));
        assert_eq!(ph.device.manufacturer, "Hanna Instruments");
        assert_eq!(ph.attributes["tank_name"], "Main");
        assert!(!ph.attributes.contains_key("battery_status"));

        let status = &entities[0];
        assert_eq!(status.value, Some(EntityValue::Text("Green".into())));
        assert_eq!(status.attributes["alarms"], serde_json::json!(["Low pH"]));
        assert!(!status.attributes.contains_key("warnings"));
    }

    #[test]
    fn test_status_entity_carries_controller_state() {
        let entities = describe(&view(true));
        let status = &entities[0].attributes;
        assert_eq!(status["status_statuscolor"], "Green");
        assert_eq!(status["ph_pump"], "Green");
        assert_eq!(status["acid_base_last_dosed_l"], 0.35);
        assert_eq!(status["ph_slope_percent"], 98.5);
        assert!(!status.contains_key("chlorine_pump"));
        assert!(!status.contains_key("ph_calibration_date"));

        // Metric entities only carry device metadata
        assert!(!entities[1].attributes.contains_key("ph_pump"));
    }

    #[test]
    fn test_unavailable_view_keeps_values() {
        let entities = describe(&view(false));
        assert!(entities.iter().all(|e| !e.available));
        assert_eq!(entities[2].value, Some(EntityValue::Number(25.3)));
    }

    #[test]
    fn test_empty_snapshot_has_no_entities() {
        let view = HostView {
            snapshot: Arc::new(Snapshot::empty()),
            status: PollStatus::default(),
        };
        assert!(describe(&view).is_empty());
    }
}
