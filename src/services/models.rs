//! Normalized device and sensor model
//!
//! These are the only shapes that leave the crate: whatever the vendor API
//! returns is mapped onto [`Device`] and [`Reading`] records and published
//! as an immutable [`Snapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Controller families supported by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelGroup {
    #[serde(rename = "BL12x")]
    Bl12x,
    #[serde(rename = "BL13x")]
    Bl13x,
    #[serde(rename = "BL13xs")]
    Bl13xs,
    #[serde(rename = "HALO")]
    Halo,
    #[serde(rename = "photoMeter")]
    PhotoMeter,
    #[serde(rename = "multiParameter")]
    MultiParameter,
}

impl ModelGroup {
    /// Every supported model group
    pub const ALL: [ModelGroup; 6] = [
        ModelGroup::Bl12x,
        ModelGroup::Bl13x,
        ModelGroup::Bl13xs,
        ModelGroup::Halo,
        ModelGroup::PhotoMeter,
        ModelGroup::MultiParameter,
    ];

    /// Vendor identifier as used in GraphQL payloads
    pub fn as_str(self) -> &'static str {
        match self {
            ModelGroup::Bl12x => "BL12x",
            ModelGroup::Bl13x => "BL13x",
            ModelGroup::Bl13xs => "BL13xs",
            ModelGroup::Halo => "HALO",
            ModelGroup::PhotoMeter => "photoMeter",
            ModelGroup::MultiParameter => "multiParameter",
        }
    }

    /// Parse a vendor identifier; unknown groups yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|group| group.as_str().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for ModelGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measured quantity of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// pH, dimensionless
    Ph,
    /// Water temperature in degrees Celsius
    TemperatureC,
    /// Oxidation-reduction potential in millivolts
    RedoxMv,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Ph, Metric::TemperatureC, Metric::RedoxMv];

    /// Stable key used in entity ids
    pub fn key(self) -> &'static str {
        match self {
            Metric::Ph => "ph",
            Metric::TemperatureC => "temperature",
            Metric::RedoxMv => "redox",
        }
    }

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            Metric::Ph => "pH",
            Metric::TemperatureC => "Temperature",
            Metric::RedoxMv => "Redox",
        }
    }

    /// Canonical unit after normalization
    pub fn unit(self) -> &'static str {
        match self {
            Metric::Ph => "pH",
            Metric::TemperatureC => "°C",
            Metric::RedoxMv => "mV",
        }
    }

    /// Parameter names the vendor uses for this metric
    pub fn vendor_names(self) -> &'static [&'static str] {
        match self {
            Metric::Ph => &["ph"],
            Metric::TemperatureC => &["temp", "temperature"],
            Metric::RedoxMv => &["orp", "redox"],
        }
    }
}

/// One physical controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub name: String,
    pub model_group: ModelGroup,
    pub firmware: Option<String>,
    pub tank_name: Option<String>,
    pub battery_status: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    /// Status color reported by the controller, or the cloud-side device status
    pub status: Option<String>,
    pub connection_state: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alarms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Every entry of the controller status block, keyed in lower case
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub status_details: BTreeMap<String, String>,
    #[serde(default)]
    pub dosing: DosingState,
    #[serde(default)]
    pub calibration: Calibration,
}

/// Dosing pumps and the volumes they delivered last
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DosingState {
    /// Pump status color, as shown by the controller
    pub ph_pump: Option<String>,
    pub chlorine_pump: Option<String>,
    /// Litres
    pub acid_base_last_dosed: Option<f64>,
    /// Litres
    pub chlorine_last_dosed: Option<f64>,
}

/// Last GLP calibration record
///
/// Calibration dates are kept as the controller formats them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub ph_calibrated_at: Option<String>,
    pub orp_calibrated_at: Option<String>,
    /// Percent
    pub ph_slope: Option<f64>,
    /// Millivolts
    pub ph_offset: Option<f64>,
}

/// A single metric value of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub metric: Metric,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

/// Latest consistent set of devices and readings
///
/// Devices are sorted by id and readings by `(device_id, metric)`, so two
/// snapshots built from the same payload compare equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub devices: Vec<Device>,
    pub readings: Vec<Reading>,
    /// When the underlying payload was fetched; `None` before the first update
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Snapshot with no data, used before the first successful cycle
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    pub fn readings_for<'a>(&'a self, device_id: &'a str) -> impl Iterator<Item = &'a Reading> + 'a {
        self.readings.iter().filter(move |r| r.device_id == device_id)
    }

    pub fn reading(&self, device_id: &str, metric: Metric) -> Option<&Reading> {
        self.readings
            .iter()
            .find(|r| r.device_id == device_id && r.metric == metric)
    }

    /// Every reading belongs to a device of this snapshot
    pub fn is_consistent(&self) -> bool {
        self.readings
            .iter()
            .all(|r| self.device(&r.device_id).is_some())
    }
}
