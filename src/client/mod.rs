//! Hanna Cloud transport: trait seams, raw payload types and the HTTP client

pub mod graphql;
pub mod http_client;

use crate::auth::token::TokenPair;
use crate::config::credentials::Credentials;
use crate::config::CloudConfig;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use http_client::HannaHttpClient;

/// Authentication endpoint operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange credentials for a fresh token pair
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair>;

    /// Exchange the refresh token of `current` for a new pair
    async fn refresh(&self, current: &TokenPair) -> Result<TokenPair>;
}

/// Telemetry query operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceEndpoint: Send + Sync {
    /// Fetch every device of the account together with its latest reading
    async fn fetch_devices(&self, token: &TokenPair) -> Result<RawPayload>;
}

/// Device list as returned by the vendor, stamped with the fetch time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    pub devices: Vec<RawDevice>,
    pub fetched_at: DateTime<Utc>,
}

/// One device record of the `devices` query
///
/// Everything except the id is optional: absent fields mean the device
/// does not have that feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDevice {
    #[serde(rename = "DID", default)]
    pub did: Option<String>,

    #[serde(default)]
    pub model_group: Option<String>,

    #[serde(default)]
    pub device_name: Option<String>,

    #[serde(rename = "DINFO", default)]
    pub dinfo: Option<RawDeviceInfo>,

    #[serde(default)]
    pub status: Option<serde_json::Value>,

    #[serde(default)]
    pub last_updated: Option<serde_json::Value>,

    #[serde(default)]
    pub battery_status: Option<serde_json::Value>,

    /// Latest reading, attached by the client after the readings query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<RawReading>,

    /// Fields this crate does not model (including flat metric values)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `DINFO` block of a device record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeviceInfo {
    #[serde(default)]
    pub device_name: Option<String>,

    #[serde(default)]
    pub device_version: Option<serde_json::Value>,

    #[serde(default)]
    pub tank_name: Option<String>,

    #[serde(default)]
    pub tank_id: Option<serde_json::Value>,
}

/// One entry of the `lastDeviceReadings` query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(rename = "DID")]
    pub did: String,

    #[serde(rename = "DT", default)]
    pub dt: Option<serde_json::Value>,

    #[serde(default)]
    pub messages: Option<serde_json::Value>,
}

impl RawReading {
    /// The `messages` object, decoding it when the server sent it as a JSON string
    pub fn messages(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        match self.messages.as_ref()? {
            serde_json::Value::Object(map) => Some(map.clone()),
            serde_json::Value::String(text) => match serde_json::from_str(text) {
                Ok(serde_json::Value::Object(map)) => Some(map),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Create the HTTP client for both endpoint roles
pub fn create_client(config: &CloudConfig) -> Result<Arc<HannaHttpClient>> {
    Ok(Arc::new(HannaHttpClient::new(config.clone())?))
}
