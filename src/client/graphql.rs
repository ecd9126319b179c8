//! GraphQL request/response envelope and the operations used against Hanna Cloud

use crate::error::{HannaError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const LOGIN_QUERY: &str = r#"query Login($email: String!, $password: String!, $userLanguage: String!, $source: String) {
  login(email: $email, password: $password, language: $userLanguage, source: $source) {
    token
    tokenType
    __typename
  }
}"#;

pub const REFRESH_MUTATION: &str = r#"mutation RefreshToken($refreshToken: String!) {
  refreshToken(refreshToken: $refreshToken) {
    token
    tokenType
    refreshToken
    expiresIn
    __typename
  }
}"#;

pub const DEVICES_QUERY: &str = r#"query Devices($modelGroups: [String!], $deviceLogs: Boolean!) {
  devices(modelGroups: $modelGroups, deviceLogs: $deviceLogs) {
    _id
    DID
    DM
    modelGroup
    DT
    DINFO {
      deviceName
      deviceVersion
      tankId
      tankName
      __typename
    }
    status
    lastUpdated
    message
    deviceName
    batteryStatus
    __typename
  }
}"#;

pub const LAST_READINGS_QUERY: &str = r#"query GetLastDeviceReading($deviceIds: [String!]) {
  lastDeviceReadings(deviceIds: $deviceIds) {
    DID
    DT
    messages
    __typename
  }
}"#;

/// A GraphQL operation as posted to the server
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub operation_name: &'static str,
    pub variables: serde_json::Value,
    pub query: &'static str,
}

impl GraphQlRequest {
    pub fn new(operation_name: &'static str, query: &'static str, variables: serde_json::Value) -> Self {
        Self {
            operation_name,
            variables,
            query,
        }
    }
}

/// Response envelope
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

/// One entry of the `errors` array
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub extensions: Option<serde_json::Value>,
}

impl GraphQlError {
    fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }

    /// Server flagged the request as unauthenticated or forbidden
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self.code().map(str::to_ascii_uppercase).as_deref(),
            Some("UNAUTHENTICATED") | Some("UNAUTHORIZED") | Some("FORBIDDEN")
        )
    }

    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("Unknown GraphQL error")
    }
}

impl<T> GraphQlResponse<T> {
    /// Turn the envelope into data or the error the coordinator acts on
    pub fn into_data(self, operation: &str) -> Result<T> {
        if let Some(first) = self.errors.as_ref().and_then(|errors| errors.first()) {
            let message = format!("{operation}: {}", first.message_or_default());
            return Err(if first.is_auth_rejection() {
                HannaError::authentication(message)
            } else {
                HannaError::api(message)
            });
        }

        self.data
            .ok_or_else(|| HannaError::api(format!("{operation}: response carried no data")))
    }
}

/// Parse a response body into the envelope
pub fn parse_response<T: DeserializeOwned>(body: &str, operation: &str) -> Result<GraphQlResponse<T>> {
    serde_json::from_str(body)
        .map_err(|e| HannaError::api(format!("{operation}: malformed GraphQL response: {e}")))
}

/// A field that the vendor returns either as an object or as a list of objects
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(items) => items.into_iter().next(),
            OneOrMany::One(item) => Some(item),
        }
    }
}
