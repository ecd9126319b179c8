//! WireMock-based Hanna Cloud API mocking infrastructure
//!
//! Simulates the `/api/auth` and `/api/graphql` endpoints so the client,
//! auth flow and poll cycle can be exercised without the real cloud.

use hanna_cloud_rust::ServerConfig;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const AUTH_PATH: &str = "/api/auth";
pub const GRAPHQL_PATH: &str = "/api/graphql";

/// Mock Hanna Cloud for testing
pub struct MockHannaCloud {
    pub server: MockServer,
}

impl MockHannaCloud {
    /// Start an empty mock; tests mount the endpoints they need
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Server configuration pointing at this mock
    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.cloud.base_url = format!("{}/api/", self.server.uri())
            .parse()
            .expect("mock URL");
        config.cloud.timeout = Duration::from_secs(2);
        config
    }

    /// Login answering with `token`, at most `times` times when given
    pub async fn mount_login(&self, token: &str, times: Option<u64>) {
        let mock = Mock::given(method("POST"))
            .and(path(AUTH_PATH))
            .and(body_partial_json(json!({ "operationName": "Login" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_response(token)));

        match times {
            Some(n) => mock.up_to_n_times(n).with_priority(1).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }

    /// Login answering with an arbitrary status and body
    pub async fn mount_login_response(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(AUTH_PATH))
            .and(body_partial_json(json!({ "operationName": "Login" })))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// RefreshToken mutation answering with `token`
    pub async fn mount_refresh(&self, refresh_token: &str, token: &str) {
        Mock::given(method("POST"))
            .and(path(AUTH_PATH))
            .and(body_partial_json(json!({
                "operationName": "RefreshToken",
                "variables": { "refreshToken": refresh_token }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "refreshToken": {
                        "token": token,
                        "refreshToken": format!("{token}-refresh"),
                        "expiresIn": 3600
                    }
                }
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Devices query for bearer `token`
    pub async fn mount_devices(&self, token: &str, devices: Value) {
        self.mount_graphql(
            token,
            "Devices",
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "devices": devices } })),
        )
        .await;
    }

    /// GetLastDeviceReading query for bearer `token`
    pub async fn mount_readings(&self, token: &str, readings: Value) {
        self.mount_graphql(
            token,
            "GetLastDeviceReading",
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "lastDeviceReadings": readings } })),
        )
        .await;
    }

    /// Any GraphQL operation for bearer `token` with a custom response
    pub async fn mount_graphql(&self, token: &str, operation: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(header("Authorization", format!("Bearer {token}").as_str()))
            .and(body_partial_json(json!({ "operationName": operation })))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Bodies of every request received on `path`
    pub async fn request_bodies(&self, endpoint: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == endpoint)
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }
}

/// Login response in the list shape the vendor returns
pub fn login_response(token: &str) -> Value {
    json!({
        "data": {
            "login": [{
                "token": token,
                "tokenType": "Bearer",
                "expiresIn": 3600,
                "__typename": "LoginResponse"
            }]
        }
    })
}

/// A HALO controller reporting pH and temperature but no redox
pub fn halo_device() -> Value {
    json!({
        "DID": "HALO-0001",
        "modelGroup": "HALO",
        "deviceName": "Pool",
        "DINFO": {
            "deviceName": "HALO pool sensor",
            "deviceVersion": "1.0.7",
            "tankName": "Outdoor pool",
            "tankId": "tank-1"
        },
        "status": "connected",
        "lastUpdated": "2024-06-01T11:59:00Z",
        "batteryStatus": "85",
        "__typename": "Device"
    })
}

pub fn halo_reading() -> Value {
    json!({
        "DID": "HALO-0001",
        "DT": "2024-06-01 11:58:30",
        "messages": {
            "parameters": [
                { "name": "ph", "value": "7.2" },
                { "name": "temp", "value": 25.3 }
            ],
            "status": { "StatusColor": "Green" },
            "alarms": [],
            "connectionState": "online"
        }
    })
}
