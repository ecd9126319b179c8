//! HTTP client for the Hanna Cloud auth and GraphQL endpoints
//!
//! One `reqwest` client serves both endpoint roles. Every call is a single
//! attempt: retries and re-authentication are decided by the caller based on
//! the error kind.

use crate::auth::token::TokenPair;
use crate::client::graphql::{self, GraphQlRequest, GraphQlResponse, OneOrMany};
use crate::client::{DeviceEndpoint, RawDevice, RawPayload, RawReading, TokenEndpoint};
use crate::config::credentials::Credentials;
use crate::config::CloudConfig;
use crate::crypto::encrypt_credential;
use crate::error::{transport_error, HannaError, Result};
use crate::logging::loggable_body;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, ORIGIN, REFERER};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use url::Url;

/// Grant returned by the login and refresh operations
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantPayload {
    #[serde(alias = "accessToken")]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    login: Option<OneOrMany<GrantPayload>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    refresh_token: Option<OneOrMany<GrantPayload>>,
}

#[derive(Debug, Deserialize)]
struct DevicesData {
    #[serde(default)]
    devices: Option<Vec<RawDevice>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadingsData {
    #[serde(default)]
    last_device_readings: Option<Vec<RawReading>>,
}

/// Hanna Cloud HTTP client
pub struct HannaHttpClient {
    /// HTTP client instance
    client: Client,

    /// Endpoint configuration
    config: CloudConfig,

    auth_url: Url,
    graphql_url: Url,
}

impl HannaHttpClient {
    /// Create a new client for the configured endpoints
    pub fn new(config: CloudConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| HannaError::config(format!("Failed to build HTTP client: {e}")))?;

        let auth_url = config.auth_url()?;
        let graphql_url = config.graphql_url()?;

        Ok(Self {
            client,
            config,
            auth_url,
            graphql_url,
        })
    }

    /// Endpoint configuration this client was built with
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    fn browser_headers(&self, page: &str) -> Result<HeaderMap> {
        let origin = self.config.origin();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&origin)
                .map_err(|e| HannaError::config(format!("Invalid origin header: {e}")))?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{origin}/{page}"))
                .map_err(|e| HannaError::config(format!("Invalid referer header: {e}")))?,
        );
        Ok(headers)
    }

    /// Post one GraphQL operation and decode the response envelope
    async fn post<T: DeserializeOwned>(
        &self,
        url: &Url,
        request: &GraphQlRequest,
        headers: HeaderMap,
    ) -> Result<GraphQlResponse<T>> {
        let operation = request.operation_name;
        debug!("POST {} ({})", url, operation);

        let response = self
            .client
            .post(url.clone())
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(operation, e))?;

        debug!("{} response status: {}", operation, status);
        debug!("{} response body: {}", operation, loggable_body(&body));

        check_status(operation, status, &body)?;

        graphql::parse_response::<T>(&body, operation)
    }

    async fn query<T: DeserializeOwned>(&self, token: &TokenPair, request: GraphQlRequest) -> Result<T> {
        let mut headers = self.browser_headers("dashboard")?;
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&token.bearer())
                .map_err(|_| HannaError::authentication("Access token is not a valid header value"))?,
        );
        let operation = request.operation_name;
        self.post(&self.graphql_url, &request, headers)
            .await?
            .into_data(operation)
    }

    async fn fetch_readings(
        &self,
        token: &TokenPair,
        device_ids: Vec<String>,
    ) -> Result<HashMap<String, RawReading>> {
        let request = GraphQlRequest::new(
            "GetLastDeviceReading",
            graphql::LAST_READINGS_QUERY,
            serde_json::json!({ "deviceIds": device_ids }),
        );
        let data: ReadingsData = self.query(token, request).await?;

        Ok(data
            .last_device_readings
            .unwrap_or_default()
            .into_iter()
            .map(|reading| (reading.did.clone(), reading))
            .collect())
    }
}

/// First GraphQL error message carried by an error response body, if any
fn server_message(body: &str, operation: &str) -> Option<String> {
    let response = graphql::parse_response::<serde_json::Value>(body, operation).ok()?;
    response
        .errors?
        .into_iter()
        .next()
        .and_then(|error| error.message)
}

/// Map an HTTP status onto the error taxonomy, keeping the server's message
fn check_status(operation: &str, status: StatusCode, body: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    let detail = server_message(body, operation)
        .map(|message| format!(": {message}"))
        .unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HannaError::authentication(
            format!("{operation} rejected with HTTP {status}{detail}"),
        )),
        s if s.is_server_error() => Err(HannaError::network(format!(
            "{operation} failed with HTTP {status}{detail}"
        ))),
        _ => Err(HannaError::api(format!(
            "{operation} failed with HTTP {status}{detail}"
        ))),
    }
}

fn into_token_pair(grant: Option<OneOrMany<GrantPayload>>, operation: &str) -> Result<TokenPair> {
    let grant = grant
        .and_then(OneOrMany::into_first)
        .ok_or_else(|| HannaError::authentication(format!("{operation} returned no grant")))?;

    let access_token = grant
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| HannaError::authentication(format!("{operation} returned no token")))?;

    TokenPair::from_grant(access_token, grant.refresh_token, grant.expires_in, Utc::now())
}

#[async_trait]
impl TokenEndpoint for HannaHttpClient {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair> {
        let request = GraphQlRequest::new(
            "Login",
            graphql::LOGIN_QUERY,
            serde_json::json!({
                "email": encrypt_credential(&credentials.email)?,
                "password": encrypt_credential(&credentials.password)?,
                "userLanguage": self.config.language,
                "source": "web",
            }),
        );

        let headers = self.browser_headers("login")?;
        let response: GraphQlResponse<LoginData> =
            self.post(&self.auth_url, &request, headers).await?;

        // Any server-side error on login means the credentials were not accepted
        if let Some(error) = response.errors.as_ref().and_then(|errors| errors.first()) {
            return Err(HannaError::authentication(format!(
                "Login failed: {}",
                error.message_or_default()
            )));
        }
        let data = response.into_data("Login")?;
        let pair = into_token_pair(data.login, "Login")?;

        info!("Authenticated with Hanna Cloud, token valid until {}", pair.expires_at());
        Ok(pair)
    }

    async fn refresh(&self, current: &TokenPair) -> Result<TokenPair> {
        let refresh_token = current
            .refresh_token()
            .ok_or_else(|| HannaError::authentication("No refresh token available"))?;

        let request = GraphQlRequest::new(
            "RefreshToken",
            graphql::REFRESH_MUTATION,
            serde_json::json!({ "refreshToken": refresh_token }),
        );

        let headers = self.browser_headers("dashboard")?;
        let data: RefreshData = self
            .post(&self.auth_url, &request, headers)
            .await?
            .into_data("RefreshToken")?;
        let pair = into_token_pair(data.refresh_token, "RefreshToken")?;

        debug!("Token refreshed, valid until {}", pair.expires_at());
        Ok(pair)
    }
}

#[async_trait]
impl DeviceEndpoint for HannaHttpClient {
    async fn fetch_devices(&self, token: &TokenPair) -> Result<RawPayload> {
        if token.is_expired_at(Utc::now()) {
            return Err(HannaError::authentication(
                "Refusing to send an expired access token",
            ));
        }

        let model_groups: Vec<&str> = self.config.model_groups.iter().map(|g| g.as_str()).collect();
        let request = GraphQlRequest::new(
            "Devices",
            graphql::DEVICES_QUERY,
            serde_json::json!({ "modelGroups": model_groups, "deviceLogs": true }),
        );
        let data: DevicesData = self.query(token, request).await?;
        let mut devices = data
            .devices
            .ok_or_else(|| HannaError::api("Devices: response carried no device list"))?;

        let device_ids: Vec<String> = devices.iter().filter_map(|d| d.did.clone()).collect();
        if !device_ids.is_empty() {
            let mut readings = self.fetch_readings(token, device_ids).await?;
            for device in &mut devices {
                if let Some(did) = device.did.as_deref() {
                    device.reading = readings.remove(did);
                }
            }
            if !readings.is_empty() {
                warn!("Ignoring {} readings for unknown devices", readings.len());
            }
        }

        debug!("Fetched {} devices from Hanna Cloud", devices.len());
        Ok(RawPayload {
            devices,
            fetched_at: Utc::now(),
        })
    }
}
