//! Configuration management for the Hanna Cloud poller

pub mod credentials;

use crate::error::{HannaError, Result};
use crate::services::models::ModelGroup;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{env, time::Duration};
use url::Url;

/// Lowest accepted update interval in minutes
pub const MIN_UPDATE_INTERVAL_MINUTES: u32 = 1;
/// Highest accepted update interval in minutes
pub const MAX_UPDATE_INTERVAL_MINUTES: u32 = 60;
/// Update interval used when nothing is configured
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: u32 = 5;

const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Vendor cloud endpoints
    pub cloud: CloudConfig,

    /// Poll scheduling
    pub polling: PollingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Hanna Cloud endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// API base URL (e.g., "https://hannacloud.com/api/")
    pub base_url: Url,

    /// Authentication endpoint, relative to the base URL
    pub auth_path: String,

    /// GraphQL endpoint, relative to the base URL
    pub graphql_path: String,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// User agent sent with every request
    pub user_agent: String,

    /// Language variable of the login operation
    pub language: String,

    /// Model groups requested from the devices query
    pub model_groups: Vec<ModelGroup>,
}

/// Poll scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Time between poll cycles
    pub update_interval: UpdateInterval,

    /// Tokens closer than this to expiry are refreshed before use
    #[serde(with = "humantime_serde")]
    pub refresh_margin: Duration,

    /// Consecutive failed cycles after which a failure is reported as persistent
    pub persistent_error_threshold: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log to file (path)
    pub file: Option<String>,

    /// Prefix log lines with a timestamp
    pub timestamps: bool,
}

/// Update interval in whole minutes, always within 1–60
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct UpdateInterval(u32);

impl UpdateInterval {
    /// Validate a minute count
    pub fn from_minutes(minutes: u32) -> Result<Self> {
        if (MIN_UPDATE_INTERVAL_MINUTES..=MAX_UPDATE_INTERVAL_MINUTES).contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(HannaError::config(format!(
                "Update interval must be between {MIN_UPDATE_INTERVAL_MINUTES} and {MAX_UPDATE_INTERVAL_MINUTES} minutes, got {minutes}"
            )))
        }
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(u64::from(self.0) * 60)
    }
}

impl Default for UpdateInterval {
    fn default() -> Self {
        Self(DEFAULT_UPDATE_INTERVAL_MINUTES)
    }
}

impl TryFrom<u32> for UpdateInterval {
    type Error = HannaError;

    fn try_from(minutes: u32) -> Result<Self> {
        Self::from_minutes(minutes)
    }
}

impl From<UpdateInterval> for u32 {
    fn from(interval: UpdateInterval) -> Self {
        interval.0
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hannacloud.com/api/".parse().unwrap(),
            auth_path: "auth".to_string(),
            graphql_path: "graphql".to_string(),
            timeout: Duration::from_secs(15),
            user_agent: format!("hanna-cloud-rust/{}", env!("CARGO_PKG_VERSION")),
            language: "English".to_string(),
            model_groups: ModelGroup::ALL.to_vec(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            update_interval: UpdateInterval::default(),
            refresh_margin: Duration::from_secs(60),
            persistent_error_threshold: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: true,
        }
    }
}

impl CloudConfig {
    /// Resolve the authentication endpoint
    pub fn auth_url(&self) -> Result<Url> {
        self.join(&self.auth_path)
    }

    /// Resolve the GraphQL endpoint
    pub fn graphql_url(&self) -> Result<Url> {
        self.join(&self.graphql_path)
    }

    /// Web origin the vendor expects in `Origin`/`Referer` headers
    pub fn origin(&self) -> String {
        self.base_url.origin().ascii_serialization()
    }

    fn join(&self, path: &str) -> Result<Url> {
        // A base without trailing slash would drop its last segment on join
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| HannaError::config(format!("Invalid endpoint path {path}: {e}")))
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HannaError::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            HannaError::config(format!("Failed to parse config file {}: {e}", path.display()))
        })?;
        config.with_env_overrides()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = env::var("HANNA_BASE_URL") {
            self.cloud.base_url = url
                .parse()
                .map_err(|e| HannaError::config(format!("Invalid HANNA_BASE_URL: {e}")))?;
        }

        if let Ok(timeout) = env::var("HANNA_TIMEOUT") {
            self.cloud.timeout = Duration::from_secs(
                timeout
                    .parse()
                    .map_err(|e| HannaError::config(format!("Invalid HANNA_TIMEOUT: {e}")))?,
            );
        }

        if let Ok(interval) = env::var("HANNA_UPDATE_INTERVAL") {
            let minutes: u32 = interval
                .parse()
                .map_err(|e| HannaError::config(format!("Invalid HANNA_UPDATE_INTERVAL: {e}")))?;
            self.polling.update_interval = UpdateInterval::from_minutes(minutes)?;
        }

        if let Ok(language) = env::var("HANNA_LANGUAGE") {
            self.cloud.language = language;
        }

        if let Ok(level) = env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let scheme = self.cloud.base_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(HannaError::config("Base URL must use http or https scheme"));
        }

        if self.cloud.timeout.is_zero() {
            return Err(HannaError::config("Timeout must be greater than zero"));
        }

        if self.cloud.timeout > MAX_REQUEST_TIMEOUT {
            return Err(HannaError::config(format!(
                "Timeout must not exceed {}s",
                MAX_REQUEST_TIMEOUT.as_secs()
            )));
        }

        if self.cloud.model_groups.is_empty() {
            return Err(HannaError::config("At least one model group must be requested"));
        }

        // Re-check in case the struct was built by hand
        UpdateInterval::from_minutes(self.polling.update_interval.minutes())?;

        self.cloud.auth_url()?;
        self.cloud.graphql_url()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_interval_bounds() {
        assert!(UpdateInterval::from_minutes(0).is_err());
        assert!(UpdateInterval::from_minutes(61).is_err());
        assert_eq!(UpdateInterval::from_minutes(1).unwrap().minutes(), 1);
        assert_eq!(
            UpdateInterval::from_minutes(60).unwrap().as_duration(),
            Duration::from_secs(3600)
        );
        assert_eq!(UpdateInterval::default().minutes(), 5);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(
            config.cloud.auth_url().unwrap().as_str(),
            "https://hannacloud.com/api/auth"
        );
        assert_eq!(
            config.cloud.graphql_url().unwrap().as_str(),
            "https://hannacloud.com/api/graphql"
        );
        assert_eq!(config.cloud.origin(), "https://hannacloud.com");
    }

    #[test]
    fn test_base_url_without_trailing_slash() {
        let mut config = ServerConfig::default();
        config.cloud.base_url = Url::parse("http://127.0.0.1:8080/api").unwrap();
        assert_eq!(
            config.cloud.graphql_url().unwrap().as_str(),
            "http://127.0.0.1:8080/api/graphql"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.cloud.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.cloud.timeout = Duration::from_secs(120);
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.cloud.base_url = Url::parse("ftp://hannacloud.com/").unwrap();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.cloud.model_groups.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_interval_validation() {
        let parsed: std::result::Result<ServerConfig, _> = toml::from_str(
            r#"
            [polling]
            update_interval = 90
            "#,
        );
        assert!(parsed.is_err());

        let parsed: ServerConfig = toml::from_str(
            r#"
            [cloud]
            timeout = "20s"
            model_groups = ["BL12x", "HALO"]

            [polling]
            update_interval = 10
            refresh_margin = "2m"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.cloud.timeout, Duration::from_secs(20));
        assert_eq!(parsed.cloud.model_groups, vec![ModelGroup::Bl12x, ModelGroup::Halo]);
        assert_eq!(parsed.polling.update_interval.minutes(), 10);
        assert_eq!(parsed.polling.refresh_margin, Duration::from_secs(120));
    }
}
