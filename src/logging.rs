//! Logging configuration with optional file rotation
//!
//! Sets up a `tracing` subscriber writing to stderr and/or a daily rolling
//! log file, and provides redaction for payloads that are logged at debug
//! level (login bodies, GraphQL responses).

use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer, Registry};

const MAX_LOGGED_BODY: usize = 1000;

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level
    pub level: Level,

    /// Log to file
    pub file_path: Option<PathBuf>,

    /// Log to stderr
    pub stderr: bool,

    /// Include timestamps
    pub timestamps: bool,

    /// Include thread IDs
    pub thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_path: None,
            stderr: true,
            timestamps: true,
            thread_ids: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            if let Some(level) = parse_level(&rust_log) {
                config.level = level;
            }
        }

        if let Ok(log_file) = std::env::var("HANNA_LOG_FILE") {
            config.file_path = Some(PathBuf::from(log_file));
        }

        if let Ok(log_stderr) = std::env::var("HANNA_LOG_STDERR") {
            config.stderr = log_stderr.to_lowercase() != "false";
        }

        if let Ok(timestamps) = std::env::var("HANNA_LOG_TIMESTAMPS") {
            config.timestamps = timestamps.to_lowercase() != "false";
        }

        config
    }

    /// Apply the level from the `[logging]` section of the server config
    pub fn with_level_name(mut self, level: &str) -> Self {
        if let Some(level) = parse_level(level) {
            self.level = level;
        }
        self
    }
}

fn parse_level(value: &str) -> Option<Level> {
    let value = value.to_lowercase();
    if value.contains("trace") {
        Some(Level::TRACE)
    } else if value.contains("debug") {
        Some(Level::DEBUG)
    } else if value.contains("info") {
        Some(Level::INFO)
    } else if value.contains("warn") {
        Some(Level::WARN)
    } else if value.contains("error") {
        Some(Level::ERROR)
    } else {
        None
    }
}

/// Initialize logging with the given configuration
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.stderr {
        layers.push(fmt_layer(std::io::stderr, true, &config));
    }

    if let Some(file_path) = &config.file_path {
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_appender = tracing_appender::rolling::daily(
            file_path
                .parent()
                .unwrap_or_else(|| std::path::Path::new(".")),
            file_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("hanna-cloud.log")),
        );
        layers.push(fmt_layer(file_appender, false, &config));
    }

    let subscriber = tracing_subscriber::registry().with(env_filter).with(layers);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn fmt_layer<W>(writer: W, ansi: bool, config: &LogConfig) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(config.thread_ids);

    if config.timestamps {
        layer.boxed()
    } else {
        layer.without_time().boxed()
    }
}

/// Mask sensitive values in a JSON document before it is logged
pub fn redact(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                if is_sensitive_field(key) {
                    sanitized.insert(key.clone(), serde_json::Value::String("***".to_string()));
                } else {
                    sanitized.insert(key.clone(), redact(value));
                }
            }
            serde_json::Value::Object(sanitized)
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(redact).collect()),
        _ => value.clone(),
    }
}

/// Redact a raw response body and cap its length for debug logs
pub fn loggable_body(body: &str) -> String {
    let text = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => redact(&json).to_string(),
        Err(_) => body.to_string(),
    };

    if text.len() > MAX_LOGGED_BODY {
        let mut end = MAX_LOGGED_BODY;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} bytes total)", &text[..end], text.len())
    } else {
        text
    }
}

/// Account email as it may appear in logs: first character and domain only
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        _ => "***".to_string(),
    }
}

fn is_sensitive_field(field: &str) -> bool {
    let field_lower = field.to_lowercase();
    field_lower.contains("password")
        || field_lower.contains("secret")
        || field_lower.contains("token")
        || field_lower.contains("email")
        || field_lower.contains("authorization")
        || field_lower.contains("credential")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_sensitive_fields() {
        let payload = serde_json::json!({
            "operationName": "Login",
            "variables": {
                "email": "abc:123",
                "password": "def:456",
                "userLanguage": "English"
            },
            "data": { "login": [{ "token": "jwt", "tokenType": "Bearer" }] }
        });

        let sanitized = redact(&payload);

        assert_eq!(sanitized["operationName"], "Login");
        assert_eq!(sanitized["variables"]["email"], "***");
        assert_eq!(sanitized["variables"]["password"], "***");
        assert_eq!(sanitized["variables"]["userLanguage"], "English");
        assert_eq!(sanitized["data"]["login"][0]["token"], "***");
        assert_eq!(sanitized["data"]["login"][0]["tokenType"], "***");
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("pool.owner@example.com"), "p***@example.com");
        assert_eq!(mask_email("@example.com"), "***");
        assert_eq!(mask_email("not-an-email"), "***");
        assert!(!mask_email("pool.owner@example.com").contains("pool.owner"));
    }

    #[test]
    fn test_loggable_body_truncates() {
        let body = "x".repeat(5000);
        let logged = loggable_body(&body);
        assert!(logged.starts_with(&"x".repeat(MAX_LOGGED_BODY)));
        assert!(logged.contains("5000 bytes total"));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_reads_timestamps() {
        temp_env::with_vars(
            [
                ("RUST_LOG", Some("debug")),
                ("HANNA_LOG_FILE", None),
                ("HANNA_LOG_STDERR", Some("false")),
                ("HANNA_LOG_TIMESTAMPS", Some("false")),
            ],
            || {
                let config = LogConfig::from_env();
                assert_eq!(config.level, Level::DEBUG);
                assert!(!config.stderr);
                assert!(!config.timestamps);
            },
        );

        temp_env::with_vars([("HANNA_LOG_TIMESTAMPS", None::<&str>)], || {
            assert!(LogConfig::from_env().timestamps);
        });
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("hanna_cloud_rust=debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("WARN"), Some(Level::WARN));
        assert_eq!(parse_level("verbose"), None);
    }
}
