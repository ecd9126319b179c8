//! Test fixtures for consistent test setup

use chrono::{Duration, Utc};
use hanna_cloud_rust::{Credentials, TokenPair};
use rstest::*;

pub const TEST_EMAIL: &str = "pool-owner@example.com";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

#[fixture]
pub fn credentials() -> Credentials {
    Credentials::new(TEST_EMAIL, TEST_PASSWORD).expect("valid test credentials")
}

/// A pair that is well outside any refresh margin
pub fn fresh_token(access: &str) -> TokenPair {
    TokenPair::new(access, Some(format!("{access}-refresh")), Utc::now() + Duration::hours(1))
}

/// A pair that expires within the default refresh margin
pub fn expiring_token(access: &str) -> TokenPair {
    TokenPair::new(access, Some(format!("{access}-refresh")), Utc::now() + Duration::seconds(20))
}

/// Environment variables that the config loader reads
pub fn config_env_vars() -> Vec<(&'static str, Option<&'static str>)> {
    vec![
        ("HANNA_BASE_URL", None),
        ("HANNA_TIMEOUT", None),
        ("HANNA_UPDATE_INTERVAL", None),
        ("HANNA_LANGUAGE", None),
        ("RUST_LOG", None),
    ]
}
