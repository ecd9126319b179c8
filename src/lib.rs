//! Hanna Cloud telemetry poller
//!
//! This crate logs in to the Hanna Instruments cloud, polls the GraphQL API
//! for water-quality controller telemetry and republishes it as normalized
//! devices and sensor readings for a home automation host.
//!
//! # Features
//!
//! - Token login with refresh ahead of expiry and re-authentication fallback
//! - GraphQL device and latest-reading queries
//! - Normalization of pH, temperature (Celsius) and redox (mV) readings
//! - Interval-driven poll coordinator with atomic snapshot replacement
//! - Host-facing entity descriptors and setup validation

pub mod auth;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod services;

// Re-export main types for convenience
pub use auth::{AuthClient, TokenPair};
pub use client::{DeviceEndpoint, HannaHttpClient, TokenEndpoint};
pub use config::{credentials::Credentials, ServerConfig, UpdateInterval};
pub use error::{ErrorKind, HannaError, Result};
pub use services::{PollCoordinator, Snapshot};
