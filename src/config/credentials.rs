//! Account credentials for the Hanna Cloud login
//!
//! Persisting credentials is the host platform's job; this crate only
//! receives them at setup time or reads them from the environment.

use crate::error::{HannaError, Result};
use crate::logging::mask_email;
use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable holding the account email
pub const EMAIL_ENV: &str = "HANNA_EMAIL";
/// Environment variable holding the account password
pub const PASSWORD_ENV: &str = "HANNA_PASSWORD";

/// Hanna Cloud account credentials
///
/// Deserialized values go through the same validation as [`Credentials::new`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedCredentials")]
pub struct Credentials {
    /// Account email
    pub email: String,

    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials, rejecting blank values
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let email = email.into().trim().to_string();
        let password = password.into();

        if email.is_empty() {
            return Err(HannaError::credentials("Email cannot be empty"));
        }
        if password.is_empty() {
            return Err(HannaError::credentials("Password cannot be empty"));
        }

        Ok(Self { email, password })
    }

    /// Read credentials from `HANNA_EMAIL` / `HANNA_PASSWORD`
    pub fn from_env() -> Result<Self> {
        let email = env::var(EMAIL_ENV)
            .map_err(|_| HannaError::credentials(format!("{EMAIL_ENV} is not set")))?;
        let password = env::var(PASSWORD_ENV)
            .map_err(|_| HannaError::credentials(format!("{PASSWORD_ENV} is not set")))?;
        Self::new(email, password)
    }
}

#[derive(Deserialize)]
struct UncheckedCredentials {
    email: String,
    password: String,
}

impl TryFrom<UncheckedCredentials> for Credentials {
    type Error = HannaError;

    fn try_from(raw: UncheckedCredentials) -> Result<Self> {
        Self::new(raw.email, raw.password)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &mask_email(&self.email))
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_and_validates() {
        let creds = Credentials::new("  pool@example.com ", "secret").unwrap();
        assert_eq!(creds.email, "pool@example.com");

        assert!(Credentials::new("", "secret").is_err());
        assert!(Credentials::new("pool@example.com", "").is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("pool@example.com", "hunter2").unwrap();
        let printed = format!("{creds:?}");
        assert!(printed.contains("p***@example.com"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_deserialize_validates() {
        let creds: Credentials =
            serde_json::from_str(r#"{"email": " pool@example.com ", "password": "secret"}"#).unwrap();
        assert_eq!(creds.email, "pool@example.com");

        let blank_email =
            serde_json::from_str::<Credentials>(r#"{"email": "  ", "password": "secret"}"#);
        assert!(blank_email.unwrap_err().to_string().contains("Email cannot be empty"));

        let blank_password =
            serde_json::from_str::<Credentials>(r#"{"email": "pool@example.com", "password": ""}"#);
        assert!(blank_password.is_err());
    }
}
