//! Setup validation performed before an account is added to the host

use crate::auth::manager::AuthClient;
use crate::client::{create_client, TokenEndpoint};
use crate::config::credentials::Credentials;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::logging::mask_email;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Result of a successful setup validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupInfo {
    /// Entry title shown by the host
    pub title: String,
    pub email: String,
}

/// Log in once with `credentials` against the configured cloud
///
/// Invalid credentials surface as an auth error, connectivity problems as
/// a network error.
pub async fn validate_setup(config: &ServerConfig, credentials: &Credentials) -> Result<SetupInfo> {
    config.validate()?;
    let client = create_client(&config.cloud)?;
    validate_with(client, credentials).await
}

/// Setup validation against any token endpoint
pub async fn validate_with(endpoint: Arc<dyn TokenEndpoint>, credentials: &Credentials) -> Result<SetupInfo> {
    let auth = AuthClient::new(endpoint, credentials.clone());
    auth.authenticate(credentials).await?;

    info!("Credentials for {} validated", mask_email(&credentials.email));
    Ok(SetupInfo {
        title: format!("Hanna Cloud ({})", credentials.email),
        email: credentials.email.clone(),
    })
}
