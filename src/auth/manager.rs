//! Token lifecycle: initial login, refresh near expiry, re-authentication

use crate::auth::storage::CredentialStore;
use crate::auth::token::TokenPair;
use crate::client::TokenEndpoint;
use crate::config::credentials::Credentials;
use crate::error::{HannaError, Result};
use crate::logging::mask_email;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default margin before expiry at which a token is refreshed
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Auth client owning the credential store
pub struct AuthClient {
    endpoint: Arc<dyn TokenEndpoint>,
    store: CredentialStore,
    refresh_margin: Duration,
}

impl AuthClient {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>, credentials: Credentials) -> Self {
        Self {
            endpoint,
            store: CredentialStore::new(credentials),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    /// Log in with `credentials`
    ///
    /// The returned pair always expires strictly in the future.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<TokenPair> {
        debug!("Authenticating as {}", mask_email(&credentials.email));
        let pair = self.endpoint.login(credentials).await?;
        if pair.is_expired_at(Utc::now()) {
            return Err(HannaError::authentication(
                "Login returned an already expired token",
            ));
        }
        Ok(pair)
    }

    /// Return `pair` unchanged unless it is within the refresh margin
    ///
    /// Near expiry the pair is refreshed; a failed refresh falls back to a
    /// full login with `credentials` before the error is surfaced.
    pub async fn ensure_valid(&self, pair: &TokenPair, credentials: &Credentials) -> Result<TokenPair> {
        if !pair.expires_within(self.refresh_margin, Utc::now()) {
            return Ok(pair.clone());
        }

        debug!("Token expires at {}, refreshing", pair.expires_at());
        match self.endpoint.refresh(pair).await {
            Ok(fresh) if !fresh.expires_within(self.refresh_margin, Utc::now()) => {
                info!("Token refreshed, valid until {}", fresh.expires_at());
                return Ok(fresh);
            }
            Ok(fresh) => {
                warn!(
                    "Refreshed token expires too soon ({}), re-authenticating",
                    fresh.expires_at()
                );
            }
            Err(e) => {
                warn!("Token refresh failed, re-authenticating: {}", e);
            }
        }

        self.authenticate(credentials).await
    }

    /// Valid token for the stored credentials, logging in on first use
    pub async fn valid_token(&mut self) -> Result<TokenPair> {
        let pair = match self.store.token() {
            Some(current) => self.ensure_valid(current, self.store.credentials()).await?,
            None => self.authenticate(self.store.credentials()).await?,
        };
        if self.store.token() != Some(&pair) {
            self.store.set_token(pair.clone());
        }
        Ok(pair)
    }

    /// Drop the current pair and log in again
    pub async fn force_reauthenticate(&mut self) -> Result<TokenPair> {
        info!("Forcing re-authentication");
        self.store.clear_token();
        let pair = self.authenticate(self.store.credentials()).await?;
        self.store.set_token(pair.clone());
        Ok(pair)
    }

    /// Forget the current pair; the next call logs in again
    pub fn clear(&mut self) {
        self.store.clear_token();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTokenEndpoint;
    use chrono::Duration as ChronoDuration;

    fn credentials() -> Credentials {
        Credentials::new("pool@example.com", "secret").unwrap()
    }

    fn pair(access: &str, valid_for: ChronoDuration) -> TokenPair {
        TokenPair::new(access, Some(format!("{access}-refresh")), Utc::now() + valid_for)
    }

    #[tokio::test]
    async fn test_valid_pair_is_returned_unchanged() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_refresh().never();
        endpoint.expect_login().never();

        let client = AuthClient::new(Arc::new(endpoint), credentials());
        let current = pair("a", ChronoDuration::hours(1));
        let result = client.ensure_valid(&current, &credentials()).await.unwrap();
        assert_eq!(result, current);
    }

    #[tokio::test]
    async fn test_near_expiry_triggers_refresh() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_refresh()
            .times(1)
            .returning(|_| Ok(pair("b", ChronoDuration::hours(1))));
        endpoint.expect_login().never();

        let client = AuthClient::new(Arc::new(endpoint), credentials());
        let current = pair("a", ChronoDuration::seconds(30));
        let result = client.ensure_valid(&current, &credentials()).await.unwrap();
        assert_eq!(result.access_token(), "b");
        assert!(result.expires_at() > current.expires_at());
    }

    #[tokio::test]
    async fn test_refresh_failure_falls_back_to_login() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_refresh()
            .times(1)
            .returning(|_| Err(HannaError::authentication("refresh token revoked")));
        endpoint
            .expect_login()
            .times(1)
            .returning(|_| Ok(pair("c", ChronoDuration::hours(1))));

        let client = AuthClient::new(Arc::new(endpoint), credentials());
        let expired = pair("a", ChronoDuration::seconds(-10));
        let result = client.ensure_valid(&expired, &credentials()).await.unwrap();
        assert_eq!(result.access_token(), "c");
    }

    #[tokio::test]
    async fn test_fallback_failure_is_surfaced() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_refresh()
            .returning(|_| Err(HannaError::network("connection reset")));
        endpoint
            .expect_login()
            .returning(|_| Err(HannaError::authentication("invalid credentials")));

        let client = AuthClient::new(Arc::new(endpoint), credentials());
        let expired = pair("a", ChronoDuration::seconds(-10));
        let err = client.ensure_valid(&expired, &credentials()).await.unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_expired_grant() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_login()
            .returning(|_| Ok(pair("a", ChronoDuration::seconds(-1))));

        let client = AuthClient::new(Arc::new(endpoint), credentials());
        assert!(client.authenticate(&credentials()).await.unwrap_err().is_auth_error());
    }

    #[tokio::test]
    async fn test_valid_token_logs_in_once_and_caches() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_login()
            .times(1)
            .returning(|_| Ok(pair("a", ChronoDuration::hours(1))));

        let mut client = AuthClient::new(Arc::new(endpoint), credentials());
        let first = client.valid_token().await.unwrap();
        let second = client.valid_token().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.store().token(), Some(&first));
    }

    #[tokio::test]
    async fn test_force_reauthenticate_replaces_token() {
        let mut endpoint = MockTokenEndpoint::new();
        let mut issued = 0;
        endpoint.expect_login().times(2).returning(move |_| {
            issued += 1;
            Ok(pair(&format!("t{issued}"), ChronoDuration::hours(1)))
        });

        let mut client = AuthClient::new(Arc::new(endpoint), credentials());
        assert_eq!(client.valid_token().await.unwrap().access_token(), "t1");
        assert_eq!(client.force_reauthenticate().await.unwrap().access_token(), "t2");
        assert_eq!(client.store().token().unwrap().access_token(), "t2");

        client.clear();
        assert!(client.store().token().is_none());
    }
}
