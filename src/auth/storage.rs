//! In-memory credential store
//!
//! Holds the account credentials and the current token pair. Only the
//! [`AuthClient`](super::manager::AuthClient) writes to it.

use crate::auth::token::TokenPair;
use crate::config::credentials::Credentials;

/// Credentials plus the token pair currently in use
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials: Credentials,
    token: Option<TokenPair>,
}

impl CredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            token: None,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn token(&self) -> Option<&TokenPair> {
        self.token.as_ref()
    }

    /// Replace the stored pair as a whole
    pub(crate) fn set_token(&mut self, token: TokenPair) {
        self.token = Some(token);
    }

    pub(crate) fn clear_token(&mut self) {
        self.token = None;
    }
}
