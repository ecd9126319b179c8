//! Authentication for the Hanna Cloud account
//!
//! [`AuthClient`] exchanges credentials for a [`TokenPair`], refreshes it
//! before expiry and falls back to a full login when refresh fails. The
//! pair lives in a [`CredentialStore`] that only the auth client writes.

pub mod manager;
pub mod storage;
pub mod token;

pub use manager::{AuthClient, DEFAULT_REFRESH_MARGIN};
pub use storage::CredentialStore;
pub use token::TokenPair;
