//! Bearer token pair and expiry derivation

use crate::error::{HannaError, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Access token with its absolute expiry, plus an optional refresh token
///
/// A pair is only ever replaced as a whole; there are no setters.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// Build a pair from a login/refresh grant
    ///
    /// The server TTL wins when present, otherwise the JWT `exp` claim is
    /// used. A token carrying neither is rejected rather than guessed.
    pub fn from_grant(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
        issued_at: DateTime<Utc>,
    ) -> Result<Self> {
        let expires_at = match expires_in {
            Some(ttl) if ttl > 0 => issued_at + Duration::seconds(ttl),
            Some(ttl) => {
                return Err(HannaError::authentication(format!(
                    "Server issued a token with non-positive lifetime ({ttl}s)"
                )))
            }
            None => jwt_expiry(&access_token)?.ok_or_else(|| {
                HannaError::api("Token carries neither an expiresIn TTL nor an exp claim")
            })?,
        };

        if expires_at <= issued_at {
            return Err(HannaError::authentication(
                "Server issued an already expired token",
            ));
        }

        Ok(Self::new(access_token, refresh_token, expires_at))
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Token can no longer be presented at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Token expires within `margin` of `now` (or already has)
    pub fn expires_within(&self, margin: std::time::Duration, now: DateTime<Utc>) -> bool {
        let margin = Duration::from_std(margin).unwrap_or_else(|_| Duration::zero());
        now + margin >= self.expires_at
    }

    /// Value of the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"***")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: Option<serde_json::Value>,
}

/// Read the `exp` claim of a JWT without verifying its signature
///
/// Returns `Ok(None)` for well-formed tokens without `exp` and for opaque
/// (non-JWT) tokens.
pub fn jwt_expiry(token: &str) -> Result<Option<DateTime<Utc>>> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Ok(None);
    };

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| HannaError::api(format!("Malformed JWT payload encoding: {e}")))?;
    let claims: JwtClaims = serde_json::from_slice(&bytes)
        .map_err(|e| HannaError::api(format!("Malformed JWT claims: {e}")))?;

    let exp = match claims.exp {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.parse::<f64>().ok(),
        Some(_) => None,
    }
    .ok_or_else(|| HannaError::api("JWT exp claim is not a number"))?;

    DateTime::from_timestamp(exp as i64, 0)
        .map(Some)
        .ok_or_else(|| HannaError::api(format!("JWT exp claim out of range: {exp}")))
}
