use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer session held by a token store.
///
/// # Example
/// ```no_run
/// use lms_session::auth::Token;
/// use chrono::{Duration, Utc};
///
/// let token = Token {
///     access_token: "access".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     expires_at: Some(Utc::now() + Duration::minutes(15)),
///     last_refresh: Some(Utc::now()),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    /// Absent when the refresh credential is held server-side (cookie).
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl Token {
    /// Build a token from an auth endpoint response, resolving its expiry.
    pub(crate) fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let expires_at = grant
            .expires_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .or_else(|| {
                grant
                    .expires_in
                    .and_then(chrono::Duration::try_seconds)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
            })
            .or_else(|| jwt_expiry(&grant.access_token));
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at,
            last_refresh: Some(now),
        }
    }
}

/// Token payload returned by `/auth/login` and `/auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Seconds from now.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

/// Read the `exp` claim of a JWT access token without verifying it.
pub fn jwt_expiry(access_token: &str) -> Option<DateTime<Utc>> {
    let mut parts = access_token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    let raw = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&raw).ok()?;
    DateTime::<Utc>::from_timestamp(claims.exp?, 0)
}
