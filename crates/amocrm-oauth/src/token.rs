//! OAuth credential set issued by the identity endpoint.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// One OAuth 2.0 credential set.
///
/// Fields are fixed at construction. A refresh produces a new `Token`;
/// nothing mutates an existing one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    access_token: String,
    refresh_token: String,
    token_type: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: token_type.into(),
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Absolute instant after which the access token is no longer accepted.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token must be renewed before use at `now`.
    ///
    /// `skew` is subtracted from the expiry so that a token about to lapse
    /// while a request is in flight counts as stale.
    /// An expiry too close to the representable minimum counts as stale.
    pub fn is_stale_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at
            .checked_sub_signed(skew)
            .is_none_or(|deadline| now >= deadline)
    }

    /// Shorthand for [`Token::is_stale_at`] with the current time.
    pub fn is_stale(&self, skew: Duration) -> bool {
        self.is_stale_at(Utc::now(), skew)
    }

    /// Remaining lifetime at `now`, clamped at zero.
    pub fn expires_in_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token_type: String,
    /// Lifetime in seconds, relative to receipt.
    pub expires_in: i64,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Anchor the relative lifetime at `received_at`.
    ///
    /// Providers that do not rotate the refresh token omit it on refresh;
    /// `previous_refresh` carries the old one forward in that case.
    pub fn into_token(
        self,
        received_at: DateTime<Utc>,
        previous_refresh: Option<&str>,
    ) -> Result<Token, AuthError> {
        let expires_at = Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| received_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::MalformedResponse(format!(
                    "expires_in {} is out of range",
                    self.expires_in
                ))
            })?;

        let refresh_token = match self.refresh_token {
            Some(rt) if !rt.is_empty() => rt,
            _ => previous_refresh.unwrap_or_default().to_string(),
        };

        Ok(Token {
            access_token: self.access_token,
            refresh_token,
            token_type: self.token_type,
            expires_at,
        })
    }
}
