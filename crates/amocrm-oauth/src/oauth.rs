//! Authorization-code and refresh-token exchanges against the amoCRM identity endpoint.

use std::fmt;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, Result};
use crate::token::{Token, TokenResponse};

/// Consent page the resource owner is sent to.
pub const AUTHORIZE_URL: &str = "https://www.amocrm.ru/oauth";

/// Token endpoint path, relative to the account base URL.
const TOKEN_PATH: &str = "oauth2/access_token";

/// Integration credentials registered with the CRM.
///
/// Only ever sent to the identity endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

/// Build the consent URL for the authorization-code flow.
pub fn build_authorization_url(credentials: &Credentials, state: &str) -> String {
    let params = [
        ("client_id", credentials.client_id.as_str()),
        ("state", state),
        ("mode", "post_message"),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", AUTHORIZE_URL, query)
}

#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum Grant<'a> {
    AuthorizationCode { code: &'a str },
    RefreshToken { refresh_token: &'a str },
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    #[serde(flatten)]
    grant: Grant<'a>,
}

/// Error body shape shared by OAuth2 providers and amoCRM's problem+json.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Whether a rejected exchange means the grant itself is dead.
fn is_invalid_grant(status: u16, body: &[u8]) -> bool {
    if !matches!(status, 400 | 401) {
        return false;
    }
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    if parsed.error.as_deref() == Some("invalid_grant") {
        return true;
    }
    parsed.hint.is_some_and(|hint| {
        let hint = hint.to_ascii_lowercase();
        hint.contains("expired") || hint.contains("revoked")
    })
}

/// Performs token exchanges for one account domain.
#[derive(Debug, Clone)]
pub struct Authenticator {
    http: reqwest::Client,
    credentials: Arc<Credentials>,
    token_url: Url,
}

impl Authenticator {
    /// Create an authenticator for the account rooted at `base_url`.
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<Credentials>,
        base_url: &Url,
    ) -> std::result::Result<Self, url::ParseError> {
        Ok(Self {
            http,
            credentials,
            token_url: base_url.join(TOKEN_PATH)?,
        })
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Exchange a one-time authorization code for the initial token.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<Token> {
        tracing::info!(token_url = %self.token_url, "Exchanging authorization code");
        self.request_token(Grant::AuthorizationCode { code }, None)
            .await
    }

    /// Exchange the refresh token of `current` for a new token.
    ///
    /// Sending the same refresh token again after a transport failure is safe;
    /// callers must still avoid overlapping refreshes for one session.
    pub async fn refresh(&self, current: &Token) -> Result<Token> {
        tracing::info!(token_url = %self.token_url, "Refreshing access token");
        self.request_token(
            Grant::RefreshToken {
                refresh_token: current.refresh_token(),
            },
            Some(current.refresh_token()),
        )
        .await
    }

    async fn request_token(&self, grant: Grant<'_>, previous_refresh: Option<&str>) -> Result<Token> {
        let request_body = TokenRequest {
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            redirect_uri: &self.credentials.redirect_url,
            grant,
        };

        let response = self
            .http
            .post(self.token_url.clone())
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        let received_at = Utc::now();

        if !status.is_success() {
            let status = status.as_u16();
            tracing::warn!(status, "Token exchange rejected");
            return Err(if is_invalid_grant(status, &body) {
                AuthError::InvalidGrant { status, body }
            } else {
                AuthError::ServiceRejected { status, body }
            });
        }

        let parsed: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
        let token = parsed.into_token(received_at, previous_refresh)?;

        tracing::info!(expires_at = %token.expires_at(), "Token exchange succeeded");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("client-1", "s3cret", "https://example.com/callback")
    }

    #[test]
    fn test_state_generation() {
        let state1 = generate_state();
        let state2 = generate_state();
        assert!(!state1.is_empty());
        assert_ne!(state1, state2);
    }

    #[test]
    fn test_authorization_url() {
        let url = build_authorization_url(&credentials(), "st ate");

        assert!(url.starts_with("https://www.amocrm.ru/oauth?"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("state=st%20ate"));
        assert!(url.contains("mode=post_message"));
        assert!(!url.contains("s3cret"));
    }

    #[test]
    fn test_token_url_joins_base() {
        let base = Url::parse("https://acme.amocrm.ru/").unwrap();
        let auth =
            Authenticator::new(reqwest::Client::new(), Arc::new(credentials()), &base).unwrap();
        assert_eq!(
            auth.token_url().as_str(),
            "https://acme.amocrm.ru/oauth2/access_token"
        );
    }

    #[test]
    fn test_refresh_request_shape() {
        let creds = credentials();
        let body = TokenRequest {
            client_id: &creds.client_id,
            client_secret: &creds.client_secret,
            redirect_uri: &creds.redirect_url,
            grant: Grant::RefreshToken {
                refresh_token: "rt",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["grant_type"], "refresh_token");
        assert_eq!(json["refresh_token"], "rt");
        assert_eq!(json["redirect_uri"], "https://example.com/callback");
        assert!(json.get("code").is_none());
    }

    #[test]
    fn test_code_request_shape() {
        let creds = credentials();
        let body = TokenRequest {
            client_id: &creds.client_id,
            client_secret: &creds.client_secret,
            redirect_uri: &creds.redirect_url,
            grant: Grant::AuthorizationCode { code: "abc" },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["grant_type"], "authorization_code");
        assert_eq!(json["code"], "abc");
    }

    #[test]
    fn test_invalid_grant_detection() {
        assert!(is_invalid_grant(400, r#"{"error":"invalid_grant"}"#.as_bytes()));
        assert!(is_invalid_grant(
            400,
            r#"{"hint":"Authorization code has expired","status":400}"#.as_bytes()
        ));
        assert!(is_invalid_grant(401, r#"{"hint":"Token has been revoked"}"#.as_bytes()));
        assert!(!is_invalid_grant(400, r#"{"hint":"Missing client_id"}"#.as_bytes()));
        assert!(!is_invalid_grant(500, r#"{"error":"invalid_grant"}"#.as_bytes()));
        assert!(!is_invalid_grant(400, "not json".as_bytes()));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("client-1"));
    }
}
