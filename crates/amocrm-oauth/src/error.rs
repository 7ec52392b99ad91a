//! Error types for token acquisition and persistence.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors returned by the identity endpoint exchanges.
///
/// Cloneable so that one failed refresh can be reported to every caller
/// that was waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The authorization code or refresh token is expired, revoked or
    /// already consumed. A fresh authorization-code flow is required.
    #[error("authorization grant rejected ({status}): {}", String::from_utf8_lossy(.body))]
    InvalidGrant {
        /// HTTP status returned by the identity endpoint.
        status: u16,
        /// Response body, byte for byte.
        body: Bytes,
    },

    /// The identity endpoint answered with a non-2xx status for any other reason.
    #[error("identity endpoint rejected the request ({status}): {}", String::from_utf8_lossy(.body))]
    ServiceRejected {
        /// HTTP status returned by the identity endpoint.
        status: u16,
        /// Response body, byte for byte.
        body: Bytes,
    },

    /// The identity endpoint could not be reached or the exchange timed out.
    #[error("identity endpoint unreachable: {0}")]
    Transport(#[source] Arc<reqwest::Error>),

    /// The identity endpoint answered 2xx with a body that is not a usable
    /// token response: not JSON, missing fields, or a lifetime that cannot be
    /// represented.
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// The exchange stopped without producing a result.
    #[error("token exchange aborted: {0}")]
    Aborted(String),
}

impl AuthError {
    /// The identity endpoint's response body, when it returned one.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            AuthError::InvalidGrant { body, .. } | AuthError::ServiceRejected { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }

    /// True when only a new authorization-code flow can recover.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, AuthError::InvalidGrant { .. })
    }

    /// True when the same exchange may succeed if attempted again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::Transport(_) => true,
            AuthError::ServiceRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Transport(Arc::new(e))
    }
}

/// Errors raised by a [`TokenStorage`](crate::TokenStorage) backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The stored bytes exist but do not decode into a token.
    #[error("corrupt token store '{}': {source}", path.display())]
    CorruptTokenStore {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Reading or writing the backing store failed.
    #[error("token store I/O failed for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The token could not be serialized.
    #[error("failed to serialize token: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_grant_requires_reauthorization() {
        let err = AuthError::InvalidGrant {
            status: 400,
            body: Bytes::from_static(b"{}"),
        };
        assert!(err.requires_reauthorization());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_service_rejected_retryable_only_for_5xx() {
        let client_side = AuthError::ServiceRejected {
            status: 403,
            body: Bytes::new(),
        };
        let server_side = AuthError::ServiceRejected {
            status: 502,
            body: Bytes::new(),
        };
        assert!(!client_side.is_retryable());
        assert!(server_side.is_retryable());
    }

    #[test]
    fn test_rejection_keeps_body_verbatim() {
        let body = r#"{"hint":"Authorization code has been revoked","status":400}"#;
        let err = AuthError::InvalidGrant {
            status: 400,
            body: Bytes::from_static(body.as_bytes()),
        };
        assert!(err.to_string().contains(body));
        assert_eq!(err.body().map(|b| &b[..]), Some(body.as_bytes()));
    }

    #[test]
    fn test_rejection_keeps_non_utf8_body() {
        let raw = Bytes::from_static(b"\xff\xfe{\"error\"}");
        let err = AuthError::ServiceRejected {
            status: 500,
            body: raw.clone(),
        };
        assert_eq!(err.body(), Some(&raw));
    }
}
