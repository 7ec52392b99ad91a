//! Client error types.

use bytes::Bytes;
use thiserror::Error;

pub use amocrm_oauth::{AuthError, StorageError};

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials or other required settings are missing.
    #[error("client not configured: {0}")]
    NotConfigured(String),

    /// The resource API request failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Token acquisition or renewal failed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The service answered in a shape the caller did not expect.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// Loading or saving the token failed.
    #[error("token storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid configuration value.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures of a single resource API dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Domain or token missing; raised before any network I/O.
    #[error("dispatch not configured: {0}")]
    NotConfigured(&'static str),

    /// The service kept rejecting the credentials after one refresh-and-retry.
    #[error("unauthorized: {}", String::from_utf8_lossy(.body))]
    Unauthorized {
        /// Body of the final 401 response, byte for byte.
        body: Bytes,
    },

    /// 4xx other than 401.
    #[error("request rejected ({status}): {}", String::from_utf8_lossy(.body))]
    RequestRejected {
        /// HTTP status code.
        status: u16,
        /// Service error body, byte for byte.
        body: Bytes,
    },

    /// 5xx.
    #[error("service unavailable ({status})")]
    ServiceUnavailable {
        /// HTTP status code.
        status: u16,
        /// Service error body, byte for byte.
        body: Bytes,
    },

    /// DNS, connect, reset or timeout.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

/// The service answered, but not in the expected shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body is not valid JSON for the target type.
    #[error("malformed response body: {0}")]
    Malformed(#[source] serde_json::Error),

    /// An envelope key the caller relies on is absent.
    #[error("response is missing '{0}'")]
    MissingKey(String),

    /// Successful status with no body where a payload was expected.
    #[error("empty response body (status {status})")]
    EmptyBody {
        /// HTTP status code.
        status: u16,
    },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A value is present but unusable.
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// What a caller can do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fix the client configuration before retrying.
    Configuration,
    /// Run the authorization-code flow again.
    Reauthenticate,
    /// Transient; the same call may succeed later.
    Transient,
    /// The service refused this particular request.
    Rejected,
    /// The service answered with something that could not be parsed.
    Malformed,
}

impl Error {
    /// Classify the error by the action it calls for.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotConfigured(_) | Error::Config(_) => ErrorCategory::Configuration,
            Error::Dispatch(DispatchError::NotConfigured(_)) => ErrorCategory::Configuration,
            Error::Dispatch(DispatchError::Unauthorized { .. }) => ErrorCategory::Reauthenticate,
            Error::Dispatch(DispatchError::RequestRejected { .. }) => ErrorCategory::Rejected,
            Error::Dispatch(DispatchError::ServiceUnavailable { .. })
            | Error::Dispatch(DispatchError::Transport(_)) => ErrorCategory::Transient,
            Error::Auth(AuthError::InvalidGrant { .. }) => ErrorCategory::Reauthenticate,
            Error::Auth(e) if e.is_retryable() => ErrorCategory::Transient,
            Error::Auth(AuthError::MalformedResponse(_)) => ErrorCategory::Malformed,
            Error::Auth(_) => ErrorCategory::Rejected,
            Error::Decode(_) => ErrorCategory::Malformed,
            Error::Encode(_) => ErrorCategory::Rejected,
            Error::Storage(_) => ErrorCategory::Configuration,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        self.category() == ErrorCategory::Reauthenticate
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status(), Some(429))
    }

    /// Check if the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// HTTP status of the failed response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Dispatch(DispatchError::Unauthorized { .. }) => Some(401),
            Error::Dispatch(DispatchError::RequestRejected { status, .. })
            | Error::Dispatch(DispatchError::ServiceUnavailable { status, .. }) => Some(*status),
            Error::Auth(AuthError::InvalidGrant { status, .. })
            | Error::Auth(AuthError::ServiceRejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Service error body, unaltered, when the service returned one.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            Error::Dispatch(DispatchError::Unauthorized { body })
            | Error::Dispatch(DispatchError::RequestRejected { body, .. })
            | Error::Dispatch(DispatchError::ServiceUnavailable { body, .. }) => Some(body),
            Error::Auth(e) => e.body(),
            _ => None,
        }
    }

    /// [`Error::body`] as text; invalid UTF-8 is replaced.
    pub fn body_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        self.body().map(|b| String::from_utf8_lossy(b))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
