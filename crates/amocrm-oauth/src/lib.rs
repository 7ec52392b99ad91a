//! OAuth 2.0 token handling for the amoCRM API.
//!
//! # Components
//!
//! - [`token`]: the immutable [`Token`] credential set
//! - [`oauth`]: [`Authenticator`] for authorization-code and refresh-token exchanges,
//!   consent URL and CSRF state helpers
//! - [`storage`]: the [`TokenStorage`] persistence boundary with JSON-file and
//!   in-memory implementations

pub mod error;
pub mod oauth;
pub mod storage;
pub mod token;

pub use error::{AuthError, Result, StorageError};
pub use oauth::{AUTHORIZE_URL, Authenticator, Credentials, build_authorization_url, generate_state};
pub use storage::{InMemoryTokenStorage, JsonFileTokenStorage, SharedTokenStorage, TokenStorage};
pub use token::Token;
