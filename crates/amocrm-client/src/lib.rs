//! HTTP client SDK for the amoCRM REST API.
//!
//! This crate provides a typed client for the amoCRM v4 API (plus the v2
//! inbound-call events endpoint) with OAuth 2.0 token handling.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use amocrm_client::{AmoCrmClient, JsonFileTokenStorage, Lead, ListQuery, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = AmoCrmClient::builder()
//!     .credentials("client-id", "client-secret", "https://example.com/callback")
//!     .domain("example.amocrm.ru")
//!     .token_storage(Arc::new(JsonFileTokenStorage::new("amocrm_token.json")))
//!     .build()?;
//!
//! // Reuse a stored token, or run the authorization-code flow once
//! if !client.load_token().await? {
//!     client.exchange_authorization_code("def502...").await?;
//! }
//!
//! let created = client.leads().create(&[Lead::named("New deal")]).await?;
//! println!("Created lead {:?}", created[0].id);
//!
//! let contacts = client.contacts().search("+79185436238").await?;
//! println!("{} matching contacts", contacts.len());
//!
//! let users = client.users().list(&ListQuery::new().limit(50)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Expired tokens are renewed transparently before a request is sent, and a
//! request rejected with 401 is retried once after a refresh. Concurrent
//! requests share a single refresh.
//!
//! # API Coverage
//!
//! - **Leads**: get, list, create, update
//! - **Contacts**: list/search, get, create, update
//! - **Users**: get, list
//! - **Calls**: log calls
//! - **Events**: inbound-call notifications (v2)

pub mod api;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod fields;
pub mod request;
pub mod types;

pub use api::{CallsApi, ContactsApi, EventsApi, LeadsApi, ListQuery, UsersApi};
pub use client::{AmoCrmClient, ClientBuilder};
pub use config::ClientConfig;
pub use error::{ConfigError, DecodeError, DispatchError, Error, ErrorCategory, Result};
pub use fields::{FieldValue, FieldValues};
pub use request::{ApiRequest, ApiVersion, Dispatch, Endpoint, RawResponse};
pub use types::*;

pub use amocrm_oauth::{
    AuthError, Credentials, InMemoryTokenStorage, JsonFileTokenStorage, SharedTokenStorage,
    StorageError, Token, TokenStorage, generate_state,
};
