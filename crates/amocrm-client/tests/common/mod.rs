//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use amocrm_client::{AmoCrmClient, SharedTokenStorage, Token};
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/oauth2/access_token";

/// Route test logs through the test harness. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A mock account serving both the identity endpoint and the resource API.
pub struct TestCrm {
    pub server: MockServer,
}

impl TestCrm {
    pub async fn start() -> Self {
        init_tracing();
        Self {
            server: MockServer::start().await,
        }
    }

    /// Client bound to the mock server holding `token`.
    pub fn client(&self, token: Token) -> AmoCrmClient {
        self.builder().token(token).build().unwrap()
    }

    /// Client bound to the mock server persisting through `storage`.
    pub fn client_with_storage(&self, token: Option<Token>, storage: SharedTokenStorage) -> AmoCrmClient {
        let mut builder = self.builder().token_storage(storage);
        if let Some(token) = token {
            builder = builder.token(token);
        }
        builder.build().unwrap()
    }

    pub fn builder(&self) -> amocrm_client::ClientBuilder {
        AmoCrmClient::builder()
            .credentials("cid", "secret", "https://example.com/cb")
            .base_url(self.server.uri())
            .timeout(Duration::from_secs(5))
    }

    /// Answer one refresh of `refresh_token` with `access-2`/`refresh-2`.
    pub async fn expect_refresh(&self, refresh_token: &str, times: u64) {
        self.expect_refresh_delayed(refresh_token, times, Duration::ZERO)
            .await;
    }

    pub async fn expect_refresh_delayed(&self, refresh_token: &str, times: u64, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_partial_json(json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_response("access-2", "refresh-2"))
                    .set_delay(delay),
            )
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Fail that no refresh happens at all.
    pub async fn forbid_refresh(&self) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }
}

pub fn token_response(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "token_type": "Bearer",
        "expires_in": 86400,
        "access_token": access,
        "refresh_token": refresh,
    })
}

/// Valid for another hour.
pub fn fresh_token() -> Token {
    Token::new(
        "access-1",
        "refresh-1",
        "Bearer",
        Utc::now() + chrono::Duration::hours(1),
    )
}

/// Expired a minute ago.
pub fn expired_token() -> Token {
    Token::new(
        "access-1",
        "refresh-1",
        "Bearer",
        Utc::now() - chrono::Duration::minutes(1),
    )
}

pub fn shared<T: amocrm_client::TokenStorage + 'static>(storage: T) -> (Arc<T>, SharedTokenStorage) {
    let storage = Arc::new(storage);
    let shared: SharedTokenStorage = storage.clone();
    (storage, shared)
}
