//! Token exchanges against a mock identity endpoint.

use std::sync::Arc;

use amocrm_oauth::{AuthError, Authenticator, Credentials, Token};
use chrono::{Duration, Utc};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn authenticator(server: &MockServer) -> Authenticator {
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let credentials = Credentials::new("cid", "secret", "https://example.com/cb");
    Authenticator::new(reqwest::Client::new(), Arc::new(credentials), &base).unwrap()
}

#[tokio::test]
async fn test_exchange_authorization_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .and(body_partial_json(json!({
            "grant_type": "authorization_code",
            "code": "the-code",
            "client_id": "cid",
            "client_secret": "secret",
            "redirect_uri": "https://example.com/cb",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 86400,
            "access_token": "access-1",
            "refresh_token": "refresh-1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let before = Utc::now();
    let token = authenticator(&server)
        .exchange_authorization_code("the-code")
        .await
        .unwrap();

    assert_eq!(token.access_token(), "access-1");
    assert_eq!(token.refresh_token(), "refresh-1");
    assert_eq!(token.token_type(), "Bearer");
    assert!(token.expires_at() >= before + Duration::seconds(86400));
    assert!(token.expires_at() <= Utc::now() + Duration::seconds(86400));
}

#[tokio::test]
async fn test_refresh_sends_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .and(body_partial_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": "old-refresh",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "access-2",
            "refresh_token": "refresh-2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let current = Token::new("access-1", "old-refresh", "Bearer", Utc::now());
    let renewed = authenticator(&server).refresh(&current).await.unwrap();

    assert_eq!(renewed.access_token(), "access-2");
    assert_eq!(renewed.refresh_token(), "refresh-2");
    assert_ne!(renewed, current);
}

#[tokio::test]
async fn test_expired_code_is_invalid_grant() {
    let server = MockServer::start().await;
    let body = r#"{"hint":"Authorization code has expired","title":"Bad request","status":400}"#;
    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(body))
        .mount(&server)
        .await;

    let err = authenticator(&server)
        .exchange_authorization_code("stale")
        .await
        .unwrap_err();

    match err {
        AuthError::InvalidGrant { status, body: got } => {
            assert_eq!(status, 400);
            assert_eq!(got, body);
        }
        other => panic!("expected InvalidGrant, got {other:?}"),
    }
}

#[tokio::test]
async fn test_other_rejection_is_service_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = authenticator(&server)
        .exchange_authorization_code("code")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::ServiceRejected { status: 503, ref body } if body == "maintenance"
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = authenticator(&server)
        .exchange_authorization_code("code")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport() {
    // Nothing listens on port 1.
    let base = Url::parse("http://127.0.0.1:1/").unwrap();
    let credentials = Credentials::new("cid", "secret", "https://example.com/cb");
    let auth = Authenticator::new(reqwest::Client::new(), Arc::new(credentials), &base).unwrap();

    let err = auth.exchange_authorization_code("code").await.unwrap_err();
    assert!(matches!(err, AuthError::Transport(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unrepresentable_lifetime_is_malformed_and_recoverable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": i64::MAX,
            "access_token": "access-2",
            "refresh_token": "refresh-2",
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "access-3",
            "refresh_token": "refresh-3",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = authenticator(&server);
    let current = Token::new("access-1", "refresh-1", "Bearer", Utc::now());

    let err = auth.refresh(&current).await.unwrap_err();
    assert!(matches!(err, AuthError::MalformedResponse(ref reason) if reason.contains("expires_in")));
    assert!(!err.is_retryable());

    let renewed = auth.refresh(&current).await.unwrap();
    assert_eq!(renewed.access_token(), "access-3");
}

#[tokio::test]
async fn test_rejection_body_kept_byte_for_byte() {
    let server = MockServer::start().await;
    let raw: &[u8] = b"\xff\xfe bad gateway";
    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(502).set_body_bytes(raw))
        .mount(&server)
        .await;

    let err = authenticator(&server)
        .exchange_authorization_code("code")
        .await
        .unwrap_err();
    assert_eq!(err.body().map(|b| &b[..]), Some(raw));
}
