//! Request and raw response values exchanged with the dispatcher.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::error::{Error, Result};

/// Version segment of the resource path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    /// Legacy API, still required for inbound-call events.
    V2,
    #[default]
    V4,
}

impl ApiVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V2 => "v2",
            ApiVersion::V4 => "v4",
        }
    }
}

/// Logical resource path such as `leads` or `contacts/17`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    version: ApiVersion,
    path: String,
}

impl Endpoint {
    /// A v4 endpoint.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            version: ApiVersion::V4,
            path: path.into().trim_matches('/').to_string(),
        }
    }

    /// A v2 endpoint.
    pub fn v2(path: impl Into<String>) -> Self {
        Self {
            version: ApiVersion::V2,
            ..Self::new(path)
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Append a path segment: `leads` + `42` → `leads/42`.
    pub fn join(&self, segment: impl fmt::Display) -> Self {
        let segment = segment.to_string();
        Self {
            version: self.version,
            path: format!("{}/{}", self.path, segment.trim_matches('/')),
        }
    }

    /// Absolute URL below `base`: `<base>api/<version>/<path>`.
    pub fn url(&self, base: &Url) -> std::result::Result<Url, url::ParseError> {
        base.join(&format!("api/{}/{}", self.version.as_str(), self.path))
    }
}

impl From<&str> for Endpoint {
    fn from(path: &str) -> Self {
        Endpoint::new(path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "api/{}/{}", self.version.as_str(), self.path)
    }
}

/// Whether a method conventionally carries a request body.
pub(crate) fn carries_body(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::DELETE | Method::OPTIONS | Method::TRACE
    )
}

/// One resource API call, built per operation.
///
/// The body is serialized at construction so the request can be replayed
/// unchanged after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) endpoint: Endpoint,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
    pub(crate) timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<Endpoint>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(endpoint: impl Into<Endpoint>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<Endpoint>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn patch(endpoint: impl Into<Endpoint>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn put(endpoint: impl Into<Endpoint>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn delete(endpoint: impl Into<Endpoint>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Append one query parameter.
    pub fn query_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append query parameters in order.
    pub fn query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a header. `Authorization` is always replaced by the session token.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// Ignored for methods that do not carry a body, such as `GET`.
    pub fn json<B: serde::Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(Error::Encode)?;
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Override the client-wide deadline for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Body actually sent on the wire.
    pub(crate) fn wire_body(&self) -> Option<&Bytes> {
        self.body.as_ref().filter(|_| carries_body(&self.method))
    }

    /// Caller headers without `Authorization`, plus `Content-Type` when a
    /// body goes out.
    pub(crate) fn wire_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.remove(AUTHORIZATION);
        if self.wire_body().is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        headers
    }
}

/// Undecoded 2xx response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Body as text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Capability consumed by the entity repositories.
///
/// Implemented once by [`AmoCrmClient`](crate::AmoCrmClient); repositories only
/// know their endpoint, verb and envelope key.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Send `request` with session credentials and return the 2xx response.
    async fn dispatch(&self, request: ApiRequest) -> Result<RawResponse>;
}

#[async_trait]
impl<T: Dispatch + ?Sized> Dispatch for Arc<T> {
    async fn dispatch(&self, request: ApiRequest) -> Result<RawResponse> {
        (**self).dispatch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let base = Url::parse("https://acme.amocrm.ru/").unwrap();
        let url = Endpoint::new("leads").url(&base).unwrap();
        assert_eq!(url.as_str(), "https://acme.amocrm.ru/api/v4/leads");

        let url = Endpoint::v2("/events/").url(&base).unwrap();
        assert_eq!(url.as_str(), "https://acme.amocrm.ru/api/v2/events");
    }

    #[test]
    fn test_endpoint_join() {
        let endpoint = Endpoint::new("contacts").join(17);
        assert_eq!(endpoint.path(), "contacts/17");
        assert_eq!(endpoint.version(), ApiVersion::V4);
        assert_eq!(endpoint.to_string(), "api/v4/contacts/17");
    }

    #[test]
    fn test_json_sets_body_and_content_type() {
        let request = ApiRequest::post("leads")
            .json(&serde_json::json!([{"name": "Deal"}]))
            .unwrap();
        assert_eq!(request.body(), Some(br#"[{"name":"Deal"}]"#.as_slice()));
        assert!(request.wire_body().is_some());
        assert_eq!(
            request.wire_headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_body_and_content_type_omitted_without_body_method() {
        for request in [ApiRequest::get("leads"), ApiRequest::delete("leads/1")] {
            let request = request.json(&serde_json::json!({"x": 1})).unwrap();
            assert!(request.wire_body().is_none());
            assert!(!request.wire_headers().contains_key(CONTENT_TYPE));
        }
        assert!(!ApiRequest::post("leads").wire_headers().contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_wire_headers_drop_authorization() {
        let request = ApiRequest::get("leads")
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer forged"))
            .header(
                HeaderName::from_static("x-request-id"),
                HeaderValue::from_static("abc"),
            );
        let headers = request.wire_headers();
        assert!(!headers.contains_key(AUTHORIZATION));
        assert_eq!(headers.get("x-request-id").unwrap(), "abc");
    }

    #[test]
    fn test_query_keeps_order() {
        let request = ApiRequest::get("contacts")
            .query_pair("query", "+7918")
            .query([("page", "2"), ("limit", "50")]);
        let keys: Vec<_> = request.query_pairs().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["query", "page", "limit"]);
    }

    #[test]
    fn test_carries_body() {
        assert!(carries_body(&Method::POST));
        assert!(carries_body(&Method::PATCH));
        assert!(!carries_body(&Method::GET));
        assert!(!carries_body(&Method::DELETE));
    }
}
