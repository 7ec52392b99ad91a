//! Session state and the authenticated request dispatcher.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};
use url::Url;

use amocrm_oauth::{
    Authenticator, Credentials, JsonFileTokenStorage, SharedTokenStorage, Token,
    build_authorization_url,
};

use crate::api::{CallsApi, ContactsApi, EventsApi, LeadsApi, UsersApi};
use crate::config::ClientConfig;
use crate::error::{AuthError, ConfigError, DispatchError, Error, Result};
use crate::request::{ApiRequest, Dispatch, RawResponse};

/// Default timeout for requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens expiring within this window are refreshed before use.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(30);

type RefreshResult = std::result::Result<Token, AuthError>;
type RefreshFuture = Shared<BoxFuture<'static, RefreshResult>>;

/// amoCRM API client.
///
/// One value is one session: credentials, the bound account domain, the
/// current token and an optional [`TokenStorage`](amocrm_oauth::TokenStorage).
/// Clones share the session.
///
/// # Example
///
/// ```no_run
/// use amocrm_client::AmoCrmClient;
///
/// # async fn example() -> amocrm_client::Result<()> {
/// let client = AmoCrmClient::builder()
///     .credentials("client-id", "client-secret", "https://example.com/callback")
///     .domain("example.amocrm.ru")
///     .build()?;
///
/// client.exchange_authorization_code("def502...").await?;
/// let lead = client.leads().get(42).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AmoCrmClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    credentials: Arc<Credentials>,
    binding: RwLock<Option<Binding>>,
    token: RwLock<Option<Token>>,
    /// Refresh currently in progress, if any.
    in_flight: Mutex<Option<RefreshFuture>>,
    storage: Option<SharedTokenStorage>,
    timeout: Duration,
    refresh_skew: chrono::Duration,
}

/// Account the session talks to.
#[derive(Clone)]
struct Binding {
    domain: String,
    base_url: Url,
    authenticator: Arc<Authenticator>,
}

impl fmt::Debug for AmoCrmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmoCrmClient")
            .field("credentials", &self.inner.credentials)
            .field("base_url", &self.base_url().map(String::from))
            .field("token", &*self.inner.token.read())
            .field("storage", &self.inner.storage)
            .finish()
    }
}

impl AmoCrmClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Integration credentials this session exchanges tokens with.
    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Domain binding
    // ─────────────────────────────────────────────────────────────────────────

    /// Bind the session to an account domain such as `example.amocrm.ru`.
    ///
    /// Requests already in progress finish against the previous domain.
    pub fn set_domain(&self, domain: &str) -> Result<()> {
        let base_url = domain_base_url(domain)?;
        let binding = self.bind(base_url)?;
        info!(domain = %binding.domain, "Bound account domain");
        *self.inner.binding.write() = Some(binding);
        Ok(())
    }

    /// The bound account domain.
    pub fn domain(&self) -> Option<String> {
        self.inner.binding.read().as_ref().map(|b| b.domain.clone())
    }

    /// Base URL resource paths are joined onto.
    pub fn base_url(&self) -> Option<Url> {
        self.inner.binding.read().as_ref().map(|b| b.base_url.clone())
    }

    fn bind(&self, base_url: Url) -> Result<Binding> {
        bind(&self.inner.http, &self.inner.credentials, base_url)
    }

    fn binding(&self) -> std::result::Result<Binding, DispatchError> {
        self.inner
            .binding
            .read()
            .clone()
            .ok_or(DispatchError::NotConfigured("domain"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Snapshot of the current token.
    pub fn token(&self) -> Option<Token> {
        self.inner.token.read().clone()
    }

    /// Install `token` and persist it when storage is configured.
    pub async fn set_token(&self, token: Token) -> Result<()> {
        *self.inner.token.write() = Some(token.clone());
        if let Some(storage) = &self.inner.storage {
            storage.set_token(&token).await?;
        }
        Ok(())
    }

    /// Install the stored token, if there is one.
    ///
    /// Returns `false` when the storage holds nothing yet.
    pub async fn load_token(&self) -> Result<bool> {
        let storage = self
            .inner
            .storage
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("token_storage".to_string()))?;

        match storage.get_token().await? {
            Some(token) => {
                debug!(expires_at = %token.expires_at(), "Loaded stored token");
                *self.inner.token.write() = Some(token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Exchange a one-time authorization code, then install and persist the token.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<Token> {
        let binding = self.binding()?;
        let token = binding.authenticator.exchange_authorization_code(code).await?;
        self.set_token(token.clone()).await?;
        Ok(token)
    }

    /// Consent page URL for the authorization-code flow.
    pub fn authorization_url(&self, state: &str) -> String {
        build_authorization_url(&self.inner.credentials, state)
    }

    /// Renew the current token now, regardless of its expiry.
    ///
    /// Joins a refresh that is already running instead of starting another.
    pub async fn refresh_token(&self) -> Result<Token> {
        let current = self
            .token()
            .ok_or(DispatchError::NotConfigured("token"))?;
        self.refresh_from(&current).await
    }

    /// Current token, renewed first when it is about to expire.
    async fn fresh_token(&self) -> Result<Token> {
        let token = self
            .token()
            .ok_or(DispatchError::NotConfigured("token"))?;

        if token.is_stale(self.inner.refresh_skew) {
            debug!(expires_at = %token.expires_at(), "Token stale, refreshing before dispatch");
            return self.refresh_from(&token).await;
        }
        Ok(token)
    }

    /// Replace `observed` with a renewed token.
    ///
    /// At most one exchange runs per session. Callers arriving while one is in
    /// progress wait for it; callers whose `observed` token was already
    /// replaced get the replacement without another exchange.
    async fn refresh_from(&self, observed: &Token) -> Result<Token> {
        let pending = {
            let mut slot = self.inner.in_flight.lock();

            let current = self.token().unwrap_or_else(|| observed.clone());
            if current.access_token() != observed.access_token() {
                return Ok(current);
            }

            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let authenticator = self.binding()?.authenticator;
                    let refresh = run_refresh(Arc::downgrade(&self.inner), authenticator, current);
                    let pending = AssertUnwindSafe(refresh)
                        .catch_unwind()
                        .map(|outcome| {
                            outcome.unwrap_or_else(|_| {
                                Err(AuthError::Aborted("token refresh panicked".to_string()))
                            })
                        })
                        .boxed()
                        .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        Ok(pending.await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the leads API.
    pub fn leads(&self) -> LeadsApi {
        LeadsApi::new(self.clone())
    }

    /// Access the contacts API.
    pub fn contacts(&self) -> ContactsApi {
        ContactsApi::new(self.clone())
    }

    /// Access the users API.
    pub fn users(&self) -> UsersApi {
        UsersApi::new(self.clone())
    }

    /// Access the calls API.
    pub fn calls(&self) -> CallsApi {
        CallsApi::new(self.clone())
    }

    /// Access the inbound-call events API.
    pub fn events(&self) -> EventsApi {
        EventsApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    async fn send(
        &self,
        url: &Url,
        request: &ApiRequest,
        token: &Token,
    ) -> Result<reqwest::Response> {
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url.clone())
            .headers(request.wire_headers())
            .bearer_auth(token.access_token())
            .timeout(request.timeout.unwrap_or(self.inner.timeout));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.wire_body() {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, %url, "Dispatching request");
        builder
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e).into())
    }
}

#[async_trait]
impl Dispatch for AmoCrmClient {
    async fn dispatch(&self, request: ApiRequest) -> Result<RawResponse> {
        let binding = self.binding()?;
        let url = request
            .endpoint
            .url(&binding.base_url)
            .map_err(|e| ConfigError::Invalid {
                field: "endpoint",
                reason: e.to_string(),
            })?;

        let token = self.fresh_token().await?;
        let response = self.send(&url, &request, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_response(response).await;
        }

        warn!(%url, "Access token rejected, refreshing and retrying once");
        let token = self.refresh_from(&token).await?;
        let response = self.send(&url, &request, &token).await?;
        read_response(response).await
    }
}

/// Clears the session's in-flight slot on drop unless released earlier.
struct InFlightSlot {
    session: Weak<ClientInner>,
    armed: bool,
}

impl InFlightSlot {
    fn release(&mut self) {
        if !std::mem::take(&mut self.armed) {
            return;
        }
        if let Some(inner) = self.session.upgrade() {
            let pending = inner.in_flight.lock().take();
            drop(pending);
        }
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.release();
    }
}

/// Exchange `current` and publish the result to the session.
///
/// The in-memory swap and slot release happen before the token is persisted,
/// so new requests never wait on storage. Holds the session weakly: the
/// future lives in the session's own slot.
async fn run_refresh(
    session: Weak<ClientInner>,
    authenticator: Arc<Authenticator>,
    current: Token,
) -> RefreshResult {
    let mut slot = InFlightSlot {
        session: session.clone(),
        armed: true,
    };
    let outcome = authenticator.refresh(&current).await;
    let Some(inner) = session.upgrade() else {
        return outcome;
    };

    match &outcome {
        Ok(token) => {
            *inner.token.write() = Some(token.clone());
            slot.release();
            info!(expires_at = %token.expires_at(), "Access token refreshed");

            if let Some(storage) = &inner.storage {
                if let Err(e) = storage.set_token(token).await {
                    warn!(error = %e, "Failed to persist refreshed token");
                }
            }
        }
        Err(e) => {
            slot.release();
            warn!(error = %e, "Token refresh failed");
        }
    }

    outcome
}

/// Read the body and classify the status.
async fn read_response(response: reqwest::Response) -> Result<RawResponse> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(DispatchError::Transport)?;
    debug!(status = status.as_u16(), bytes = body.len(), "Received response");

    if status.is_success() {
        return Ok(RawResponse {
            status,
            headers,
            body,
        });
    }

    Err(classify(status, body).into())
}

fn classify(status: StatusCode, body: Bytes) -> DispatchError {
    match status {
        StatusCode::UNAUTHORIZED => DispatchError::Unauthorized { body },
        s if s.is_server_error() => DispatchError::ServiceUnavailable {
            status: s.as_u16(),
            body,
        },
        s => DispatchError::RequestRejected {
            status: s.as_u16(),
            body,
        },
    }
}

/// `https://<domain>/` for a bare account domain.
fn domain_base_url(domain: &str) -> Result<Url> {
    let domain = domain.trim().trim_end_matches('/');
    let invalid = |reason: &str| ConfigError::Invalid {
        field: "domain",
        reason: reason.to_string(),
    };

    if domain.is_empty() {
        return Err(invalid("must not be empty").into());
    }
    if domain.contains("://") || domain.contains('/') || domain.contains(char::is_whitespace) {
        return Err(invalid("expected a host name such as example.amocrm.ru").into());
    }

    Url::parse(&format!("https://{domain}/")).map_err(|e| invalid(&e.to_string()).into())
}

fn bind(http: &reqwest::Client, credentials: &Arc<Credentials>, mut base_url: Url) -> Result<Binding> {
    if !base_url.path().ends_with('/') {
        base_url.set_path(&format!("{}/", base_url.path()));
    }
    let domain = base_url
        .host_str()
        .ok_or_else(|| ConfigError::Invalid {
            field: "base_url",
            reason: "URL has no host".to_string(),
        })?
        .to_string();
    let authenticator = Authenticator::new(http.clone(), Arc::clone(credentials), &base_url)
        .map_err(|e| ConfigError::Invalid {
            field: "base_url",
            reason: e.to_string(),
        })?;

    Ok(Binding {
        domain,
        base_url,
        authenticator: Arc::new(authenticator),
    })
}

/// Builder for creating an [`AmoCrmClient`].
pub struct ClientBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: Option<String>,
    domain: Option<String>,
    base_url: Option<String>,
    token: Option<Token>,
    storage: Option<SharedTokenStorage>,
    timeout: Duration,
    refresh_skew: Duration,
    user_agent: Option<String>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_url", &self.redirect_url)
            .field("domain", &self.domain)
            .field("base_url", &self.base_url)
            .field("token", &self.token)
            .field("storage", &self.storage)
            .field("timeout", &self.timeout)
            .field("refresh_skew", &self.refresh_skew)
            .finish()
    }
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_url: None,
            domain: None,
            base_url: None,
            token: None,
            storage: None,
            timeout: DEFAULT_TIMEOUT,
            refresh_skew: DEFAULT_REFRESH_SKEW,
            user_agent: None,
        }
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::new()
            .credentials(
                &config.client_id,
                &config.client_secret,
                &config.redirect_url,
            )
            .timeout(config.timeout())
            .refresh_skew(config.refresh_skew());
        if let Some(domain) = &config.domain {
            builder = builder.domain(domain);
        }
        if let Some(path) = &config.token_file {
            builder = builder.token_storage(Arc::new(JsonFileTokenStorage::new(path)));
        }
        builder
    }

    /// Set all three integration credentials.
    pub fn credentials(
        self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        self.client_id(client_id)
            .client_secret(client_secret)
            .redirect_url(redirect_url)
    }

    /// Set the integration ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the integration secret key.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Set the redirect URL registered with the integration.
    pub fn redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        self.redirect_url = Some(redirect_url.into());
        self
    }

    /// Set the account domain, e.g. `example.amocrm.ru`.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Use a full base URL instead of `https://<domain>/`. Takes precedence over
    /// [`ClientBuilder::domain`].
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Install an initial token.
    pub fn token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    /// Persist tokens through `storage`.
    pub fn token_storage(mut self, storage: SharedTokenStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how long before expiry a token is considered stale.
    pub fn refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<AmoCrmClient> {
        let credentials = Arc::new(Credentials::new(
            required(self.client_id, "client_id")?,
            required(self.client_secret, "client_secret")?,
            required(self.redirect_url, "redirect_url")?,
        ));

        let refresh_skew =
            chrono::Duration::from_std(self.refresh_skew).map_err(|e| ConfigError::Invalid {
                field: "refresh_skew",
                reason: e.to_string(),
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("amocrm-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        let binding = match (self.base_url, self.domain) {
            (Some(url), _) => {
                let url = Url::parse(&url).map_err(|e| ConfigError::Invalid {
                    field: "base_url",
                    reason: e.to_string(),
                })?;
                Some(bind(&http, &credentials, url)?)
            }
            (None, Some(domain)) => Some(bind(&http, &credentials, domain_base_url(&domain)?)?),
            (None, None) => None,
        };

        Ok(AmoCrmClient {
            inner: Arc::new(ClientInner {
                http,
                credentials,
                binding: RwLock::new(binding),
                token: RwLock::new(self.token),
                in_flight: Mutex::new(None),
                storage: self.storage,
                timeout: self.timeout,
                refresh_skew,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::NotConfigured(field.to_string())),
    }
}
