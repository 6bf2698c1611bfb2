//! VetDesk API client
//!
//! [`ApiClient`] is the authenticated gateway every API call goes through:
//!
//! - before sending, the stored access token (if any) is attached as a bearer token;
//! - a 401 on the first attempt triggers one token refresh, shared with any other
//!   request that hits a 401 at the same time, and the request is re-sent once with
//!   the new token;
//! - if the refresh fails, credentials are cleared and [`SessionEvent::Expired`] is
//!   broadcast. Reacting to it (showing a login screen, exiting) is up to the caller.

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod query;
pub mod resource;

mod refresh;

pub use config::{AuthEndpoints, ClientConfig};
pub use envelope::{Envelope, Page};
pub use error::{ClientError, RefreshError};
pub use events::{SessionEvent, SessionEvents};
pub use query::QueryParams;
pub use resource::Resource;

use futures::FutureExt;
use refresh::{RefreshCoordinator, RefreshFuture};
use reqwest::{Client, ClientBuilder, Method, Request, Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use vetdesk_core::token::{ExpiryHint, now_timestamp, unverified_expiry_hint};
use vetdesk_core::{CredentialStore, TokenPair};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!("vetdesk-client/", env!("CARGO_PKG_VERSION"));

/// Authenticated VetDesk API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
    endpoints: AuthEndpoints,
    proactive_refresh: bool,
    refresh: Arc<RefreshCoordinator>,
    events: SessionEvents,
}

/// Body of the token refresh call
#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        Self::builder()
            .base_url(base_url)
            .credentials(credentials)
            .build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The credential store this client reads and writes
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    /// Receive session lifecycle events from this client and all its clones
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a request builder. The bearer token is attached when the request is sent.
    pub fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, self.url(path))
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> reqwest::RequestBuilder {
        self.request(Method::POST, path).json(body)
    }

    pub fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> reqwest::RequestBuilder {
        self.request(Method::PUT, path).json(body)
    }

    pub fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> reqwest::RequestBuilder {
        self.request(Method::PATCH, path).json(body)
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Execute a request and decode the JSON body
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Execute a request and unwrap whichever response envelope the endpoint uses
    pub async fn execute_enveloped<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        self.execute::<Envelope<T>>(request).await?.into_result()
    }

    /// Execute a request whose response body is not needed
    pub async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), ClientError> {
        self.send(request).await.map(drop)
    }

    /// Send a request through the auth interceptors and return the successful response
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let request = request.build()?;

        if self.proactive_refresh {
            self.refresh_if_known_stale().await?;
        }

        // Kept for the single retry; streaming bodies cannot be replayed
        let replay = request.try_clone();
        let sent_token = self.credentials.access_token();

        let response = self.dispatch(request, sent_token.as_deref()).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status != StatusCode::UNAUTHORIZED {
            return Err(error_from_response(response).await);
        }

        let original = error_from_response(response).await;
        let Some(replay) = replay else {
            debug!("Request body cannot be replayed, not retrying after 401");
            return Err(original);
        };

        let Some(new_token) = self.token_for_retry(sent_token.as_deref()).await? else {
            debug!("No refresh token stored, propagating 401");
            return Err(original);
        };

        // Already retried once: whatever happens now is final
        let response = self.dispatch(replay, Some(&new_token)).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Joins a refresh that is already in flight rather than starting another.
    pub async fn refresh_session(&self) -> Result<TokenPair, ClientError> {
        let refresh_token = self.credentials.refresh_token().ok_or_else(|| {
            ClientError::AuthenticationFailed("no refresh token stored".to_string())
        })?;
        self.refresh_with(refresh_token).await
    }

    async fn refresh_with(&self, refresh_token: String) -> Result<TokenPair, ClientError> {
        self.refresh
            .run(&refresh_token, || self.start_refresh(refresh_token.clone()))
            .await
            .map_err(ClientError::SessionExpired)
    }

    /// Attach the bearer token, if any, and send without interception
    async fn dispatch(
        &self,
        mut request: Request,
        access_token: Option<&str>,
    ) -> Result<Response, ClientError> {
        if let Some(token) = access_token {
            match header::HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    request.headers_mut().insert(header::AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored access token is not a valid header value, sending unauthenticated"),
            }
        }

        trace!(method = %request.method(), url = %request.url(), authenticated = access_token.is_some(), "Sending request");
        let response = self.client.execute(request).await?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!(url = %response.url(), "Request forbidden for the current user");
        }
        Ok(response)
    }

    /// Token to retry a 401 with, or `None` when the 401 is final
    async fn token_for_retry(&self, sent_token: Option<&str>) -> Result<Option<String>, ClientError> {
        // Another request may already have renewed the token we sent
        if let Some(current) = self.credentials.access_token() {
            if sent_token.is_some_and(|sent| sent != current) && !self.refresh.is_refreshing() {
                debug!("Access token changed since the request was sent, retrying with it");
                return Ok(Some(current));
            }
        }

        let Some(refresh_token) = self.credentials.refresh_token() else {
            return Ok(None);
        };

        let pair = self.refresh_with(refresh_token).await?;
        Ok(Some(pair.access_token))
    }

    async fn refresh_if_known_stale(&self) -> Result<(), ClientError> {
        let Some(token) = self.credentials.access_token() else {
            return Ok(());
        };
        if unverified_expiry_hint(&token, now_timestamp()) != ExpiryHint::Expired {
            return Ok(());
        }
        if let Some(refresh_token) = self.credentials.refresh_token() {
            debug!("Stored access token is past its expiry, refreshing before sending");
            self.refresh_with(refresh_token).await?;
        }
        Ok(())
    }

    /// Build the refresh future. It bypasses the interceptors and performs the
    /// store update and event emission exactly once, whoever awaits it.
    fn start_refresh(&self, refresh_token: String) -> RefreshFuture {
        let client = self.client.clone();
        let url = self.url(&self.endpoints.refresh);
        let credentials = Arc::clone(&self.credentials);
        let events = self.events.clone();

        let future = async move {
            let outcome = request_token_refresh(&client, &url, &refresh_token).await;

            // A login or logout while this was pending replaced the session it was for
            if credentials.refresh_token().as_deref() != Some(refresh_token.as_str()) {
                debug!("Session changed during token refresh, leaving stored credentials alone");
                return outcome.map(|tokens| {
                    TokenPair::new(
                        tokens.access_token,
                        tokens.refresh_token.unwrap_or(refresh_token),
                    )
                });
            }

            match outcome {
                Ok(tokens) => {
                    // Servers that do not rotate refresh tokens omit it
                    let refresh = tokens.refresh_token.unwrap_or(refresh_token);
                    credentials.set_tokens(&tokens.access_token, &refresh, tokens.user.as_ref());
                    info!("Access token refreshed");
                    events.emit(SessionEvent::Refreshed);
                    Ok(TokenPair::new(tokens.access_token, refresh))
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed, clearing credentials");
                    credentials.clear();
                    events.emit(SessionEvent::Expired {
                        reason: e.message.clone(),
                    });
                    Err(e)
                }
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        let future = future.boxed();
        #[cfg(target_arch = "wasm32")]
        let future = future.boxed_local();
        future
    }
}

async fn request_token_refresh(
    client: &Client,
    url: &str,
    refresh_token: &str,
) -> Result<auth::AuthTokens, RefreshError> {
    let response = client
        .post(url)
        .json(&RefreshRequest {
            refresh: refresh_token,
        })
        .send()
        .await
        .map_err(|e| RefreshError::new(e.status().map(|s| s.as_u16()), e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        return Err(RefreshError::new(Some(status.as_u16()), message));
    }

    response
        .json::<Envelope<auth::AuthTokens>>()
        .await
        .map_err(|e| RefreshError::new(Some(status.as_u16()), e.to_string()))?
        .into_result()
        .map_err(|e| RefreshError::new(Some(status.as_u16()), e.to_string()))
}

pub(crate) async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    let message = response.text().await.unwrap_or_else(|_| status.to_string());
    ClientError::from_status(status, message)
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    credentials: Option<Arc<dyn CredentialStore>>,
    endpoints: Option<AuthEndpoints>,
    /// `None` keeps the default, `Some(None)` disables the timeout
    timeout: Option<Option<Duration>>,
    user_agent: Option<String>,
    proactive_refresh: bool,
    events: Option<SessionEvents>,
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the credential store
    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Override the authentication endpoint paths
    pub fn endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Set the request timeout (default 30 seconds)
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(Some(timeout));
        self
    }

    /// Let requests run without a client-side timeout
    pub const fn no_timeout(mut self) -> Self {
        self.timeout = Some(None);
        self
    }

    /// Timeout the built client will apply, if any
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.unwrap_or(Some(DEFAULT_TIMEOUT))
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Refresh before sending when the stored token's expiry hint has passed
    pub const fn proactive_refresh(mut self, enabled: bool) -> Self {
        self.proactive_refresh = enabled;
        self
    }

    /// Share an event channel with other clients
    pub fn events(mut self, events: SessionEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let timeout = self.effective_timeout();
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let credentials = self
            .credentials
            .ok_or_else(|| ClientError::Configuration("credential store is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = timeout {
            client_builder = client_builder.timeout(timeout);
        }
        #[cfg(target_arch = "wasm32")]
        let _ = timeout; // Timeouts not supported on WASM

        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        );

        let client = client_builder.build()?;

        Ok(ApiClient {
            client,
            base_url,
            credentials,
            endpoints: self.endpoints.unwrap_or_default(),
            proactive_refresh: self.proactive_refresh,
            refresh: Arc::new(RefreshCoordinator::default()),
            events: self.events.unwrap_or_default(),
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("endpoints", &self.endpoints)
            .field("proactive_refresh", &self.proactive_refresh)
            .finish_non_exhaustive()
    }
}
