//! Authentication API client methods

use super::{ApiClient, ClientError, Envelope, RefreshRequest, SessionEvent, error_from_response};
use serde::{Deserialize, Deserializer, Serialize};
use vetdesk_core::{TokenPair, UserProfile};

/// Login request
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Tokens returned by the login, registration and refresh endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    #[serde(alias = "access", alias = "token")]
    pub access_token: String,
    #[serde(default, alias = "refresh")]
    pub refresh_token: Option<String>,
    /// Dropped rather than failing the whole response when it does not decode
    #[serde(default, deserialize_with = "lenient_user")]
    pub user: Option<UserProfile>,
}

fn lenient_user<'de, D>(deserializer: D) -> Result<Option<UserProfile>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match serde_json::from_value(value) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable user profile in token response");
            None
        }
    }))
}

/// A freshly established session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub tokens: TokenPair,
    pub user: Option<UserProfile>,
}

impl ApiClient {
    /// Log in with email and password, replacing any stored session
    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<AuthSession, ClientError> {
        let body = LoginRequest {
            email: email.into(),
            password: password.into(),
        };
        let request = self.client.post(self.url(&self.endpoints.login)).json(&body);
        let tokens = self.send_credentials(request).await?;
        self.establish_session(tokens).await
    }

    /// Register a new account and store the resulting session
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ClientError> {
        let request = self
            .client
            .post(self.url(&self.endpoints.register))
            .json(request);
        let tokens = self.send_credentials(request).await?;
        self.establish_session(tokens).await
    }

    /// Fetch the current user's profile and refresh the cached copy
    pub async fn current_user(&self) -> Result<UserProfile, ClientError> {
        let user: UserProfile = self
            .execute_enveloped(self.get(&self.endpoints.me))
            .await?;
        self.credentials.set_user(&user);
        Ok(user)
    }

    /// Log out: tell the server (best effort), then clear local credentials
    pub async fn logout(&self) {
        if let Some(refresh) = self.credentials.refresh_token() {
            let access = self.credentials.access_token();
            let request = self
                .client
                .post(self.url(&self.endpoints.logout))
                .json(&RefreshRequest { refresh: &refresh })
                .build();

            // No refresh-and-retry here: a rejected logout still ends the local session
            match request {
                Ok(request) => match self.dispatch(request, access.as_deref()).await {
                    Ok(response) if !response.status().is_success() => {
                        debug!(status = %response.status(), "Server rejected logout");
                    }
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "Logout request failed"),
                },
                Err(e) => debug!(error = %e, "Could not build logout request"),
            }
        }

        self.credentials.clear();
        self.events().emit(SessionEvent::LoggedOut);
        info!("Logged out");
    }

    /// Send a credential exchange without a bearer token or 401 recovery
    async fn send_credentials(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<AuthTokens, ClientError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response.json::<Envelope<AuthTokens>>().await?.into_result()
    }

    async fn establish_session(&self, tokens: AuthTokens) -> Result<AuthSession, ClientError> {
        let refresh_token = tokens.refresh_token.unwrap_or_default();

        // A new login replaces the previous pair entirely
        self.credentials.clear();
        self.credentials
            .set_tokens(&tokens.access_token, &refresh_token, tokens.user.as_ref());

        let user = match tokens.user {
            Some(user) => Some(user),
            None => match self.current_user().await {
                Ok(user) => Some(user),
                Err(e) => {
                    debug!(error = %e, "Could not load profile after login");
                    None
                }
            },
        };

        info!(user_id = user.as_ref().map(|u| u.id.as_str()), "Session established");
        self.events()
            .emit(SessionEvent::LoggedIn { user: user.clone() });

        Ok(AuthSession {
            tokens: TokenPair::new(tokens.access_token, refresh_token),
            user,
        })
    }
}
