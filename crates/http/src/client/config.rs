//! Client configuration
//!
//! Loaded from an optional TOML file and `VETDESK_*` environment variables,
//! e.g. `VETDESK_BASE_URL` or `VETDESK_ENDPOINTS__LOGIN`.

use super::{ApiClient, ApiClientBuilder, ClientError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vetdesk_core::CredentialStore;

const ENV_PREFIX: &str = "VETDESK";

/// Paths of the authentication endpoints, relative to the base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEndpoints {
    pub login: String,
    pub register: String,
    pub refresh: String,
    pub logout: String,
    pub me: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/auth/login/".to_string(),
            register: "/auth/register/".to_string(),
            refresh: "/auth/token/refresh/".to_string(),
            logout: "/auth/logout/".to_string(),
            me: "/auth/me/".to_string(),
        }
    }
}

/// API client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API base URL, e.g. `https://clinic.example.com/api`
    pub base_url: String,

    /// Per-request timeout in seconds (0 disables it)
    pub timeout_secs: u64,

    /// User agent override
    pub user_agent: Option<String>,

    /// Refresh before sending when the stored access token is known to be expired
    pub proactive_refresh: bool,

    pub endpoints: AuthEndpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_secs: 30,
            user_agent: None,
            proactive_refresh: false,
            endpoints: AuthEndpoints::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a file, with environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value cannot be parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration from defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable cannot be parsed
    pub fn from_env() -> Result<Self, ClientError> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("timeout_secs", defaults.timeout_secs)?
            .set_default("proactive_refresh", defaults.proactive_refresh)?
            .add_source(environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load from `path` when given, otherwise from the environment alone
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_file`] and [`ClientConfig::from_env`]
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        path.map_or_else(Self::from_env, Self::from_file)
    }

    /// Builder pre-populated from this configuration
    pub fn builder(&self, credentials: Arc<dyn CredentialStore>) -> ApiClientBuilder {
        let mut builder = ApiClient::builder()
            .base_url(&self.base_url)
            .credentials(credentials)
            .endpoints(self.endpoints.clone())
            .proactive_refresh(self.proactive_refresh);

        builder = match self.timeout_secs {
            0 => builder.no_timeout(),
            secs => builder.timeout(Duration::from_secs(secs)),
        };
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder
    }

    /// Build a client from this configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn into_client(self, credentials: Arc<dyn CredentialStore>) -> Result<ApiClient, ClientError> {
        self.builder(credentials).build()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
