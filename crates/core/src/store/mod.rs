//! Token store: durable storage of the access/refresh pair and the cached user profile
//!
//! A store is handed to the HTTP client at construction time; nothing in the
//! workspace reaches for ambient global storage. Every method is synchronous and
//! atomic with respect to the other methods on the same store, so a write is
//! visible to the very next read.

mod file;
mod memory;

#[cfg(target_arch = "wasm32")]
mod browser;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserCredentialStore;

use crate::session::UserProfile;
use crate::token::{UnverifiedClaims, decode_unverified_claims, is_expired_hint};
use serde::{Deserialize, Serialize};

/// Storage key holding the access token string
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key holding the refresh token string
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key holding the serialized user profile
pub const USER_DATA_KEY: &str = "user_data";

/// Persistent credential storage.
///
/// Reads never fail: an absent value or an unavailable backend both read as
/// `None`. Backend failures on write are logged and swallowed.
pub trait CredentialStore: Send + Sync {
    /// Current access token
    fn access_token(&self) -> Option<String>;

    /// Current refresh token
    fn refresh_token(&self) -> Option<String>;

    /// Cached user profile
    fn user(&self) -> Option<UserProfile>;

    /// Persist a token pair, and the user profile if given.
    ///
    /// Empty tokens are skipped and keep their previous value.
    fn set_tokens(&self, access_token: &str, refresh_token: &str, user: Option<&UserProfile>);

    /// Replace the cached user profile without touching the tokens
    fn set_user(&self, user: &UserProfile);

    /// Remove the access token, refresh token and user profile. Idempotent.
    fn clear(&self);

    /// Decode the claims of `token`, or of the stored access token when `None`
    fn decode_access_token_payload(&self, token: Option<&str>) -> Option<UnverifiedClaims> {
        match token {
            Some(token) => decode_unverified_claims(token),
            None => decode_unverified_claims(&self.access_token()?),
        }
    }

    /// Whether `token` (or the stored access token) is expired or undecodable
    fn is_access_token_expired(&self, token: Option<&str>) -> bool {
        match token {
            Some(token) => is_expired_hint(token),
            None => self
                .access_token()
                .is_none_or(|stored| is_expired_hint(&stored)),
        }
    }

    /// An access token is stored and its local expiry hint has not passed
    fn is_authenticated(&self) -> bool {
        self.access_token()
            .is_some_and(|token| !is_expired_hint(&token))
    }
}

/// The three persisted values, as one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserProfile>,
}

impl StoredSession {
    pub(crate) fn apply_tokens(
        &mut self,
        access_token: &str,
        refresh_token: &str,
        user: Option<&UserProfile>,
    ) {
        if !access_token.is_empty() {
            self.access_token = Some(access_token.to_string());
        }
        if !refresh_token.is_empty() {
            self.refresh_token = Some(refresh_token.to_string());
        }
        if let Some(user) = user {
            self.user_data = Some(user.clone());
        }
    }
}
