use super::{ACCESS_TOKEN_KEY, CredentialStore, REFRESH_TOKEN_KEY, USER_DATA_KEY};
use crate::session::UserProfile;
use gloo::storage::{LocalStorage, Storage, errors::StorageError};
use tracing::warn;

/// Credential store backed by the browser's `localStorage`.
///
/// Each value lives under its own key, so the presence of each is independently
/// observable from other tabs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserCredentialStore;

impl BrowserCredentialStore {
    pub const fn new() -> Self {
        Self
    }

    fn get<T: serde::de::DeserializeOwned>(key: &str) -> Option<T> {
        match LocalStorage::get(key) {
            Ok(value) => Some(value),
            Err(StorageError::KeyNotFound(_)) => None,
            Err(e) => {
                warn!(key, error = %e, "localStorage read failed");
                None
            }
        }
    }

    fn set<T: serde::Serialize>(key: &str, value: T) {
        if let Err(e) = LocalStorage::set(key, value) {
            warn!(key, error = %e, "localStorage write failed");
        }
    }
}

impl CredentialStore for BrowserCredentialStore {
    fn access_token(&self) -> Option<String> {
        Self::get(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Option<String> {
        Self::get(REFRESH_TOKEN_KEY)
    }

    fn user(&self) -> Option<UserProfile> {
        Self::get(USER_DATA_KEY)
    }

    fn set_tokens(&self, access_token: &str, refresh_token: &str, user: Option<&UserProfile>) {
        if !access_token.is_empty() {
            Self::set(ACCESS_TOKEN_KEY, access_token);
        }
        if !refresh_token.is_empty() {
            Self::set(REFRESH_TOKEN_KEY, refresh_token);
        }
        if let Some(user) = user {
            Self::set(USER_DATA_KEY, user);
        }
    }

    fn set_user(&self, user: &UserProfile) {
        Self::set(USER_DATA_KEY, user);
    }

    fn clear(&self) {
        LocalStorage::delete(ACCESS_TOKEN_KEY);
        LocalStorage::delete(REFRESH_TOKEN_KEY);
        LocalStorage::delete(USER_DATA_KEY);
    }
}
