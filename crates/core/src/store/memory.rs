use super::{CredentialStore, StoredSession};
use crate::session::UserProfile;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-process credential store.
///
/// Nothing survives the process; used by tests and by embedders that manage
/// persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    session: RwLock<StoredSession>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a token pair
    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        let store = Self::new();
        store.set_tokens(access_token, refresh_token, None);
        store
    }

    // A poisoned lock only means a writer panicked mid-assignment of plain data
    fn read(&self) -> RwLockReadGuard<'_, StoredSession> {
        self.session
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoredSession> {
        self.session
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    fn user(&self) -> Option<UserProfile> {
        self.read().user_data.clone()
    }

    fn set_tokens(&self, access_token: &str, refresh_token: &str, user: Option<&UserProfile>) {
        self.write().apply_tokens(access_token, refresh_token, user);
    }

    fn set_user(&self, user: &UserProfile) {
        self.write().user_data = Some(user.clone());
    }

    fn clear(&self) {
        *self.write() = StoredSession::default();
    }
}
