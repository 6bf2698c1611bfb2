use super::{CredentialStore, StoredSession};
use crate::error::{CoreError, CoreResult};
use crate::session::UserProfile;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const SESSION_FILE_NAME: &str = "session.json";

/// Credential store backed by a JSON file.
///
/// The file is re-read on every access so other processes sharing the same
/// state directory observe each other's logins. Writes go through a temporary
/// file and a rename so a reader never sees a half-written document.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Store at an explicit file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store inside `state_dir`
    pub fn in_dir(state_dir: impl AsRef<Path>) -> Self {
        Self::new(state_dir.as_ref().join(SESSION_FILE_NAME))
    }

    /// Default state directory: `VETDESK_STATE_DIR`, else the platform data dir
    pub fn default_state_dir() -> PathBuf {
        std::env::var("VETDESK_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("vetdesk")
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> CoreResult<StoredSession> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredSession::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_or_empty(&self) -> StoredSession {
        self.load().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Unreadable session file, treating as empty");
            StoredSession::default()
        })
    }

    fn save(&self, session: &StoredSession) -> CoreResult<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| CoreError::storage_unavailable("session path has no parent"))?;
        fs::create_dir_all(parent)?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = open_private(&tmp_path)?;
        file.write_all(&serde_json::to_vec_pretty(session)?)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut StoredSession)) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut session = self.load_or_empty();
        f(&mut session);
        if let Err(e) = self.save(&session) {
            warn!(path = %self.path.display(), error = %e, "Failed to persist session");
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

impl CredentialStore for FileCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.load_or_empty().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.load_or_empty().refresh_token
    }

    fn user(&self) -> Option<UserProfile> {
        self.load_or_empty().user_data
    }

    fn set_tokens(&self, access_token: &str, refresh_token: &str, user: Option<&UserProfile>) {
        self.update(|session| session.apply_tokens(access_token, refresh_token, user));
    }

    fn set_user(&self, user: &UserProfile) {
        self.update(|session| session.user_data = Some(user.clone()));
    }

    fn clear(&self) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Session file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove session file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    fn user() -> UserProfile {
        UserProfile {
            id: "3".into(),
            name: "Nurse Joy".into(),
            email: "joy@clinic.test".into(),
            role: Role::Assistant,
        }
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path().join("nested"));
        store.set_tokens("a1", "r1", Some(&user()));

        let reopened = FileCredentialStore::in_dir(dir.path().join("nested"));
        assert_eq!(reopened.access_token().as_deref(), Some("a1"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("r1"));
        assert_eq!(reopened.user(), Some(user()));
    }

    #[test]
    fn test_document_uses_logical_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        store.set_tokens("a1", "r1", Some(&user()));

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw[crate::store::ACCESS_TOKEN_KEY], "a1");
        assert_eq!(raw[crate::store::REFRESH_TOKEN_KEY], "r1");
        assert_eq!(raw[crate::store::USER_DATA_KEY]["role"], "assistant");
    }

    #[test]
    fn test_clear_removes_everything_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        store.set_tokens("a1", "r1", Some(&user()));

        store.clear();
        store.clear();

        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.user().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        fs::write(store.path(), b"{not json").unwrap();

        assert!(store.access_token().is_none());

        store.set_tokens("a1", "r1", None);
        assert_eq!(store.access_token().as_deref(), Some("a1"));
    }

    #[test]
    fn test_partial_update_keeps_other_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        store.set_tokens("a1", "r1", Some(&user()));
        store.set_tokens("a2", "", None);

        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
        assert_eq!(store.user(), Some(user()));
    }
}
