//! VetDesk core types: session credentials, token storage and token inspection

pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use error::{CoreError, CoreResult};
pub use session::{Role, TokenPair, UserProfile};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use token::{ExpiryHint, UnverifiedClaims, decode_unverified_claims, unverified_expiry_hint};

#[cfg(target_arch = "wasm32")]
pub use store::BrowserCredentialStore;
