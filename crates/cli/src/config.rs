//! CLI configuration utilities

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use vetdesk_core::FileCredentialStore;
use vetdesk_http::ClientConfig;

/// Name of the configuration file looked up in the data directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Data directory from the command line, else `VETDESK_STATE_DIR`, else the platform data dir
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(FileCredentialStore::default_state_dir)
}

/// Load the client configuration.
///
/// An explicit file must exist. Without one, `<data_dir>/config.toml` is used when present,
/// otherwise defaults with environment overrides.
pub fn load_client_config(explicit: Option<&Path>, data_dir: &Path) -> Result<ClientConfig> {
    if let Some(path) = explicit {
        info!("Loading configuration from: {}", path.display());
        return ClientConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }

    let default_config = data_dir.join(CONFIG_FILE_NAME);
    if default_config.exists() {
        info!("Loading configuration from: {}", default_config.display());
        ClientConfig::from_file(&default_config)
            .with_context(|| format!("failed to load {}", default_config.display()))
    } else {
        info!("Using default configuration with environment overrides");
        Ok(ClientConfig::from_env()?)
    }
}
