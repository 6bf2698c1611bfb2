//! Error type shared by the credential storage backends

/// Standard result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Core error types
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, thiserror::Error)]
pub enum CoreError {
    #[error("Storage unavailable: {message}")]
    StorageUnavailable { message: String },

    #[error("IO operation failed: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl CoreError {
    /// Create a storage-unavailable error
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create an IO error
    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err.to_string())
    }
}
