//! Client error types

use thiserror::Error;

/// Why a token refresh failed.
///
/// Cloneable so every caller waiting on the same in-flight refresh receives it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RefreshError {
    /// HTTP status of the refresh response, if one arrived
    pub status: Option<u16>,
    pub message: String,
}

impl RefreshError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(reqwest::Error),

    /// The client-side timeout elapsed
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The access token could not be renewed; credentials have been cleared
    #[error("Session expired: {0}")]
    SessionExpired(RefreshError),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A successful HTTP response whose envelope reported failure
    #[error("API error: {0}")]
    Api(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// HTTP status behind this error, when there is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::ServerError { status, .. } => Some(*status),
            Self::AuthenticationFailed(_) => Some(401),
            Self::SessionExpired(e) => e.status,
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Forbidden(_) => Some(403),
            _ => None,
        }
    }

    /// The caller must log in again before retrying
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::SessionExpired(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Request(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ClientError::from_status(StatusCode::UNAUTHORIZED, "nope".into()),
            ClientError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::FORBIDDEN, "no".into()),
            ClientError::Forbidden(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_GATEWAY, "down".into()),
            ClientError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn test_auth_expired_classification() {
        assert!(ClientError::AuthenticationFailed(String::new()).is_auth_expired());
        assert!(
            ClientError::SessionExpired(RefreshError::new(Some(401), "revoked")).is_auth_expired()
        );
        assert!(!ClientError::Forbidden(String::new()).is_auth_expired());
        assert!(!ClientError::Timeout(String::new()).is_auth_expired());
    }

    #[test]
    fn test_status_of_session_expired_is_refresh_status() {
        let err = ClientError::SessionExpired(RefreshError::new(Some(400), "bad refresh"));
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "Session expired: bad refresh");
    }
}
