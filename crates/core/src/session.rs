//! Session credentials held by a client: the bearer token pair and the cached user profile

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Role tag carried by the cached user profile.
///
/// This is the only authorization signal the client uses. It is taken from the
/// login/refresh responses as-is and never derived from token claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Veterinarian,
    Assistant,
    Receptionist,
    /// Pet owner; also used when the server sends no role (least privilege)
    #[default]
    Client,
    /// Any role this client does not know about, preserved verbatim
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Veterinarian => "veterinarian",
            Self::Assistant => "assistant",
            Self::Receptionist => "receptionist",
            Self::Client => "client",
            Self::Other(tag) => tag,
        }
    }

    /// Practice staff (everyone except pet owners and unknown roles)
    pub const fn is_staff(&self) -> bool {
        matches!(
            self,
            Self::Admin | Self::Veterinarian | Self::Assistant | Self::Receptionist
        )
    }
}

impl From<String> for Role {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "veterinarian" | "vet" => Self::Veterinarian,
            "assistant" => Self::Assistant,
            "receptionist" => Self::Receptionist,
            "client" | "owner" => Self::Client,
            _ => Self::Other(tag),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "username", alias = "full_name", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// Access/refresh token pair as returned by the login and refresh endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(alias = "access")]
    pub access_token: String,
    #[serde(alias = "refresh")]
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Uint(n) => n.to_string(),
    })
}
