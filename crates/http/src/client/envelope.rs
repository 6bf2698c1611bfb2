//! Normalization of the response envelopes the API uses
//!
//! Endpoints answer in one of several shapes:
//!
//! - `{ "success": bool, "data": T, "error": ... }` (or `"message"` in place of `"error"`)
//! - `{ "data": T }`
//! - a bare `T`
//!
//! and list endpoints return either a paginated object
//! (`{ "count", "next", "previous", "results" }`) or a bare array.

use super::error::ClientError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Any of the supported response shapes around a payload `T`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Status {
        success: bool,
        #[serde(default = "none")]
        data: Option<T>,
        #[serde(default, alias = "message")]
        error: Option<Value>,
    },
    Data {
        data: T,
    },
    Bare(T),
}

const fn none<T>() -> Option<T> {
    None
}

impl<T> Envelope<T> {
    /// Unwrap the payload, turning `success: false` into an error
    pub fn into_result(self) -> Result<T, ClientError> {
        match self {
            Self::Status {
                success: true,
                data: Some(data),
                ..
            }
            | Self::Data { data }
            | Self::Bare(data) => Ok(data),
            Self::Status {
                success: true,
                data: None,
                ..
            } => Err(ClientError::Api("response reported success without data".into())),
            Self::Status {
                success: false,
                error,
                ..
            } => Err(ClientError::Api(describe_error(error.as_ref()))),
        }
    }
}

fn describe_error(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Null) | None => "request was not successful".to_string(),
        Some(other) => other.to_string(),
    }
}

/// One page of a list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "RawPage<T>",
    bound(deserialize = "T: Deserialize<'de>", serialize = "T: Serialize")
)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub const fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPage<T> {
    Paginated {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
        results: Vec<T>,
    },
    List(Vec<T>),
}

impl<T> From<RawPage<T>> for Page<T> {
    fn from(raw: RawPage<T>) -> Self {
        match raw {
            RawPage::Paginated {
                count,
                next,
                previous,
                results,
            } => Self {
                count: count.unwrap_or(results.len() as u64),
                next,
                previous,
                results,
            },
            RawPage::List(results) => Self {
                count: results.len() as u64,
                next: None,
                previous: None,
                results,
            },
        }
    }
}
