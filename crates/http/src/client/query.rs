//! Query string construction for list endpoints

use serde::Serialize;
use std::fmt::Display;

/// Ordered query parameters.
///
/// Absent and empty values are dropped so callers can pass optional filters
/// straight through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key=value` unless the value renders empty
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.push(key, value);
        self
    }

    /// Append `key=value` when `value` is present and non-empty
    #[must_use]
    pub fn with_opt<V: Display>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    #[must_use]
    pub fn page(self, page: u32) -> Self {
        self.with("page", page)
    }

    #[must_use]
    pub fn page_size(self, page_size: u32) -> Self {
        self.with("page_size", page_size)
    }

    #[must_use]
    pub fn search(self, term: &str) -> Self {
        self.with("search", term.trim())
    }

    /// Sort field; prefix with `-` for descending
    #[must_use]
    pub fn ordering(self, field: &str) -> Self {
        self.with("ordering", field)
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Display) {
        let value = value.to_string();
        if !value.is_empty() {
            self.0.push((key.into(), value));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// URL-encoded form, without the leading `?`
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Display> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.push(key, value);
        }
        params
    }
}
