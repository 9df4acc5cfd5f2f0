//! Endpoints and request parameters.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Result;

/// Backend endpoint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Schema description (`/meta`).
    Describe,
    /// Query execution (`/load`).
    Query,
}

impl Endpoint {
    /// Path relative to the endpoint base.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Describe => "meta",
            Endpoint::Query => "load",
        }
    }

    /// Full URL for this endpoint under `base`.
    ///
    /// A trailing slash on `base` is dropped so the result never contains
    /// `//` before the path.
    pub fn url(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.path())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Query-string parameters for one backend call.
///
/// Each value is JSON-encoded on its own, so `query=<json>` travels as a
/// single parameter instead of a request body. Values are encoded straight
/// from the caller's type, keeping struct field and map insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    params: IndexMap<String, String>,
}

impl RequestParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, encoding it as JSON text.
    pub fn with<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Result<Self> {
        self.params.insert(name.into(), serde_json::to_string(value)?);
        Ok(self)
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The encoded JSON text of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Name and JSON text of every parameter, in insertion order.
    pub fn to_query_pairs(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect()
    }
}
