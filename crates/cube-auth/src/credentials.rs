//! Backend credentials.
//!
//! The shared secret is redacted in Debug output.

use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::token::generate_token;
use crate::{API_SECRET_ENV, ENDPOINT_ENV, TOKEN_PAYLOAD_ENV};

/// Endpoint, shared secret and token claims for one backend.
///
/// Credentials are immutable once built; the `with_*` methods consume and
/// return a new value.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    endpoint: String,
    api_secret: String,
    token_payload: Map<String, Value>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("api_secret", &"[REDACTED]")
            .field("token_payload", &self.token_payload)
            .finish()
    }
}

impl Credentials {
    /// Create credentials from an endpoint, a secret and a claims object.
    pub fn new(
        endpoint: impl Into<String>,
        api_secret: impl Into<String>,
        token_payload: Map<String, Value>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_secret: api_secret.into(),
            token_payload,
        }
    }

    /// Create credentials whose claims are given as JSON text.
    ///
    /// The text must decode to a JSON object.
    pub fn from_payload_json(
        endpoint: impl Into<String>,
        api_secret: impl Into<String>,
        token_payload: &str,
    ) -> Result<Self> {
        let payload = match serde_json::from_str::<Value>(token_payload)? {
            Value::Object(map) => map,
            other => {
                return Err(Error::new(ErrorKind::InvalidCredentials(format!(
                    "token payload must be a JSON object, got {}",
                    json_type_name(&other)
                ))))
            }
        };
        Ok(Self::new(endpoint, api_secret, payload))
    }

    /// Load credentials from environment variables.
    ///
    /// Reads `CUBE_ENDPOINT`, `CUBE_API_SECRET` and the optional
    /// `CUBE_TOKEN_PAYLOAD` (a JSON object, defaults to `{}`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup(ENDPOINT_ENV)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::new(ErrorKind::EnvVar(ENDPOINT_ENV.to_string())))?;

        let api_secret = lookup(API_SECRET_ENV)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::new(ErrorKind::EnvVar(API_SECRET_ENV.to_string())))?;

        let payload = lookup(TOKEN_PAYLOAD_ENV).unwrap_or_else(|| "{}".to_string());

        Self::from_payload_json(endpoint, api_secret, &payload)
    }

    /// Add or replace a single claim.
    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.token_payload.insert(key.into(), value.into());
        self
    }

    /// Merge several claims, later entries overriding earlier ones.
    pub fn with_claims<K, V>(mut self, claims: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in claims {
            self.token_payload.insert(key.into(), value.into());
        }
        self
    }

    /// The endpoint exactly as configured.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The endpoint with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// The shared signing secret.
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// The claims signed into every token.
    pub fn token_payload(&self) -> &Map<String, Value> {
        &self.token_payload
    }

    /// Returns true if endpoint and secret are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.base_url().is_empty() && !self.api_secret.is_empty()
    }

    /// Sign the claims with the secret.
    pub fn generate_token(&self) -> Result<String> {
        if self.api_secret.is_empty() {
            return Err(Error::new(ErrorKind::InvalidCredentials(
                "API secret is empty".to_string(),
            )));
        }
        generate_token(&self.token_payload, &self.api_secret)
    }
}

/// Parse a `KEY=VALUE` claim argument.
///
/// The value is always signed as a string, so `user_id=123` yields
/// `"123"`. A bare `KEY` becomes `true`. Claims that need other JSON types
/// belong in the token payload object.
pub fn parse_claim(arg: &str) -> Result<(String, Value)> {
    let (key, value) = match arg.split_once('=') {
        Some((key, raw)) => (key, Value::String(raw.to_string())),
        None => (arg, Value::Bool(true)),
    };

    let key = key.trim().trim_start_matches("--");
    if key.is_empty() {
        return Err(Error::new(ErrorKind::InvalidCredentials(format!(
            "claim '{}' has an empty key",
            arg
        ))));
    }
    Ok((key.to_string(), value))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
