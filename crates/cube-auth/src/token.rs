//! HS256 token signing.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;

/// Sign `claims` with `secret` using HS256.
///
/// The claims are signed exactly as given. Nothing time-dependent is added,
/// so the output is a pure function of its inputs: re-signing after a
/// rejected token only helps if the secret or claims changed, or the
/// backend rotated its key.
pub fn generate_token(claims: &Map<String, Value>, secret: &str) -> Result<String> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    let token = encode(&header, claims, &key)?;
    debug!(claims = claims.len(), "Signed backend token");
    Ok(token)
}
