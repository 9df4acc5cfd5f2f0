//! # cube-auth
//!
//! Credentials and token issuance for Cube-style analytics backends.
//!
//! ## Security
//!
//! - The shared API secret is redacted in Debug output
//! - Error messages never carry the secret or a signed token
//!
//! ## Tokens
//!
//! Tokens are HS256 JWTs signed over the caller's claims with the shared
//! secret. No `iat`/`exp` is injected, so identical claims and secret always
//! produce the identical token string.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cubelink_auth::Credentials;
//!
//! let creds = Credentials::from_env()?
//!     .with_claim("tenant_id", "acme");
//! let token = creds.generate_token()?;
//! ```

mod credentials;
mod error;
mod token;

pub use credentials::{parse_claim, Credentials};
pub use error::{Error, ErrorKind, Result};
pub use token::generate_token;

/// Environment variable holding the backend endpoint URL.
pub const ENDPOINT_ENV: &str = "CUBE_ENDPOINT";

/// Environment variable holding the shared signing secret.
pub const API_SECRET_ENV: &str = "CUBE_API_SECRET";

/// Environment variable holding the JSON object of token claims.
pub const TOKEN_PAYLOAD_ENV: &str = "CUBE_TOKEN_PAYLOAD";
