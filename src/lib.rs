//! # cubelink
//!
//! A resilient client for Cube-style analytics APIs.
//!
//! The backend answers long-running queries with `400 {"error": "Continue wait"}`
//! until the result is ready, rejects stale tokens with `403`, and returns
//! numeric measures as strings. This crate hides all three: calls poll with
//! capped exponential backoff, tokens are regenerated on rejection, and
//! numeric columns come back as JSON numbers.
//!
//! ## Security
//!
//! - The API secret and the current token are redacted in Debug output
//! - Tracing spans skip credentials and request parameters
//!
//! ## Crates
//!
//! - **cubelink-auth** - Credentials, claims and HS256 token signing
//! - **cubelink-client** - Blocking HTTP client, retry state machine, query
//!   contract and numeric normalization
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cubelink::auth::Credentials;
//! use cubelink::client::{query::Query, BackendClient, ErrorPayload};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // CUBE_ENDPOINT, CUBE_API_SECRET and optionally CUBE_TOKEN_PAYLOAD
//!     let creds = Credentials::from_env()?;
//!     let mut client = BackendClient::new(creds)?;
//!
//!     let result = client.query(&Query::new().measure("Orders.count"))?;
//!     if let Some(err) = ErrorPayload::from_response(&result) {
//!         eprintln!("query failed: {err}");
//!     }
//!     Ok(())
//! }
//! ```

pub use cubelink_auth as auth;
pub use cubelink_client as client;

pub use cubelink_auth::Credentials;
pub use cubelink_client::{BackendClient, ClientConfig, ErrorPayload, RetryConfig};
