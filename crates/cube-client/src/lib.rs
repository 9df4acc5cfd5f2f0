//! # cube-client
//!
//! Blocking HTTP client for Cube-style analytics APIs.
//!
//! This crate provides:
//! - Token-authenticated `GET /meta` and `GET /load` calls
//! - Polling on the backend's `400 "Continue wait"` convention with
//!   capped exponential backoff
//! - Transparent token regeneration on `403`
//! - Retry on transport failures, sharing the same budget as polling
//! - Numeric normalization of query results from column annotations
//! - A typed query contract
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Calling layer                          │
//! │        (tool dispatch, CLI, anything holding a Query)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     BackendClient                           │
//! │  - Holds credentials, current token, schema snapshot        │
//! │  - Retry state machine: wait / reauth / transport / done    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     cast_numerics                           │
//! │  - Rewrites string cells of numeric columns in place        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use cubelink_auth::Credentials;
//! use cubelink_client::{query::Query, BackendClient, ErrorPayload};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let creds = Credentials::from_env()?;
//!     let mut client = BackendClient::new(creds)?;
//!
//!     let result = client.query(&Query::new().measure("Orders.count"))?;
//!     match ErrorPayload::from_response(&result) {
//!         Some(err) => eprintln!("backend error: {err}"),
//!         None => println!("{}", result["data"]),
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod normalize;
mod request;
mod response;
mod retry;
pub mod query;
pub mod schema;

pub use client::BackendClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, ErrorKind, Result};
pub use normalize::{cast_numerics, numeric_columns};
pub use request::{Endpoint, RequestParams};
pub use response::{is_continue_wait, timeout_payload, ErrorPayload, CONTINUE_WAIT, REQUEST_TIMEOUT};
pub use retry::{BackoffStrategy, RetryConfig, RetryPolicy};
pub use schema::SchemaSummary;

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("cubelink/", env!("CARGO_PKG_VERSION"));
