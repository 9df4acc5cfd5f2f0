//! Backend client with continue-wait polling, token refresh and retry.
//!
//! ## Security
//!
//! - The token is redacted in Debug output
//! - Tracing spans skip request parameters and credentials

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use cubelink_auth::Credentials;

use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::normalize::cast_numerics;
use crate::request::{Endpoint, RequestParams};
use crate::response::{is_continue_wait, timeout_payload, ErrorPayload};
use crate::retry::RetryPolicy;

/// Outcome of a single HTTP exchange.
#[derive(Debug)]
enum Attempt {
    /// Terminal payload, success or error-shaped.
    Done(Value),
    /// Backend is still computing.
    ContinueWait,
    /// Backend rejected the token.
    Forbidden,
    /// The exchange failed before a usable payload arrived.
    Failed(Error),
}

/// Blocking client for a Cube-style analytics backend.
///
/// Holds the credentials, the current token and the schema snapshot taken
/// at construction. Every call blocks the current thread, including any
/// backoff sleeps; calls take `&mut self`, so one client serves one request
/// at a time.
///
/// Backend failures never surface as `Err`: error-shaped payloads are
/// returned as data and an exhausted retry budget yields
/// `{"error": "Request timeout"}`. Check every payload with
/// [`ErrorPayload::from_response`].
///
/// # Example
///
/// ```rust,ignore
/// use cubelink_auth::Credentials;
/// use cubelink_client::{query::Query, BackendClient};
///
/// let creds = Credentials::from_env()?;
/// let mut client = BackendClient::new(creds)?;
///
/// let result = client.query(&Query::new().measure("Orders.count"))?;
/// if let Some(err) = cubelink_client::ErrorPayload::from_response(&result) {
///     eprintln!("query failed: {err}");
/// }
/// ```
pub struct BackendClient {
    http: reqwest::blocking::Client,
    config: ClientConfig,
    credentials: Credentials,
    base_url: String,
    token: String,
    schema: Value,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a client with default configuration and fetch the schema.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_config(credentials, ClientConfig::default())
    }

    /// Create a client with custom configuration and fetch the schema.
    ///
    /// Fails only on local problems: an endpoint that is not a URL, a
    /// secret that cannot sign, or a transport that cannot be built. A
    /// backend that is down or answers with an error still yields a client;
    /// the failure is kept in the schema snapshot (see
    /// [`schema_error`](Self::schema_error)).
    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let base_url = checked_base_url(&credentials)?;
        let token = credentials.generate_token()?;
        let http = build_transport(&config)?;

        let mut client = Self {
            http,
            config,
            credentials,
            base_url,
            token,
            schema: Value::Null,
        };

        client.schema = client.describe();
        if let Some(err) = client.schema_error() {
            warn!(error = %err, "Schema description unavailable at startup");
        }

        Ok(client)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The endpoint base with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token sent with the next request.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Schema snapshot fetched at construction.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// The error carried by the schema snapshot, if any.
    pub fn schema_error(&self) -> Option<ErrorPayload> {
        ErrorPayload::from_response(&self.schema)
    }

    /// Replace the credentials, e.g. after a secret rotation.
    ///
    /// The current token stays in use until the next refresh, which happens
    /// on [`refresh_token`](Self::refresh_token) or when the backend answers
    /// 403. The schema snapshot is not refetched.
    pub fn set_credentials(&mut self, credentials: Credentials) -> Result<()> {
        self.base_url = checked_base_url(&credentials)?;
        self.credentials = credentials;
        Ok(())
    }

    /// Regenerate the token and replace the current one.
    ///
    /// The old token stays in place if signing fails.
    pub fn refresh_token(&mut self) -> Result<()> {
        let token = self.credentials.generate_token()?;
        self.token = token;
        Ok(())
    }

    /// Fetch the schema description live.
    pub fn describe(&mut self) -> Value {
        self.request(Endpoint::Describe, &RequestParams::new())
    }

    /// Run a query and coerce numeric columns.
    pub fn query<Q: Serialize + ?Sized>(&mut self, query: &Q) -> Result<Value> {
        self.query_with(query, true)
    }

    /// Run a query, optionally coercing numeric columns.
    ///
    /// Errors only when `query` cannot be serialized to JSON.
    pub fn query_with<Q: Serialize + ?Sized>(
        &mut self,
        query: &Q,
        cast: bool,
    ) -> Result<Value> {
        let params = RequestParams::new().with("query", query)?;
        let mut response = self.request(Endpoint::Query, &params);

        if cast {
            let converted = cast_numerics(&mut response);
            if converted > 0 && self.config.enable_tracing {
                debug!(converted, "Cast numeric cells");
            }
        }

        Ok(response)
    }

    /// Execute a request against `endpoint`, retrying as needed.
    ///
    /// Always returns a JSON payload. See the type-level docs for how
    /// failures are represented.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub fn request(&mut self, endpoint: Endpoint, params: &RequestParams) -> Value {
        let url = match request_url(&self.base_url, endpoint, params) {
            Ok(url) => url,
            Err(err) => {
                error!(error = %err, "Could not build request URL");
                return json!({ "error": err.to_string() });
            }
        };

        let mut policy = RetryPolicy::new(self.config.retry.clone());

        loop {
            match self.attempt(&url) {
                Attempt::Done(body) => return body,
                Attempt::ContinueWait => {
                    let Some(delay) = policy.next_delay() else {
                        return self.exhausted(&policy);
                    };
                    info!(
                        attempt = policy.attempt(),
                        wait_ms = delay.as_millis() as u64,
                        "Backend asked to continue waiting, retrying"
                    );
                    sleep(delay);
                }
                Attempt::Forbidden => {
                    if !policy.record_reauth() {
                        error!(
                            reauths = policy.reauths(),
                            "Token rejected after refresh, giving up"
                        );
                        return timeout_payload();
                    }
                    warn!("Received 403, attempting token refresh");
                    if let Err(err) = self.refresh_token() {
                        error!(error = %err, "Token refresh failed");
                        return json!({ "error": err.to_string() });
                    }
                }
                Attempt::Failed(err) => {
                    let Some(delay) = policy.next_delay() else {
                        error!(error = %err, "Request failed on final attempt");
                        return self.exhausted(&policy);
                    };
                    warn!(
                        attempt = policy.attempt(),
                        wait_ms = delay.as_millis() as u64,
                        transport = err.is_transport(),
                        error = %err,
                        "Request failed, retrying"
                    );
                    sleep(delay);
                }
            }
        }
    }

    /// Perform one GET and classify the result.
    fn attempt(&self, url: &Url) -> Attempt {
        let request = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, self.token.as_str());

        if self.config.enable_tracing {
            debug!(path = url.path(), "Sending request");
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(err) => return Attempt::Failed(err.into()),
        };

        let status = response.status().as_u16();
        if self.config.enable_tracing {
            debug!(status, content_length = response.content_length(), "Response received");
        }

        if status == 403 {
            return Attempt::Forbidden;
        }

        let text = match response.text() {
            Ok(text) => text,
            Err(err) => return Attempt::Failed(err.into()),
        };

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(err) => {
                debug!(status, "Response body is not JSON");
                return Attempt::Failed(err.into());
            }
        };

        match status {
            200 => Attempt::Done(body),
            400 if is_continue_wait(&body) => Attempt::ContinueWait,
            _ => {
                let message = ErrorPayload::from_response(&body)
                    .map(|e| e.error)
                    .unwrap_or_default();
                error!(status, error = %message, "Backend returned an error response");
                Attempt::Done(body)
            }
        }
    }

    fn exhausted(&self, policy: &RetryPolicy) -> Value {
        error!(attempts = policy.attempt(), "Max retries exceeded");
        timeout_payload()
    }
}

fn checked_base_url(credentials: &Credentials) -> Result<String> {
    let base_url = credentials.base_url().to_string();
    let parsed = Url::parse(&base_url)?;
    if parsed.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::InvalidUrl(format!(
            "{} cannot be used as a base URL",
            base_url
        ))));
    }
    Ok(base_url)
}

/// Endpoint URL with every parameter form-encoded into the query string.
fn request_url(base: &str, endpoint: Endpoint, params: &RequestParams) -> Result<Url> {
    let mut url = Url::parse(&endpoint.url(base))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.to_query_pairs());
    }
    Ok(url)
}

fn build_transport(config: &ClientConfig) -> Result<reqwest::blocking::Client> {
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(&config.user_agent)
        .gzip(config.accept_compressed)
        .deflate(config.accept_compressed);

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))
}

fn sleep(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use serde_json::Map;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE_PATH: &str = "/cubejs-api/v1";
    const SECRET: &str = "test-secret-key";

    fn claims() -> Map<String, Value> {
        match json!({"user_id": "test-user", "role": "admin"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn credentials(server: &MockServer) -> Credentials {
        Credentials::new(format!("{}{}", server.uri(), BASE_PATH), SECRET, claims())
    }

    fn expected_token() -> String {
        cubelink_auth::generate_token(&claims(), SECRET).unwrap()
    }

    fn fast_config() -> ClientConfig {
        ClientConfig::builder().with_retry(RetryConfig::fast()).build()
    }

    fn meta_response() -> Value {
        json!({"cubes": [{"name": "Orders", "measures": [{"name": "Orders.count", "type": "number"}]}]})
    }

    fn query_response() -> Value {
        json!({
            "data": [
                {"Orders.status": "completed", "Orders.count": "42", "Orders.total_amount": "1234.56"},
                {"Orders.status": "pending", "Orders.count": "10", "Orders.total_amount": "567.89"}
            ],
            "annotation": {
                "measures": {
                    "Orders.count": {"type": "number"},
                    "Orders.total_amount": {"type": "number"}
                },
                "dimensions": {"Orders.status": {"type": "string"}}
            }
        })
    }

    async fn mount_meta(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/meta")))
            .respond_with(ResponseTemplate::new(200).set_body_json(meta_response()))
            .mount(server)
            .await;
    }

    async fn load_requests(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().ends_with("/load"))
            .count()
    }

    /// Run the blocking client off the async test runtime.
    async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        tokio::task::spawn_blocking(f).await.unwrap()
    }

    #[tokio::test]
    async fn test_construction_fetches_schema() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/meta")))
            .and(header("Authorization", expected_token().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(meta_response()))
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let (schema, token, base) = blocking(move || {
            let client = BackendClient::with_config(creds, fast_config()).unwrap();
            (client.schema().clone(), client.token().to_string(), client.base_url().to_string())
        })
        .await;

        assert_eq!(schema, meta_response());
        assert_eq!(token, expected_token());
        assert!(base.ends_with(BASE_PATH));
    }

    #[tokio::test]
    async fn test_trailing_slash_endpoint() {
        let server = MockServer::start().await;
        mount_meta(&server).await;

        let creds = Credentials::new(format!("{}{}/", server.uri(), BASE_PATH), SECRET, claims());
        let (schema, endpoint) = blocking(move || {
            let client = BackendClient::with_config(creds, fast_config()).unwrap();
            (client.schema().clone(), client.credentials().endpoint().to_string())
        })
        .await;

        assert_eq!(schema, meta_response());
        assert!(endpoint.ends_with('/'));
    }

    #[tokio::test]
    async fn test_error_shaped_schema_does_not_fail_construction() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/meta")))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"error": "Schema compile error", "stack": "at compile"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let err = blocking(move || {
            let client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.schema_error()
        })
        .await
        .unwrap();

        assert_eq!(err.error, "Schema compile error");
        assert_eq!(err.stack.as_deref(), Some("at compile"));
    }

    #[tokio::test]
    async fn test_query_sends_serialized_param_and_casts() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .and(query_param("query", r#"{"measures":["Orders.count"]}"#))
            .and(header("Authorization", expected_token().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(query_response()))
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query(&json!({"measures": ["Orders.count"]})).unwrap()
        })
        .await;

        assert_eq!(result["data"][0]["Orders.count"], 42);
        assert_eq!(result["data"][0]["Orders.total_amount"], 1234.56);
        assert_eq!(result["data"][1]["Orders.status"], "pending");
    }

    #[tokio::test]
    async fn test_query_without_numeric_casting() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(200).set_body_json(query_response()))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query_with(&json!({"measures": ["Orders.count"]}), false).unwrap()
        })
        .await;

        assert_eq!(result, query_response());
    }

    #[tokio::test]
    async fn test_continue_wait_then_success() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Continue wait"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(200).set_body_json(query_response()))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query_with(&json!({"measures": ["Orders.count"]}), false).unwrap()
        })
        .await;

        assert_eq!(result, query_response());
        assert_eq!(load_requests(&server).await, 2);
    }

    #[tokio::test]
    async fn test_continue_wait_exhausts_budget() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Continue wait"})))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query(&json!({"measures": ["Orders.count"]})).unwrap()
        })
        .await;

        assert_eq!(result, json!({"error": "Request timeout"}));
        assert_eq!(load_requests(&server).await, RetryConfig::fast().max_attempts as usize);
    }

    #[tokio::test]
    async fn test_budget_resets_between_calls() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Continue wait"})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let config = ClientConfig::builder()
            .with_retry(RetryConfig::fast().with_max_attempts(3))
            .build();
        let (first, second) = blocking(move || {
            let mut client = BackendClient::with_config(creds, config).unwrap();
            let first = client.query(&json!({})).unwrap();
            let second = client.query(&json!({})).unwrap();
            (first, second)
        })
        .await;

        assert_eq!(first, json!({"data": []}));
        assert_eq!(second, json!({"data": []}));
        assert_eq!(load_requests(&server).await, 4);
    }

    #[tokio::test]
    async fn test_403_refreshes_token_without_budget() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        let token = expected_token();
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .and(header("Authorization", token.as_str()))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "Unauthorized"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .and(header("Authorization", token.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(query_response()))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query_with(&json!({"measures": ["Orders.count"]}), false).unwrap()
        })
        .await;

        assert_eq!(result, query_response());
        assert_eq!(load_requests(&server).await, 2);
    }

    #[tokio::test]
    async fn test_403_resigns_with_rotated_secret() {
        const ROTATED: &str = "rotated-secret-key";
        let old_token = expected_token();
        let new_token = cubelink_auth::generate_token(&claims(), ROTATED).unwrap();
        assert_ne!(old_token, new_token);

        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .and(header("Authorization", old_token.as_str()))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .and(header("Authorization", new_token.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let rotated = Credentials::new(creds.endpoint(), ROTATED, claims());
        let (result, token_before, token_after) = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.set_credentials(rotated).unwrap();
            let token_before = client.token().to_string();
            let result = client.query(&json!({})).unwrap();
            (result, token_before, client.token().to_string())
        })
        .await;

        assert_eq!(result, json!({"data": []}));
        assert_eq!(token_before, old_token);
        assert_eq!(token_after, new_token);

        let sent: Vec<String> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().ends_with("/load"))
            .filter_map(|r| r.headers.get("authorization"))
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        assert_eq!(sent, vec![old_token, new_token]);
    }

    #[test]
    fn test_set_credentials_rejects_invalid_endpoint() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let creds = Credentials::new(format!("http://127.0.0.1:{port}"), SECRET, claims());
        let mut client = BackendClient::with_config(
            creds,
            ClientConfig::builder().without_retry().build(),
        )
        .unwrap();

        let err = client
            .set_credentials(Credentials::new("not a url", SECRET, claims()))
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidUrl(_)));
        assert_eq!(client.credentials().api_secret(), SECRET);
    }

    #[tokio::test]
    async fn test_transport_failures_share_budget_with_waits() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Continue wait"})))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query(&json!({})).unwrap()
        })
        .await;

        assert_eq!(result, json!({"error": "Request timeout"}));
        assert_eq!(load_requests(&server).await, RetryConfig::fast().max_attempts as usize);
    }

    #[tokio::test]
    async fn test_mixed_failures_within_budget_succeed() {
        let budget = RetryConfig::fast().max_attempts;
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Continue wait"})))
            .up_to_n_times(u64::from(budget - 3))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query(&json!({})).unwrap()
        })
        .await;

        assert_eq!(result, json!({"data": []}));
        assert_eq!(load_requests(&server).await, budget as usize);
    }

    #[tokio::test]
    async fn test_403_then_full_wait_budget_still_succeeds() {
        let budget = RetryConfig::fast().max_attempts;
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(403))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Continue wait"})))
            .up_to_n_times(u64::from(budget - 1))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"n": "1"}]})))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query_with(&json!({}), false).unwrap()
        })
        .await;

        assert_eq!(result, json!({"data": [{"n": "1"}]}));
        assert_eq!(load_requests(&server).await, budget as usize + 1);
    }

    #[tokio::test]
    async fn test_persistent_403_is_capped() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query(&json!({})).unwrap()
        })
        .await;

        assert_eq!(result, json!({"error": "Request timeout"}));
        let cap = RetryConfig::fast().max_reauth_attempts as usize;
        assert_eq!(load_requests(&server).await, cap + 1);
    }

    #[tokio::test]
    async fn test_non_200_is_returned_without_retry() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        let body = json!({
            "error": "Query execution error",
            "stack": "Error: Query execution failed\n    at QueryEngine.execute"
        });
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(500).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query(&json!({})).unwrap()
        })
        .await;

        assert_eq!(result, body);
        assert_eq!(load_requests(&server).await, 1);
    }

    #[tokio::test]
    async fn test_other_400_is_terminal() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "Unknown member: Foo.bar"})),
            )
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query(&json!({"measures": ["Foo.bar"]})).unwrap()
        })
        .await;

        assert_eq!(result, json!({"error": "Unknown member: Foo.bar"}));
        assert_eq!(load_requests(&server).await, 1);
    }

    #[tokio::test]
    async fn test_non_json_body_is_retried() {
        let server = MockServer::start().await;
        mount_meta(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/load")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let result = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            client.query(&json!({})).unwrap()
        })
        .await;

        assert_eq!(result, json!({"data": []}));
        assert_eq!(load_requests(&server).await, 2);
    }

    #[tokio::test]
    async fn test_describe_fetches_live() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/meta")))
            .respond_with(ResponseTemplate::new(200).set_body_json(meta_response()))
            .expect(2)
            .mount(&server)
            .await;

        let creds = credentials(&server);
        let (live, cached) = blocking(move || {
            let mut client = BackendClient::with_config(creds, fast_config()).unwrap();
            (client.describe(), client.schema().clone())
        })
        .await;

        assert_eq!(live, meta_response());
        assert_eq!(cached, meta_response());
    }

    #[test]
    fn test_transport_failure_exhausts_budget() {
        // Reserve a port, then close it so connections are refused
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let creds = Credentials::new(format!("http://127.0.0.1:{port}{BASE_PATH}"), SECRET, claims());
        let client = BackendClient::with_config(creds, fast_config()).unwrap();

        let err = client.schema_error().unwrap();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_invalid_endpoint_fails_construction() {
        let creds = Credentials::new("not a url", SECRET, claims());
        let err = BackendClient::with_config(creds, fast_config()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidUrl(_)));
    }

    #[test]
    fn test_empty_secret_fails_construction() {
        let creds = Credentials::new("http://127.0.0.1:9", "", claims());
        let err = BackendClient::with_config(creds, fast_config()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Auth(_)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let creds = Credentials::new(format!("http://127.0.0.1:{port}"), SECRET, claims());
        let client = BackendClient::with_config(
            creds,
            ClientConfig::builder().without_retry().build(),
        )
        .unwrap();

        let debug_output = format!("{:?}", client);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(client.token()));
        assert!(!debug_output.contains(SECRET));
    }
}
