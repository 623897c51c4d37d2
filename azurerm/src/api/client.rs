use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::auth::Credential;
use super::error::{ApiError, ErrorEnvelope};

pub const API_VERSION: &str = "2023-09-01";

/// Azure Resource Manager client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    credential: Credential,
    retry_config: RetryConfig,
    poll_config: PollConfig,
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 60,
        }
    }
}

/// Long-running operation polling intervals
#[derive(Clone)]
pub struct PollConfig {
    /// Used when the service sends no Retry-After
    pub default_interval: Duration,
    pub min_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(10),
            min_interval: Duration::from_secs(1),
        }
    }
}

/// A successful response with the headers the LRO poller needs
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    pub fn retry_after(&self) -> Option<Duration> {
        retry_after(&self.headers)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, self.body);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(endpoint: &str, credential: Credential) -> Result<Self, ApiError> {
        Self::with_config(
            endpoint,
            credential,
            RetryConfig::default(),
            PollConfig::default(),
        )
    }

    pub fn with_config(
        endpoint: &str,
        credential: Credential,
        retry_config: RetryConfig,
        poll_config: PollConfig,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry_config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("terraform-provider-azurerm-lb/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = endpoint.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| ApiError::ParseError(format!("invalid endpoint {}: {}", base_url, e)))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                credential,
                retry_config,
                poll_config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.inner.poll_config
    }

    /// Resolves an ARM path against the endpoint and appends api-version.
    /// Absolute URLs (operation status links) are used unchanged.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path)
                .map_err(|e| ApiError::ParseError(format!("invalid URL {}: {}", path, e)));
        }

        let mut url = Url::parse(&format!("{}{}", self.inner.base_url, path))
            .map_err(|e| ApiError::ParseError(format!("invalid path {}: {}", path, e)))?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    /// Execute a GET request and deserialize the body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_raw(path).await?.json()
    }

    pub async fn get_raw(&self, path: &str) -> Result<RawResponse, ApiError> {
        self.execute_with_retry(Method::GET, path, None).await
    }

    /// Execute a PUT request; the caller polls the returned operation
    pub async fn put_raw<B: Serialize>(&self, path: &str, body: &B) -> Result<RawResponse, ApiError> {
        let body = serde_json::to_vec(body)
            .map_err(|e| ApiError::ParseError(format!("Failed to encode request: {}", e)))?;
        tracing::debug!("PUT body for {}: {}", path, String::from_utf8_lossy(&body));
        self.execute_with_retry(Method::PUT, path, Some(body)).await
    }

    pub async fn delete_raw(&self, path: &str) -> Result<RawResponse, ApiError> {
        self.execute_with_retry(Method::DELETE, path, None).await
    }

    /// Load balancer API operations
    pub fn load_balancers(&self) -> crate::api::load_balancers::LoadBalancersApi<'_> {
        crate::api::load_balancers::LoadBalancersApi::new(self)
    }

    /// Execute request with retry logic
    async fn execute_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url(path)?;
        let config = &self.inner.retry_config;
        let mut attempt = 0;
        let mut last_error = None;
        let mut server_delay = None;

        while attempt <= config.max_retries {
            if attempt > 0 {
                let backoff = server_delay.take().unwrap_or_else(|| {
                    Duration::from_millis(std::cmp::min(
                        config.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                        config.max_backoff_ms,
                    ))
                });
                tracing::warn!(
                    "Retrying {} {} after {}ms (attempt {})",
                    method,
                    path,
                    backoff.as_millis(),
                    attempt
                );
                tokio::time::sleep(backoff).await;
            }

            let token = self.inner.credential.token().await?;
            tracing::debug!("{} request to: {}", method, url);

            let mut request = self
                .inner
                .http_client
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, format!("Bearer {}", token));
            if let Some(body) = &body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();

                    if status.is_success() {
                        let body = response.text().await?;
                        tracing::debug!("API response {} body: {}", status, body);
                        return Ok(RawResponse {
                            status,
                            headers,
                            body,
                        });
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let cap = Duration::from_millis(config.max_backoff_ms);
                        server_delay = retry_after(&headers).map(|delay| delay.min(cap));
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(self.handle_error_response(path, response).await);
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(ApiError::Timeout(config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Handle error response
    async fn handle_error_response(&self, path: &str, response: reqwest::Response) -> ApiError {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let envelope = ErrorEnvelope::parse(&text);

        match status {
            StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let message = if envelope.error.message.is_empty() {
                    text
                } else {
                    envelope.error.message
                };
                ApiError::AuthError(message)
            }
            _ => {
                let message = if envelope.error.message.is_empty() {
                    text
                } else {
                    envelope.error.message
                };
                ApiError::ApiError {
                    status: status.as_u16(),
                    code: envelope.error.code,
                    message,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};
    use serde_json::Value;

    #[tokio::test]
    async fn get_sends_bearer_token_and_api_version() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/subscriptions/sub/resourceGroups/rg")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer test-token")
            .match_query(Matcher::UrlEncoded(
                "api-version".into(),
                API_VERSION.into(),
            ))
            .with_body(r#"{"name":"rg"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let body: Value = client
            .get("/subscriptions/sub/resourceGroups/rg")
            .await
            .unwrap();
        assert_eq!(body["name"], "rg");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/thing")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/thing")
            .match_query(Matcher::Any)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let _: Value = client.get("/thing").await.unwrap();

        failing.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_delay_is_capped_by_max_backoff() {
        let mut server = Server::new_async().await;
        let throttled = server
            .mock("GET", "/thing")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "3600")
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/thing")
            .match_query(Matcher::Any)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let result = tokio::time::timeout(Duration::from_secs(5), client.get::<Value>("/thing")).await;
        assert!(matches!(result, Ok(Ok(_))), "{:?}", result);

        throttled.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/thing")
            .match_query(Matcher::Any)
            .with_status(500)
            .expect(4)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let result: Result<Value, _> = client.get("/thing").await;
        assert!(matches!(result, Err(ApiError::ServiceUnavailable)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn maps_not_found_and_auth_errors() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"nope"}}"#)
            .create_async()
            .await;
        let _denied = server
            .mock("GET", "/denied")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error":{"code":"InvalidAuthenticationToken","message":"expired"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());

        let missing: Result<Value, _> = client.get("/missing").await;
        assert!(missing.unwrap_err().is_not_found());

        match client.get::<Value>("/denied").await {
            Err(ApiError::AuthError(message)) => assert_eq!(message, "expired"),
            other => panic!("expected AuthError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn bad_requests_carry_arm_error_code() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", "/lb")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":"InvalidRequestFormat","message":"bad port"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        match client.put_raw("/lb", &serde_json::json!({})).await {
            Err(ApiError::ApiError {
                status,
                code,
                message,
            }) => {
                assert_eq!(status, 400);
                assert_eq!(code, "InvalidRequestFormat");
                assert_eq!(message, "bad port");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn put_sends_json_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/lb")
            .match_query(Matcher::Any)
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({"name": "lb1"})))
            .with_status(201)
            .with_header("Azure-AsyncOperation", "https://example.test/op")
            .with_body("{}")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = client
            .put_raw("/lb", &serde_json::json!({"name": "lb1"}))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(
            response.header("azure-asyncoperation"),
            Some("https://example.test/op")
        );
        mock.assert_async().await;
    }

    #[test]
    fn absolute_urls_are_not_rewritten() {
        let client = create_test_client("https://management.azure.com/");
        let url = client
            .url("https://management.azure.com/operations/1?api-version=2023-09-01")
            .unwrap();
        assert_eq!(url.query(), Some("api-version=2023-09-01"));

        let url = client.url("/subscriptions/s").unwrap();
        assert_eq!(
            url.as_str(),
            "https://management.azure.com/subscriptions/s?api-version=2023-09-01"
        );
    }

    #[test]
    fn retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 100);
        assert_eq!(config.max_backoff_ms, 10000);

        let poll = PollConfig::default();
        assert_eq!(poll.default_interval, Duration::from_secs(10));
        assert_eq!(poll.min_interval, Duration::from_secs(1));
    }
}
