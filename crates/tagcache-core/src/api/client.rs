//! HTTP client for the game-statistics profile API.
//!
//! Entities are addressed by concatenating the configured base URL with the
//! normalized tag, e.g. `https://api.example.com/profile/` + `2PP`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;

use super::ApiError;
use crate::models::Tag;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Source of raw entity JSON.
///
/// [`ApiClient`] is the production implementation; the store is generic over
/// this trait so tests can stand in for the network.
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch the JSON document for `tag`, giving up after `timeout`.
    fn fetch(
        &self,
        tag: &Tag,
        timeout: Duration,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// API client for entity profiles.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl ApiClient {
    /// Create a new API client for `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<Arc<str>>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the entity, with no path templating.
    pub fn url_for(&self, tag: &Tag) -> String {
        format!("{}{}", self.base_url, tag)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidResponse("API token is not a valid header value".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// GET a URL and parse the body as JSON. No retries: a failed request is
    /// reported to the caller as-is.
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(url)
            .headers(self.auth_headers()?)
            .timeout(timeout)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let response = Self::check_response(response).await?;
        let body = response.text().await.map_err(ApiError::from_transport)?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl Fetcher for ApiClient {
    async fn fetch(&self, tag: &Tag, timeout: Duration) -> Result<Value, ApiError> {
        let url = self.url_for(tag);
        debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "Fetching entity");
        self.get_json(&url, timeout).await
    }
}
