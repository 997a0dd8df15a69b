//! Retrying HTTP client shared by exporters and importers.
//!
//! One client per run. Requests are issued sequentially and each goes
//! through [`with_retry`] with the configured backoff policy.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryConfig};

/// Upper bound on the connect phase, whatever the request timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response bodies kept in error messages are truncated to this many chars.
const MAX_ERROR_BODY: usize = 512;

/// Options for [`RetryingClient::new`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL; endpoint segments are appended to its path.
    pub base_url: String,
    /// Default headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryConfig,
}

impl ClientOptions {
    /// Options with JSON `Accept`/`Content-Type` headers.
    pub fn json(base_url: impl Into<String>, timeout: Duration, retry: RetryConfig) -> Self {
        Self {
            base_url: base_url.into(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            timeout,
            retry,
        }
    }

    /// Adds a default header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// HTTP client that retries transient failures with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    http: Client,
    base_url: Url,
    retry: RetryConfig,
}

impl RetryingClient {
    /// Builds a client from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid base URL or header, and
    /// [`Error::Http`] if the underlying client cannot be built.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let base_url = validate_url(&options.base_url)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("Invalid value for header '{}': {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .connect_timeout(options.timeout.min(CONNECT_TIMEOUT))
            .build()?;

        Ok(Self {
            http,
            base_url,
            retry: options.retry,
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The retry policy in effect.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Resolves path segments (percent-encoded) against the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::Config(format!("Base URL cannot be a base: {}", self.base_url)))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// GETs `segments` with `query` and decodes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let body = self.execute(Method::GET, url, None).await?;
        parse_body(&body)
    }

    /// POSTs `payload` as JSON to `segments` and decodes the response body.
    ///
    /// POST is only retried when the policy sets `retry_non_idempotent`.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        payload: &B,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        let payload = serde_json::to_value(payload)?;
        let body = self.execute(Method::POST, url, Some(&payload)).await?;
        parse_body(&body)
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        payload: Option<&serde_json::Value>,
    ) -> Result<String> {
        let single_attempt = RetryConfig::no_retry();
        let policy = if is_idempotent(&method) || self.retry.retry_non_idempotent {
            &self.retry
        } else {
            &single_attempt
        };
        let operation_name = format!("{} {}", method, url.path());
        debug!("{}", operation_name);

        with_retry(policy, &operation_name, || {
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(payload) = payload {
                request = request.json(payload);
            }
            async move {
                let response = request.send().await?;
                let status = response.status();
                if status.is_success() {
                    return Ok(response.text().await?);
                }
                let retry_after = parse_retry_after(response.headers());
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(handle_http_error(status.as_u16(), &body, retry_after))
            }
        })
        .await
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
    )
}

/// Validates a base URL: only http and https are accepted.
pub fn validate_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{}'. Allowed: http, https",
            url
        )));
    }
    Url::parse(trimmed).map_err(|e| Error::Config(format!("Invalid URL '{}': {}", url, e)))
}

/// Maps a non-success HTTP response to an error.
pub fn handle_http_error(status_code: u16, body: &str, retry_after: Option<Duration>) -> Error {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    match status_code {
        429 => Error::RateLimit { retry_after },
        401 | 403 => Error::Authentication(format!("HTTP {}: {}", status_code, body)),
        _ => Error::Status {
            status: status_code,
            body,
        },
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    if body.trim().is_empty() {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
