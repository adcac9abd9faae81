//! HTTP client abstraction for testability

use std::time::Duration;

use super::types::ProviderError;

/// Minimal view of an HTTP response.
///
/// Non-success statuses are returned as values, not errors, so that
/// "not found" can be told apart from a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Value of the `Content-Type` header, if present
    pub content_type: Option<String>,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// True if the content type announces an image.
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }
}

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs a blocking HTTP GET request.
    ///
    /// Returns an error only when no response was received (connection
    /// failure, timeout, truncated body).
    fn get(&self, url: &str) -> Result<HttpResponse, ProviderError>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the given request timeout and optional proxy URL.
    ///
    /// The proxy applies to all schemes.
    pub fn with_config(timeout_secs: u64, proxy: Option<&str>) -> Result<Self, ProviderError> {
        let mut builder =
            reqwest::blocking::Client::builder().timeout(Duration::from_secs(timeout_secs));

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                ProviderError::ClientSetup(format!("Invalid proxy '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            ProviderError::ClientSetup(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ProviderError::HttpError(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ProviderError::HttpError(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
