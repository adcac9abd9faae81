//! Provider types and traits

use std::fmt;

use super::http::HttpResponse;
use crate::coord::TileId;

/// Errors that can occur while fetching a tile.
///
/// Every variant is treated as a transient failure by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, reading the body)
    HttpError(String),
    /// Upstream answered with a status that is neither success nor not-found
    HttpStatus(u16),
    /// Failed to configure the HTTP client
    ClientSetup(String),
    /// The fetch panicked inside the source
    Panicked(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::HttpStatus(status) => write!(f, "Unexpected HTTP status {}", status),
            ProviderError::ClientSetup(msg) => write!(f, "HTTP client setup failed: {}", msg),
            ProviderError::Panicked(msg) => write!(f, "Fetch panicked: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// What an upstream returned for a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TilePayload {
    /// An image body (PNG, JPEG, ...)
    Image(Vec<u8>),
    /// The upstream answered but has no tile here (404, or a soft-404 page)
    Missing,
}

/// A source of raw tile data.
///
/// Implementations block the calling thread for the duration of the fetch;
/// they are only ever called from fetch worker threads.
pub trait TileSource: Send + Sync {
    /// Fetches the tile for `id`.
    fn fetch(&self, id: TileId) -> Result<TilePayload, ProviderError>;

    /// Returns the source's name for logging.
    fn name(&self) -> &str;
}

/// Classifies an HTTP response into a payload.
///
/// Some tile servers do not hold tiles for every zoom level and answer with
/// a `200 text/html` page instead of a 404, so anything that is not an image
/// body counts as missing.
pub fn classify_response(response: HttpResponse) -> Result<TilePayload, ProviderError> {
    match response.status {
        200..=299 => {
            if response.is_image() && !response.body.is_empty() {
                Ok(TilePayload::Image(response.body))
            } else {
                Ok(TilePayload::Missing)
            }
        }
        404 | 410 => Ok(TilePayload::Missing),
        status => Err(ProviderError::HttpStatus(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, content_type: Option<&str>, body: &[u8]) -> HttpResponse {
        HttpResponse {
            status,
            content_type: content_type.map(str::to_string),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_image_response_is_image_payload() {
        let payload = classify_response(response(200, Some("image/png"), &[1, 2, 3])).unwrap();
        assert_eq!(payload, TilePayload::Image(vec![1, 2, 3]));
    }

    #[test]
    fn test_soft_404_is_missing() {
        let payload =
            classify_response(response(200, Some("text/html; charset=UTF-8"), b"<html>")).unwrap();
        assert_eq!(payload, TilePayload::Missing);
    }

    #[test]
    fn test_missing_content_type_is_missing() {
        let payload = classify_response(response(200, None, &[1, 2, 3])).unwrap();
        assert_eq!(payload, TilePayload::Missing);
    }

    #[test]
    fn test_empty_image_body_is_missing() {
        let payload = classify_response(response(200, Some("image/png"), &[])).unwrap();
        assert_eq!(payload, TilePayload::Missing);
    }

    #[test]
    fn test_not_found_is_missing() {
        let payload = classify_response(response(404, Some("text/html"), b"nope")).unwrap();
        assert_eq!(payload, TilePayload::Missing);
    }

    #[test]
    fn test_server_error_is_error() {
        let result = classify_response(response(503, Some("text/html"), b"busy"));
        assert_eq!(result, Err(ProviderError::HttpStatus(503)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProviderError::HttpStatus(500).to_string(),
            "Unexpected HTTP status 500"
        );
        assert_eq!(
            ProviderError::HttpError("timed out".to_string()).to_string(),
            "HTTP error: timed out"
        );
    }
}
