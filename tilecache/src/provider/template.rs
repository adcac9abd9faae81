//! URL-template tile source.
//!
//! Builds one URL per tile from a template containing `{x}`, `{y}` and
//! `{zoom}` placeholders. An optional `{s}` placeholder spreads requests
//! over four mirror hosts (`(x + y) % 4`), the way the legacy Google
//! endpoints are load balanced across `mt0`..`mt3`.
//!
//! # Coordinate System
//!
//! Ids are passed through verbatim, so the template must target a server
//! that uses the same inverted zoom convention as [`TileId`](crate::coord::TileId).

use super::http::HttpClient;
use super::types::{classify_response, ProviderError, TilePayload, TileSource};
use crate::coord::TileId;

/// The legacy Google Maps tile endpoint.
pub const DEFAULT_URL_TEMPLATE: &str = "http://mt.google.com/mt?x={x}&y={y}&zoom={zoom}";

/// Tile source that fetches `template`-expanded URLs over HTTP.
///
/// # Example
///
/// ```no_run
/// use tilecache::provider::{ReqwestClient, UrlTemplateSource};
///
/// let client = ReqwestClient::with_config(30, None).unwrap();
/// let source = UrlTemplateSource::new(client, "https://mt{s}.example.com/t?x={x}&y={y}&z={zoom}");
/// ```
pub struct UrlTemplateSource<C: HttpClient> {
    http_client: C,
    template: String,
}

impl<C: HttpClient> UrlTemplateSource<C> {
    pub fn new(http_client: C, template: impl Into<String>) -> Self {
        Self {
            http_client,
            template: template.into(),
        }
    }

    /// Builds the tile URL for the given id.
    fn build_url(&self, id: TileId) -> String {
        let server = (i64::from(id.x) + i64::from(id.y)).rem_euclid(4);
        self.template
            .replace("{x}", &id.x.to_string())
            .replace("{y}", &id.y.to_string())
            .replace("{zoom}", &id.zoom.to_string())
            .replace("{s}", &server.to_string())
    }
}

impl<C: HttpClient> TileSource for UrlTemplateSource<C> {
    fn fetch(&self, id: TileId) -> Result<TilePayload, ProviderError> {
        let url = self.build_url(id);
        let response = self.http_client.get(&url)?;
        classify_response(response)
    }

    fn name(&self) -> &str {
        &self.template
    }
}
