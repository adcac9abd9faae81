//! Upstream tile sources.
//!
//! A [`TileSource`] performs exactly one blocking fetch per tile id and
//! reports one of three outcomes: an image payload, a confirmed-missing tile
//! (the upstream answered but has no image), or an error. Fetch workers turn
//! those into [`TileRecord`](crate::pipeline::TileRecord)s.
//!
//! The transport sits behind [`HttpClient`] so sources can be tested without
//! a network:
//!
//! ```ignore
//! use tilecache::provider::{ReqwestClient, UrlTemplateSource, DEFAULT_URL_TEMPLATE};
//!
//! let client = ReqwestClient::with_config(30, None)?;
//! let source = UrlTemplateSource::new(client, DEFAULT_URL_TEMPLATE);
//! let payload = source.fetch(TileId::new(1, 2, 15))?;
//! ```

mod http;
mod template;
mod types;

pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use template::{UrlTemplateSource, DEFAULT_URL_TEMPLATE};
pub use types::{classify_response, ProviderError, TilePayload, TileSource};

#[cfg(test)]
pub use http::tests::MockHttpClient;
