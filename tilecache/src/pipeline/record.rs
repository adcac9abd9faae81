//! Fetch outcomes.

use crate::provider::{ProviderError, TilePayload};

/// Result of one fetch attempt.
///
/// The three variants are deliberately distinct: `Empty` is a confirmed
/// answer that is cached (as the placeholder) while `Unavailable` is a
/// transient failure that is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileRecord {
    /// Raw image bytes
    Data(Vec<u8>),
    /// The upstream confirmed there is no tile
    Empty,
    /// No result (timeout, connection error, unexpected status)
    Unavailable,
}

impl From<Result<TilePayload, ProviderError>> for TileRecord {
    fn from(result: Result<TilePayload, ProviderError>) -> Self {
        match result {
            Ok(TilePayload::Image(data)) if !data.is_empty() => TileRecord::Data(data),
            Ok(TilePayload::Image(_)) | Ok(TilePayload::Missing) => TileRecord::Empty,
            Err(_) => TileRecord::Unavailable,
        }
    }
}
