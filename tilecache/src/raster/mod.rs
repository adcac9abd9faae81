//! Decoded tile rasters and the placeholder tile.
//!
//! Decoding PNG data is expensive, so the cache keeps decoded [`TileImage`]s
//! rather than raw bytes. Images are shared through an `Arc`; handing one to
//! the renderer is a pointer copy.
//!
//! # Placeholder
//!
//! A single black tile is generated on first access and shared for the
//! lifetime of the process. It is returned whenever real data is unavailable:
//! the id is out of range, the fetch is still pending, the upstream has no
//! tile, or the fetch failed.

use std::fmt;
use std::sync::{Arc, OnceLock};

use image::{Rgba, RgbaImage};

/// Edge length of a tile in pixels.
pub const TILE_SIZE_PIXELS: u32 = 256;

/// Static placeholder - generated once, shared by every caller.
static PLACEHOLDER: OnceLock<TileImage> = OnceLock::new();

/// A decoded RGBA tile, cheap to clone.
#[derive(Clone)]
pub struct TileImage {
    pixels: Arc<RgbaImage>,
}

impl TileImage {
    /// Wraps an already decoded image.
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Returns the shared placeholder tile.
    pub fn placeholder() -> TileImage {
        PLACEHOLDER
            .get_or_init(|| {
                TileImage::new(RgbaImage::from_pixel(
                    TILE_SIZE_PIXELS,
                    TILE_SIZE_PIXELS,
                    Rgba([0, 0, 0, 255]),
                ))
            })
            .clone()
    }

    /// True if this is the shared placeholder instance.
    pub fn is_placeholder(&self) -> bool {
        self.ptr_eq(&Self::placeholder())
    }

    /// True if both handles point at the same decoded image.
    pub fn ptr_eq(&self, other: &TileImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// The decoded pixels.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

impl fmt::Debug for TileImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("placeholder", &self.is_placeholder())
            .finish()
    }
}

/// Decodes raw tile bytes (PNG, JPEG, ...) into a [`TileImage`].
///
/// The format is sniffed from the data, not taken from any content type.
pub fn decode_tile(data: &[u8]) -> Result<TileImage, image::ImageError> {
    let decoded = image::load_from_memory(data)?;
    Ok(TileImage::new(decoded.to_rgba8()))
}
