//! Decoded asset representation and the two-stage decode path.
//!
//! Catalog assets are usually GIFs but the service also serves stills, so
//! decoding tries the animated codec first and falls back to the general
//! still-image decoder on the same byte buffer.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frame};

use crate::error::FetchError;

/// Decoded image data held by the cache.
pub enum AssetImage {
    /// Full frame set of an animated image.
    Animated(Vec<Frame>),
    /// Single still image.
    Still(DynamicImage),
}

// Manual impl because `image::Frame` has no `Debug`; frame contents are
// summarized as a count.
impl std::fmt::Debug for AssetImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Animated(frames) => f
                .debug_tuple("Animated")
                .field(&format_args!("<{} frames>", frames.len()))
                .finish(),
            Self::Still(image) => f.debug_tuple("Still").field(image).finish(),
        }
    }
}

/// A decoded asset plus its cache accounting cost.
#[derive(Debug)]
pub struct Asset {
    pub image: AssetImage,
    pub content_type: String,
    /// Memory footprint of the decoded representation in bytes. This is the
    /// cache's cost unit; the compressed transfer size is irrelevant here.
    pub byte_cost: usize,
}

impl Asset {
    /// Decode raw bytes into a displayable asset.
    ///
    /// Tries the GIF codec first so animated assets keep their frames; any
    /// decode error there drops to `image::load_from_memory` on the same
    /// buffer. Only when both decoders reject the bytes is this a
    /// [`FetchError::Decode`].
    pub fn decode(bytes: &[u8], content_type: &str) -> Result<Self, FetchError> {
        match decode_animated(bytes) {
            Ok(frames) => {
                let byte_cost = frames
                    .iter()
                    .map(|frame| frame.buffer().as_raw().len())
                    .sum();
                Ok(Self {
                    image: AssetImage::Animated(frames),
                    content_type: content_type.to_string(),
                    byte_cost,
                })
            }
            Err(gif_err) => {
                log::debug!("animated decode failed, trying still decoder: {gif_err}");
                let still = image::load_from_memory(bytes)
                    .map_err(|e| FetchError::Decode(e.to_string()))?;
                let byte_cost = still.as_bytes().len();
                Ok(Self {
                    image: AssetImage::Still(still),
                    content_type: content_type.to_string(),
                    byte_cost,
                })
            }
        }
    }
}

fn decode_animated(bytes: &[u8]) -> image::ImageResult<Vec<Frame>> {
    let decoder = GifDecoder::new(Cursor::new(bytes))?;
    decoder.into_frames().collect_frames()
}
