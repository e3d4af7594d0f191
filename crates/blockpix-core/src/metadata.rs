//! Image metadata types: the structural info snapshot and owned copies of
//! auxiliary extension records.

use serde::{Deserialize, Serialize};

use crate::format::{ColorSpace, ExtensionTag, PixelFormat};

/// Structural metadata of a compressed image.
///
/// Produced once by `get_info` (after decode) or `probe` (header-only) and
/// immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Chroma layout of the compressed data.
    pub format: PixelFormat,
    /// Whether an alpha channel is present.
    pub has_alpha: bool,
    /// Color space tag.
    pub color_space: ColorSpace,
    /// Bits per channel sample (8 or 16).
    pub bit_depth: u8,
    /// Whether alpha is premultiplied into the color channels.
    pub premultiplied_alpha: bool,
    /// Whether a W plane is present (CMYK-coded image).
    pub has_w_plane: bool,
    /// Whether sample values use limited (video) range.
    pub limited_range: bool,
    /// Whether the container holds an animation.
    pub has_animation: bool,
    /// Animation loop count (0 = infinite).
    pub loop_count: u16,
}

impl ImageInfo {
    /// Total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Number of channels stored natively in the container:
    /// 4 for CMYK-coded images, otherwise 3 plus an optional alpha.
    pub fn native_channel_count(&self) -> usize {
        if self.has_w_plane {
            4
        } else if self.has_alpha {
            4
        } else {
            3
        }
    }
}

/// An auxiliary metadata record, copied out of the native-owned chain into
/// caller-owned storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    /// What kind of payload this record carries.
    pub tag: ExtensionTag,
    /// The raw payload bytes, uninterpreted.
    pub data: Vec<u8>,
}

impl ExtensionRecord {
    /// Create a record from a tag and an owned payload.
    pub fn new(tag: ExtensionTag, data: Vec<u8>) -> Self {
        Self { tag, data }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
