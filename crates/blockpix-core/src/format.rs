//! Closed enumerations tied to the native decoder contract.
//!
//! Every enum here mirrors a sequential integer enumeration in the native
//! contract, so discriminants are written out explicitly and must never be
//! reordered. Conversions from raw ordinals are fallible and reject unknown
//! values instead of defaulting.

use serde::{Deserialize, Serialize};

use crate::metadata::ImageInfo;

/// Interleaved output layout and bit depth for decoded scanlines.
///
/// Ordinal values are pinned to the native `start()` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OutputFormat {
    /// 8-bit RGB, 3 bytes per pixel.
    Rgb24 = 0,
    /// 8-bit RGBA, 4 bytes per pixel.
    Rgba32 = 1,
    /// 16-bit RGB, 6 bytes per pixel.
    Rgb48 = 2,
    /// 16-bit RGBA, 8 bytes per pixel.
    Rgba64 = 3,
    /// 8-bit CMYK, 4 bytes per pixel.
    Cmyk32 = 4,
    /// 16-bit CMYK, 8 bytes per pixel.
    Cmyk64 = 5,
}

impl OutputFormat {
    /// Convert a native format ordinal into a typed format.
    ///
    /// Returns `None` for ordinals outside the contract.
    pub fn from_ordinal(value: i32) -> Option<Self> {
        match value {
            0 => Some(OutputFormat::Rgb24),
            1 => Some(OutputFormat::Rgba32),
            2 => Some(OutputFormat::Rgb48),
            3 => Some(OutputFormat::Rgba64),
            4 => Some(OutputFormat::Cmyk32),
            5 => Some(OutputFormat::Cmyk64),
            _ => None,
        }
    }

    /// The ordinal value passed across the native boundary.
    #[inline]
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Number of interleaved channels per pixel.
    #[inline]
    pub fn channel_count(self) -> usize {
        match self {
            OutputFormat::Rgb24 | OutputFormat::Rgb48 => 3,
            OutputFormat::Rgba32
            | OutputFormat::Rgba64
            | OutputFormat::Cmyk32
            | OutputFormat::Cmyk64 => 4,
        }
    }

    /// Bits per channel (8 or 16).
    #[inline]
    pub fn bit_depth(self) -> u8 {
        match self {
            OutputFormat::Rgb24 | OutputFormat::Rgba32 | OutputFormat::Cmyk32 => 8,
            OutputFormat::Rgb48 | OutputFormat::Rgba64 | OutputFormat::Cmyk64 => 16,
        }
    }

    /// Bytes per channel sample (1 or 2).
    #[inline]
    pub fn bytes_per_sample(self) -> usize {
        (self.bit_depth() / 8) as usize
    }

    /// Bytes per interleaved pixel.
    ///
    /// This is the single sizing function used for every scanline buffer
    /// and tensor allocation; both the streamer and the reconstructor go
    /// through it so their sizes can never disagree.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        self.channel_count() * self.bytes_per_sample()
    }

    /// Whether the format carries an alpha channel.
    #[inline]
    pub fn has_alpha(self) -> bool {
        matches!(self, OutputFormat::Rgba32 | OutputFormat::Rgba64)
    }

    /// Whether the format is a CMYK layout.
    #[inline]
    pub fn is_cmyk(self) -> bool {
        matches!(self, OutputFormat::Cmyk32 | OutputFormat::Cmyk64)
    }

    /// Pick the natural output format for an image: CMYK when the image
    /// carries a W plane, RGBA when it has alpha, RGB otherwise, widened
    /// to 16 bits when the source depth exceeds 8.
    pub fn for_info(info: &ImageInfo) -> Self {
        let wide = info.bit_depth > 8;
        if info.has_w_plane {
            if wide {
                OutputFormat::Cmyk64
            } else {
                OutputFormat::Cmyk32
            }
        } else if info.has_alpha {
            if wide {
                OutputFormat::Rgba64
            } else {
                OutputFormat::Rgba32
            }
        } else if wide {
            OutputFormat::Rgb48
        } else {
            OutputFormat::Rgb24
        }
    }
}

/// Chroma layout of the compressed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PixelFormat {
    /// Single luma plane.
    #[default]
    Gray = 0,
    /// 4:2:0 chroma subsampling.
    Chroma420 = 1,
    /// 4:2:2 chroma subsampling.
    Chroma422 = 2,
    /// Full-resolution chroma.
    Chroma444 = 3,
    /// 4:2:0 with video-range chroma siting.
    Chroma420Video = 4,
    /// 4:2:2 with video-range chroma siting.
    Chroma422Video = 5,
}

impl PixelFormat {
    /// Convert a raw header value, rejecting unknown layouts.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(PixelFormat::Gray),
            1 => Some(PixelFormat::Chroma420),
            2 => Some(PixelFormat::Chroma422),
            3 => Some(PixelFormat::Chroma444),
            4 => Some(PixelFormat::Chroma420Video),
            5 => Some(PixelFormat::Chroma422Video),
            _ => None,
        }
    }
}

/// Color space tag of the compressed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColorSpace {
    /// ITU-R BT.601 YCbCr.
    #[default]
    YCbCr = 0,
    /// Direct RGB.
    Rgb = 1,
    /// YCgCo.
    YCgCo = 2,
    /// ITU-R BT.709 YCbCr.
    YCbCrBt709 = 3,
    /// ITU-R BT.2020 YCbCr.
    YCbCrBt2020 = 4,
}

impl ColorSpace {
    /// Convert a raw header value, rejecting unknown color spaces.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(ColorSpace::YCbCr),
            1 => Some(ColorSpace::Rgb),
            2 => Some(ColorSpace::YCgCo),
            3 => Some(ColorSpace::YCbCrBt709),
            4 => Some(ColorSpace::YCbCrBt2020),
            _ => None,
        }
    }
}

/// Tag of an auxiliary extension record.
///
/// Tag numbering starts at 1 in the native contract; 0 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExtensionTag {
    /// EXIF metadata blob.
    Exif = 1,
    /// Embedded ICC color profile.
    Iccp = 2,
    /// XMP metadata blob.
    Xmp = 3,
    /// Embedded thumbnail image.
    Thumbnail = 4,
    /// Animation control data.
    AnimControl = 5,
}

impl ExtensionTag {
    /// Convert a raw tag byte, rejecting unknown tags.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            1 => Some(ExtensionTag::Exif),
            2 => Some(ExtensionTag::Iccp),
            3 => Some(ExtensionTag::Xmp),
            4 => Some(ExtensionTag::Thumbnail),
            5 => Some(ExtensionTag::AnimControl),
            _ => None,
        }
    }
}
