//! Tensor to raster-image conversion for PNG export.
//!
//! PNG has no CMYK color type, so CMYK tensors are composited down to RGB
//! before writing; RGB and RGBA tensors map directly onto the matching
//! `image` buffer types at 8 or 16 bits.

use blockpix_core::{OutputFormat, PixelTensor, TensorData};
use image::{DynamicImage, ImageBuffer, Rgb, Rgba};
use thiserror::Error;

/// Failures while turning a decoded tensor into a raster image.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The tensor's buffer did not match its declared shape.
    #[error("Tensor buffer does not match its shape")]
    ShapeMismatch,
}

/// Convert a decoded pixel tensor into an `image` buffer suitable for
/// lossless PNG export.
pub fn tensor_to_image(tensor: PixelTensor) -> Result<DynamicImage, ConvertError> {
    let width = tensor.width();
    let height = tensor.height();
    let format = tensor.format();

    match (format, tensor.into_data()) {
        (OutputFormat::Rgb24, TensorData::U8(data)) => {
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data)
                .map(DynamicImage::ImageRgb8)
                .ok_or(ConvertError::ShapeMismatch)
        }
        (OutputFormat::Rgba32, TensorData::U8(data)) => {
            ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, data)
                .map(DynamicImage::ImageRgba8)
                .ok_or(ConvertError::ShapeMismatch)
        }
        (OutputFormat::Rgb48, TensorData::U16(data)) => {
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, data)
                .map(DynamicImage::ImageRgb16)
                .ok_or(ConvertError::ShapeMismatch)
        }
        (OutputFormat::Rgba64, TensorData::U16(data)) => {
            ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, data)
                .map(DynamicImage::ImageRgba16)
                .ok_or(ConvertError::ShapeMismatch)
        }
        (OutputFormat::Cmyk32, TensorData::U8(data)) => {
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, cmyk_to_rgb8(&data))
                .map(DynamicImage::ImageRgb8)
                .ok_or(ConvertError::ShapeMismatch)
        }
        (OutputFormat::Cmyk64, TensorData::U16(data)) => {
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, cmyk_to_rgb16(&data))
                .map(DynamicImage::ImageRgb16)
                .ok_or(ConvertError::ShapeMismatch)
        }
        // Bit depth and storage width are tied together by the core.
        _ => Err(ConvertError::ShapeMismatch),
    }
}

/// Composite interleaved 8-bit CMYK down to RGB.
fn cmyk_to_rgb8(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 4 * 3);
    for px in data.chunks_exact(4) {
        let k = u16::from(255 - px[3]);
        for &ink in &px[..3] {
            out.push((u16::from(255 - ink) * k / 255) as u8);
        }
    }
    out
}

/// Composite interleaved 16-bit CMYK down to RGB.
fn cmyk_to_rgb16(data: &[u16]) -> Vec<u16> {
    let mut out = Vec::with_capacity(data.len() / 4 * 3);
    for px in data.chunks_exact(4) {
        let k = u32::from(u16::MAX - px[3]);
        for &ink in &px[..3] {
            out.push((u32::from(u16::MAX - ink) * k / u32::from(u16::MAX)) as u16);
        }
    }
    out
}
