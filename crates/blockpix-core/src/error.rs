//! Error taxonomy for the decode pipeline.
//!
//! Every negative status code coming back from the native-style engine is
//! converted at the binding boundary into exactly one of these variants;
//! none are swallowed.

use thiserror::Error;

/// Errors produced by the decoder pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Allocating a decoder context failed.
    #[error("Failed to allocate a decoder context")]
    Allocation,

    /// The compressed stream is malformed, corrupt, or truncated.
    /// Zero-length input lands here as well.
    #[error("Could not decode image: {0}")]
    Decode(String),

    /// The requested output format is not valid for this image
    /// (e.g. a CMYK format for an image without a W plane).
    #[error("Requested output format is not supported for this image")]
    UnsupportedFormat,

    /// An operation that requires a decoded image was issued before a
    /// successful decode.
    #[error("Image not decoded yet")]
    NotDecoded,

    /// `next_line` was called more than `height` times, or before the
    /// scanline stream was started.
    #[error("Scanline stream exhausted or not started")]
    StreamExhausted,

    /// An operation was issued on a context that has already been closed.
    #[error("Decoder context used after close")]
    UseAfterClose,

    /// The extension chain was accessed or released after it had already
    /// been released.
    #[error("Extension chain used after release")]
    UseAfterFree,
}
