//! Blockpix Core - block-compressed image container decoder
//!
//! This crate turns a compressed block-based image container into a
//! structured multi-channel pixel tensor. The pipeline is layered the way
//! the native contract is:
//!
//! - `engine` - the opaque codec engine behind a fixed C-style function
//!   contract (raw `i32` status codes, opaque context)
//! - `binding` - one typed wrapper per native entry point; converts
//!   negative statuses into [`CodecError`]
//! - `decoder` - the context manager owning the open/decode/stream/close
//!   lifecycle, plus the top-level [`decode_to_tensor`] / [`probe`] API
//! - `tensor` - scanline deinterleaving into a `[height, width, channels]`
//!   tensor
//!
//! Everything is synchronous; one decoder context serves one image on one
//! thread, and independent contexts can run in parallel.

pub mod binding;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod format;
pub mod metadata;
pub mod tensor;

pub use decoder::{
    decode_to_tensor, decode_to_tensor_as, probe, probe_with_extensions, Decoder,
};
pub use error::CodecError;
pub use format::{ColorSpace, ExtensionTag, OutputFormat, PixelFormat};
pub use metadata::{ExtensionRecord, ImageInfo};
pub use tensor::{PixelTensor, Plane, PlaneReconstructor, TensorData};
