//! Typed wrappers around the native decoder contract.
//!
//! One function per native entry point. Every negative status code is
//! converted here into a [`CodecError`]; no raw status codes and no
//! engine-owned pointers escape this module except through the
//! [`ExtensionChain`] wrapper, which enforces the copy-then-release-once
//! discipline of the native extension list.

use crate::engine::{self, DecoderContext, ExtensionNode};
use crate::error::CodecError;
use crate::format::{ExtensionTag, OutputFormat};
use crate::metadata::{ExtensionRecord, ImageInfo};

/// Allocate a decoder context.
pub fn open() -> Result<Box<DecoderContext>, CodecError> {
    engine::open().ok_or(CodecError::Allocation)
}

/// Enable or disable extension retention. Must precede `decode` to have
/// any effect.
pub fn set_keep_extension_data(ctx: &mut DecoderContext, enable: bool) {
    engine::keep_extension_data(ctx, enable);
}

/// Decode a compressed container into the context.
pub fn decode(ctx: &mut DecoderContext, buf: &[u8]) -> Result<(), CodecError> {
    match engine::decode(ctx, buf) {
        engine::STATUS_OK => Ok(()),
        _ => Err(CodecError::Decode(format!(
            "malformed or truncated stream ({} bytes)",
            buf.len()
        ))),
    }
}

/// Read the structural info snapshot of the decoded image.
pub fn get_info(ctx: &DecoderContext) -> Result<ImageInfo, CodecError> {
    let mut info = ImageInfo::default();
    match engine::get_info(ctx, &mut info) {
        engine::STATUS_OK => Ok(info),
        _ => Err(CodecError::NotDecoded),
    }
}

/// Take the extension chain retained by the last decode.
///
/// The chain may be empty when retention was disabled or the container
/// carried no records; an empty chain needs no release.
pub fn get_extension_data(ctx: &mut DecoderContext) -> ExtensionChain {
    ExtensionChain::new(engine::get_extension_data(ctx))
}

/// Begin scanline output in the given format.
pub fn start(ctx: &mut DecoderContext, format: OutputFormat) -> Result<(), CodecError> {
    match engine::start(ctx, format.ordinal()) {
        engine::STATUS_OK => Ok(()),
        engine::STATUS_BAD_STATE => Err(CodecError::NotDecoded),
        _ => Err(CodecError::UnsupportedFormat),
    }
}

/// Fetch the next scanline into `buf`.
pub fn get_line(ctx: &mut DecoderContext, buf: &mut [u8]) -> Result<(), CodecError> {
    match engine::get_line(ctx, buf) {
        engine::STATUS_OK => Ok(()),
        engine::STATUS_BAD_STATE => Err(CodecError::StreamExhausted),
        _ => Err(CodecError::Decode("scanline decode failed".to_string())),
    }
}

/// Release the context. Consuming the box makes a double close
/// unrepresentable at this layer; the state tracking lives in the
/// context manager above.
pub fn close(ctx: Box<DecoderContext>) {
    engine::close(ctx);
}

/// Probe structural info (and the extension chain) from a buffer without
/// a full decode.
pub fn probe_info(buf: &[u8]) -> Result<(ImageInfo, ExtensionChain), CodecError> {
    let mut info = ImageInfo::default();
    let (status, chain) = engine::probe_info(&mut info, buf);
    match status {
        engine::STATUS_OK => Ok((info, ExtensionChain::new(chain))),
        _ => Err(CodecError::Decode(format!(
            "malformed or truncated stream ({} bytes)",
            buf.len()
        ))),
    }
}

/// A native-owned extension chain held across the binding boundary.
///
/// Records must be copied into owned [`ExtensionRecord`]s before the
/// chain is released. Releasing twice, or copying after release, fails
/// with [`CodecError::UseAfterFree`]; it never silently succeeds.
#[derive(Debug)]
pub struct ExtensionChain {
    head: Option<Box<ExtensionNode>>,
    released: bool,
}

impl ExtensionChain {
    fn new(head: Option<Box<ExtensionNode>>) -> Self {
        Self {
            head,
            released: false,
        }
    }

    /// Whether the chain holds no records. An empty chain is still
    /// subject to the use-after-free check once released.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Copy every record into caller-owned storage, preserving chain
    /// order.
    ///
    /// # Errors
    ///
    /// `UseAfterFree` if the chain was already released; `Decode` if a
    /// node carries a tag outside the contract.
    pub fn copy_records(&self) -> Result<Vec<ExtensionRecord>, CodecError> {
        if self.released {
            return Err(CodecError::UseAfterFree);
        }
        let mut records = Vec::new();
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            let tag = ExtensionTag::from_raw(current.tag)
                .ok_or_else(|| CodecError::Decode("unknown extension tag".to_string()))?;
            records.push(ExtensionRecord::new(tag, current.data.clone()));
            node = current.next.as_deref();
        }
        Ok(records)
    }

    /// Release the chain back to the engine. Exactly one release is
    /// allowed; a second call fails with `UseAfterFree`.
    pub fn free(&mut self) -> Result<(), CodecError> {
        if self.released {
            return Err(CodecError::UseAfterFree);
        }
        self.released = true;
        if let Some(head) = self.head.take() {
            engine::free_extension_chain(head);
        }
        Ok(())
    }
}

impl Drop for ExtensionChain {
    fn drop(&mut self) {
        // Safety net: a chain that was never explicitly released still
        // goes back to the engine exactly once.
        if !self.released {
            if let Some(head) = self.head.take() {
                engine::free_extension_chain(head);
            }
        }
    }
}
