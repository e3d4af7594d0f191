//! Reference implementation of the native decoder contract.
//!
//! This module plays the role of the opaque codec engine: an opaque
//! context type plus one free function per contract entry point, each
//! returning a raw `i32` status code (`0` success, negative failure).
//! Nothing above this boundary inspects container bytes, and nothing in
//! here knows about the typed error taxonomy; the binding layer owns the
//! translation in both directions.

pub mod container;

use crate::metadata::ImageInfo;

/// Operation completed.
pub const STATUS_OK: i32 = 0;
/// The compressed stream is malformed, corrupt, or truncated, or a
/// supplied buffer has the wrong size.
pub const STATUS_BAD_STREAM: i32 = -1;
/// The operation is not valid in the context's current state
/// (info before decode, line before start, line past the last row).
pub const STATUS_BAD_STATE: i32 = -2;
/// The requested output format ordinal is unknown or incompatible with
/// the decoded image.
pub const STATUS_BAD_FORMAT: i32 = -3;

/// Opaque decoder context. All fields are private; callers interact with
/// it exclusively through the free functions below.
#[derive(Debug, Default)]
pub struct DecoderContext {
    keep_extension_data: bool,
    image: Option<container::Container>,
    extensions: Option<Box<ExtensionNode>>,
    stream: Option<StreamState>,
}

#[derive(Debug)]
struct StreamState {
    format_ordinal: i32,
    next_row: u32,
}

/// One node of the engine-owned extension chain.
///
/// The chain mirrors the native singly-linked layout: a raw tag byte, the
/// payload, and an owning `next` link. Callers must copy what they need
/// and release the whole chain exactly once.
#[derive(Debug)]
pub struct ExtensionNode {
    /// Raw tag byte as stored in the container.
    pub tag: u8,
    /// Payload bytes.
    pub data: Vec<u8>,
    /// Next record, or `None` at the chain terminator.
    pub next: Option<Box<ExtensionNode>>,
}

impl Drop for ExtensionNode {
    fn drop(&mut self) {
        // Unlink iteratively so a long chain cannot overflow the stack
        // through recursive Box drops.
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

fn build_chain(records: &[(u8, Vec<u8>)]) -> Option<Box<ExtensionNode>> {
    let mut head = None;
    for (tag, data) in records.iter().rev() {
        head = Some(Box::new(ExtensionNode {
            tag: *tag,
            data: data.clone(),
            next: head,
        }));
    }
    head
}

/// Allocate a fresh decoder context.
///
/// Returns `None` when allocation fails.
pub fn open() -> Option<Box<DecoderContext>> {
    Some(Box::default())
}

/// Enable or disable retention of extension records across `decode`.
///
/// Must be called before `decode` to have any effect, matching the native
/// contract.
pub fn keep_extension_data(ctx: &mut DecoderContext, enable: bool) {
    ctx.keep_extension_data = enable;
}

/// Decode a compressed container into the context.
///
/// On failure the context keeps its previous (undecoded) state.
pub fn decode(ctx: &mut DecoderContext, buf: &[u8]) -> i32 {
    let parsed = match container::parse(buf) {
        Ok(parsed) => parsed,
        Err(_) => return STATUS_BAD_STREAM,
    };
    ctx.extensions = if ctx.keep_extension_data {
        build_chain(&parsed.extensions)
    } else {
        None
    };
    ctx.image = Some(parsed);
    ctx.stream = None;
    STATUS_OK
}

/// Take the extension chain retained by the last decode.
///
/// Ownership transfers to the caller, who must release the chain via
/// [`free_extension_chain`]. Returns `None` when retention was disabled
/// or the container carried no records.
pub fn get_extension_data(ctx: &mut DecoderContext) -> Option<Box<ExtensionNode>> {
    ctx.extensions.take()
}

/// Fill `out` with the structural info of the decoded image.
pub fn get_info(ctx: &DecoderContext, out: &mut ImageInfo) -> i32 {
    match &ctx.image {
        Some(image) => {
            *out = image.info;
            STATUS_OK
        }
        None => STATUS_BAD_STATE,
    }
}

/// Begin scanline output in the requested format.
///
/// Valid only once per decode, after a successful `decode`. Rejects
/// unknown ordinals and formats incompatible with the image (CMYK
/// layouts require a W plane and vice versa).
pub fn start(ctx: &mut DecoderContext, format_ordinal: i32) -> i32 {
    let image = match &ctx.image {
        Some(image) => image,
        None => return STATUS_BAD_STATE,
    };
    if ctx.stream.is_some() {
        return STATUS_BAD_STATE;
    }
    let format = match crate::format::OutputFormat::from_ordinal(format_ordinal) {
        Some(format) => format,
        None => return STATUS_BAD_FORMAT,
    };
    if format.is_cmyk() != image.info.has_w_plane {
        return STATUS_BAD_FORMAT;
    }
    ctx.stream = Some(StreamState {
        format_ordinal,
        next_row: 0,
    });
    STATUS_OK
}

/// Produce the next scanline into `out`.
///
/// `out` must be exactly `width * bytes_per_pixel(format)` bytes. Rows
/// come back strictly top to bottom; after `height` successful calls the
/// stream is exhausted.
pub fn get_line(ctx: &mut DecoderContext, out: &mut [u8]) -> i32 {
    let image = match &ctx.image {
        Some(image) => image,
        None => return STATUS_BAD_STATE,
    };
    let stream = match &mut ctx.stream {
        Some(stream) => stream,
        None => return STATUS_BAD_STATE,
    };
    if stream.next_row >= image.info.height {
        return STATUS_BAD_STATE;
    }
    // The ordinal was validated by start().
    let format = match crate::format::OutputFormat::from_ordinal(stream.format_ordinal) {
        Some(format) => format,
        None => return STATUS_BAD_FORMAT,
    };
    if out.len() != image.info.width as usize * format.bytes_per_pixel() {
        return STATUS_BAD_STREAM;
    }
    convert_row(image, stream.next_row, format, out);
    stream.next_row += 1;
    STATUS_OK
}

/// Release the context. Consumes the box, so a second close of the same
/// handle is unrepresentable at this layer.
pub fn close(ctx: Box<DecoderContext>) {
    drop(ctx);
}

/// Release an extension chain obtained from [`get_extension_data`] or
/// [`probe_info`].
pub fn free_extension_chain(head: Box<ExtensionNode>) {
    drop(head);
}

/// Read structural info and the extension chain from a buffer without a
/// full decode. The payload section is never touched.
pub fn probe_info(out: &mut ImageInfo, buf: &[u8]) -> (i32, Option<Box<ExtensionNode>>) {
    match container::parse_header(buf) {
        Ok(header) => {
            *out = header.info;
            (STATUS_OK, build_chain(&header.extensions))
        }
        Err(_) => (STATUS_BAD_STREAM, None),
    }
}

/// Convert one row of native samples into the requested interleaved
/// output layout.
///
/// Native samples are RGB[A] or CMYK at the container's bit depth;
/// widening multiplies by 257, narrowing keeps the high byte, and a
/// missing alpha channel is synthesized fully opaque. 16-bit output is
/// written little-endian.
fn convert_row(
    image: &container::Container,
    row: u32,
    format: crate::format::OutputFormat,
    out: &mut [u8],
) {
    let info = &image.info;
    let width = info.width as usize;
    let src_channels = info.native_channel_count();
    let src_wide = info.bit_depth == 16;
    let src_sample = if src_wide { 2 } else { 1 };
    let row_base = row as usize * width * src_channels * src_sample;

    let dst_channels = format.channel_count();
    let dst_wide = format.bit_depth() == 16;

    let read_sample = |pixel: usize, channel: usize| -> u16 {
        let at = row_base + (pixel * src_channels + channel) * src_sample;
        if src_wide {
            u16::from_le_bytes([image.samples[at], image.samples[at + 1]])
        } else {
            u16::from(image.samples[at])
        }
    };

    let mut write = 0usize;
    for pixel in 0..width {
        for channel in 0..dst_channels {
            // Channel 3 of an RGBA request may not exist natively.
            let value = if channel < src_channels {
                let v = read_sample(pixel, channel);
                match (src_wide, dst_wide) {
                    (false, true) => v * 257,
                    (true, false) => v >> 8,
                    _ => v,
                }
            } else if dst_wide {
                u16::MAX
            } else {
                u16::from(u8::MAX)
            };
            if dst_wide {
                out[write..write + 2].copy_from_slice(&value.to_le_bytes());
                write += 2;
            } else {
                out[write] = value as u8;
                write += 1;
            }
        }
    }
}
