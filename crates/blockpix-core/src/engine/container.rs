//! The block-compressed container format understood by the engine.
//!
//! Layout (little-endian throughout):
//!
//! ```text
//! magic      4 bytes  "BLK1"
//! width      u32      nonzero, at most 65535
//! height     u32      nonzero, at most 65535
//! pixel_fmt  u8       chroma layout ordinal
//! flags      u8       bit0 alpha, bit1 premultiplied, bit2 w_plane,
//!                     bit3 limited_range, bit4 animation
//! color_spc  u8       color space ordinal
//! bit_depth  u8       8 or 16
//! loop_count u16
//! ext_count  u8       then per record: tag u8, len u32, payload
//! method     u8       0 raw, 1 run-length
//! payload    u32 len, then bytes; decompresses to exactly
//!            width * height * channels * bit_depth/8 sample bytes
//! ```
//!
//! Native channel count is 4 when the W-plane flag is set (CMYK), else
//! 3 plus an optional alpha channel. 16-bit samples are little-endian.
//!
//! The module also carries a reference encoder so the engine can be
//! exercised without external fixture files.

use thiserror::Error;

use crate::format::{ColorSpace, PixelFormat};
use crate::metadata::{ExtensionRecord, ImageInfo};

/// Container magic bytes.
pub const MAGIC: [u8; 4] = *b"BLK1";

/// Maximum width/height accepted by the parser.
pub const MAX_DIMENSION: u32 = 65_535;

const FLAG_ALPHA: u8 = 1 << 0;
const FLAG_PREMULTIPLIED: u8 = 1 << 1;
const FLAG_W_PLANE: u8 = 1 << 2;
const FLAG_LIMITED_RANGE: u8 = 1 << 3;
const FLAG_ANIMATION: u8 = 1 << 4;
const FLAG_KNOWN_MASK: u8 =
    FLAG_ALPHA | FLAG_PREMULTIPLIED | FLAG_W_PLANE | FLAG_LIMITED_RANGE | FLAG_ANIMATION;

/// Payload compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    /// Samples stored verbatim.
    Raw = 0,
    /// PackBits-style run-length coding.
    Rle = 1,
}

/// Parse failures, internal to the engine. The binding layer only ever
/// sees these flattened into a negative status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ParseError {
    #[error("truncated container")]
    Truncated,
    #[error("bad magic")]
    BadMagic,
    #[error("invalid header field: {0}")]
    BadHeader(&'static str),
    #[error("payload does not match image dimensions")]
    BadPayload,
}

/// A fully parsed container.
#[derive(Debug, Clone)]
pub(crate) struct Container {
    pub info: ImageInfo,
    /// Raw extension records as (tag byte, payload) pairs.
    pub extensions: Vec<(u8, Vec<u8>)>,
    /// Interleaved native samples, decompressed.
    pub samples: Vec<u8>,
}

/// Header-only view: everything except the decompressed payload.
#[derive(Debug, Clone)]
pub(crate) struct Header {
    pub info: ImageInfo,
    pub extensions: Vec<(u8, Vec<u8>)>,
    /// Byte offset where the payload section starts.
    payload_offset: usize,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self.pos.checked_add(n).ok_or(ParseError::Truncated)?;
        if end > self.buf.len() {
            return Err(ParseError::Truncated);
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16, ParseError> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32_le(&mut self) -> Result<u32, ParseError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Parse the header and extension records without touching the payload.
pub(crate) fn parse_header(buf: &[u8]) -> Result<Header, ParseError> {
    let mut r = Reader::new(buf);

    if r.bytes(4)? != MAGIC {
        return Err(ParseError::BadMagic);
    }

    let width = r.u32_le()?;
    let height = r.u32_le()?;
    if width == 0 || height == 0 {
        return Err(ParseError::BadHeader("zero dimension"));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ParseError::BadHeader("dimension too large"));
    }

    let format =
        PixelFormat::from_raw(r.u8()?).ok_or(ParseError::BadHeader("pixel format"))?;
    let flags = r.u8()?;
    if flags & !FLAG_KNOWN_MASK != 0 {
        return Err(ParseError::BadHeader("unknown flag bits"));
    }
    let color_space =
        ColorSpace::from_raw(r.u8()?).ok_or(ParseError::BadHeader("color space"))?;
    let bit_depth = r.u8()?;
    if bit_depth != 8 && bit_depth != 16 {
        return Err(ParseError::BadHeader("bit depth"));
    }
    let loop_count = r.u16_le()?;

    let info = ImageInfo {
        width,
        height,
        format,
        has_alpha: flags & FLAG_ALPHA != 0,
        color_space,
        bit_depth,
        premultiplied_alpha: flags & FLAG_PREMULTIPLIED != 0,
        has_w_plane: flags & FLAG_W_PLANE != 0,
        limited_range: flags & FLAG_LIMITED_RANGE != 0,
        has_animation: flags & FLAG_ANIMATION != 0,
        loop_count,
    };

    // An alpha channel inside a CMYK coding is not representable.
    if info.has_w_plane && info.has_alpha {
        return Err(ParseError::BadHeader("alpha with W plane"));
    }

    let ext_count = r.u8()?;
    let mut extensions = Vec::with_capacity(ext_count as usize);
    for _ in 0..ext_count {
        let tag = r.u8()?;
        if !(1..=5).contains(&tag) {
            return Err(ParseError::BadHeader("extension tag"));
        }
        let len = r.u32_le()? as usize;
        let data = r.bytes(len)?.to_vec();
        extensions.push((tag, data));
    }

    Ok(Header {
        info,
        extensions,
        payload_offset: r.pos,
    })
}

/// Parse a complete container, decompressing the sample payload.
pub(crate) fn parse(buf: &[u8]) -> Result<Container, ParseError> {
    let header = parse_header(buf)?;
    let mut r = Reader::new(buf);
    r.bytes(header.payload_offset)?;

    let method = match r.u8()? {
        0 => Compression::Raw,
        1 => Compression::Rle,
        _ => return Err(ParseError::BadHeader("compression method")),
    };
    let payload_len = r.u32_le()? as usize;
    let payload = r.bytes(payload_len)?;
    if r.pos != buf.len() {
        return Err(ParseError::BadPayload);
    }

    let expected = sample_byte_len(&header.info).ok_or(ParseError::BadPayload)?;
    let samples = match method {
        Compression::Raw => {
            if payload.len() != expected {
                return Err(ParseError::BadPayload);
            }
            payload.to_vec()
        }
        Compression::Rle => rle_decompress(payload, expected)?,
    };

    Ok(Container {
        info: header.info,
        extensions: header.extensions,
        samples,
    })
}

/// Exact decompressed sample byte length implied by the header, or `None`
/// if the product overflows.
pub(crate) fn sample_byte_len(info: &ImageInfo) -> Option<usize> {
    let per_pixel = info.native_channel_count() * (info.bit_depth / 8) as usize;
    (info.width as usize)
        .checked_mul(info.height as usize)?
        .checked_mul(per_pixel)
}

/// Decompress a PackBits-style run-length stream into exactly
/// `expected_len` bytes.
///
/// Token layout: a control byte `c < 0x80` is followed by `c + 1` literal
/// bytes; `c >= 0x80` is followed by one byte repeated `(c & 0x7f) + 2`
/// times.
pub(crate) fn rle_decompress(payload: &[u8], expected_len: usize) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::with_capacity(expected_len);
    let mut r = Reader::new(payload);
    while out.len() < expected_len {
        let control = r.u8()?;
        if control < 0x80 {
            let literal = r.bytes(control as usize + 1)?;
            out.extend_from_slice(literal);
        } else {
            let run = (control & 0x7f) as usize + 2;
            let value = r.u8()?;
            out.resize(out.len() + run, value);
        }
    }
    if out.len() != expected_len || r.pos != payload.len() {
        return Err(ParseError::BadPayload);
    }
    Ok(out)
}

/// Run-length compress a sample buffer with the token layout accepted by
/// [`rle_decompress`].
pub(crate) fn rle_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        // Measure the run starting here.
        let mut run = 1;
        while i + run < data.len() && data[i + run] == data[i] && run < 129 {
            run += 1;
        }
        if run >= 3 {
            out.push(0x80 | (run as u8 - 2));
            out.push(data[i]);
            i += run;
            continue;
        }
        // Collect a literal segment up to the next worthwhile run.
        let start = i;
        while i < data.len() && i - start < 128 {
            let mut ahead = 1;
            while i + ahead < data.len() && data[i + ahead] == data[i] && ahead < 3 {
                ahead += 1;
            }
            if ahead >= 3 {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&data[start..i]);
    }
    out
}

/// Build a container from structural info, interleaved native samples, and
/// extension records.
///
/// This is the reference encoder used to produce fixtures and round-trip
/// inputs; sample data must already match the layout the header describes.
pub fn encode(
    info: &ImageInfo,
    samples: &[u8],
    extensions: &[ExtensionRecord],
    method: Compression,
) -> Vec<u8> {
    debug_assert_eq!(
        Some(samples.len()),
        sample_byte_len(info),
        "sample buffer does not match header dimensions"
    );

    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&info.width.to_le_bytes());
    out.extend_from_slice(&info.height.to_le_bytes());
    out.push(info.format as u8);

    let mut flags = 0u8;
    if info.has_alpha {
        flags |= FLAG_ALPHA;
    }
    if info.premultiplied_alpha {
        flags |= FLAG_PREMULTIPLIED;
    }
    if info.has_w_plane {
        flags |= FLAG_W_PLANE;
    }
    if info.limited_range {
        flags |= FLAG_LIMITED_RANGE;
    }
    if info.has_animation {
        flags |= FLAG_ANIMATION;
    }
    out.push(flags);

    out.push(info.color_space as u8);
    out.push(info.bit_depth);
    out.extend_from_slice(&info.loop_count.to_le_bytes());

    out.push(extensions.len() as u8);
    for record in extensions {
        out.push(record.tag as u8);
        out.extend_from_slice(&(record.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&record.data);
    }

    out.push(method as u8);
    let payload = match method {
        Compression::Raw => samples.to_vec(),
        Compression::Rle => rle_compress(samples),
    };
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
    out
}
