//! Decoder context manager and the top-level decode pipeline.
//!
//! [`Decoder`] owns the opaque native context through its full lifecycle:
//!
//! ```text
//! open -> Created --decode--> Decoded --start--> Streaming --close--> Closed
//!                 (failure keeps Created; close is reachable from any state)
//! ```
//!
//! The handle obtained from `open` is released on every exit path: either
//! by an explicit [`close`](Decoder::close) or by the `Drop` impl, so an
//! early `?` return can never leak a native context.

use crate::binding;
use crate::engine::DecoderContext;
use crate::error::CodecError;
use crate::format::OutputFormat;
use crate::metadata::{ExtensionRecord, ImageInfo};
use crate::tensor::{PixelTensor, PlaneReconstructor};

/// Lifecycle state of a decoder context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Decoded,
    Streaming,
    Closed,
}

/// An owned decoder context with an explicit open/decode/stream/close
/// lifecycle.
///
/// Every operation takes `&mut self`, so exclusive use of a context is
/// enforced by the borrow checker. Independent decoders share no state;
/// callers may run one decoder per image in parallel.
#[derive(Debug)]
pub struct Decoder {
    ctx: Option<Box<DecoderContext>>,
    state: State,
}

impl Decoder {
    /// Allocate a fresh decoder context in the `Created` state.
    pub fn open() -> Result<Self, CodecError> {
        let ctx = binding::open()?;
        Ok(Self {
            ctx: Some(ctx),
            state: State::Created,
        })
    }

    /// Enable retention of extension records across the next decode.
    ///
    /// Has no effect on an already-decoded image, matching the native
    /// contract.
    pub fn keep_extension_data(&mut self, enable: bool) -> Result<(), CodecError> {
        let ctx = self.ctx_mut()?;
        binding::set_keep_extension_data(ctx, enable);
        Ok(())
    }

    /// Decode a compressed container. `Created -> Decoded` on success;
    /// a failed decode leaves the state at `Created` (the caller must
    /// still close, which `Drop` guarantees).
    pub fn decode(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.ensure_open()?;
        if self.state != State::Created {
            return Err(CodecError::Decode(
                "context already holds a decoded image".to_string(),
            ));
        }
        let ctx = self.ctx_mut()?;
        binding::decode(ctx, bytes)?;
        self.state = State::Decoded;
        Ok(())
    }

    /// The structural info snapshot of the decoded image.
    pub fn info(&self) -> Result<ImageInfo, CodecError> {
        match self.state {
            State::Closed => Err(CodecError::UseAfterClose),
            State::Created => Err(CodecError::NotDecoded),
            State::Decoded | State::Streaming => {
                let ctx = self.ctx.as_deref().ok_or(CodecError::UseAfterClose)?;
                binding::get_info(ctx)
            }
        }
    }

    /// Copy all retained extension records into owned storage and release
    /// the native chain.
    ///
    /// Returns an empty vector when retention was not enabled before the
    /// decode or the container carried no records. The native chain is
    /// released exactly once, immediately after the copy.
    pub fn take_extensions(&mut self) -> Result<Vec<ExtensionRecord>, CodecError> {
        if self.state == State::Created {
            return Err(CodecError::NotDecoded);
        }
        let ctx = self.ctx_mut()?;
        let mut chain = binding::get_extension_data(ctx);
        let records = chain.copy_records()?;
        chain.free()?;
        Ok(records)
    }

    /// Begin scanline streaming. `Decoded -> Streaming` only.
    pub fn start(&mut self, format: OutputFormat) -> Result<(), CodecError> {
        self.ensure_open()?;
        if self.state != State::Decoded {
            return Err(CodecError::NotDecoded);
        }
        let ctx = self.ctx_mut()?;
        binding::start(ctx, format)?;
        self.state = State::Streaming;
        Ok(())
    }

    /// Fetch the next scanline. Valid only while `Streaming`, at most
    /// `height` times, strictly top to bottom.
    pub fn next_line(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        self.ensure_open()?;
        if self.state != State::Streaming {
            return Err(CodecError::StreamExhausted);
        }
        let ctx = self.ctx_mut()?;
        binding::get_line(ctx, buf)
    }

    /// Release the native context. Reachable from any state; terminal.
    /// A second close fails with `UseAfterClose` rather than releasing
    /// twice.
    pub fn close(&mut self) -> Result<(), CodecError> {
        match self.ctx.take() {
            Some(ctx) => {
                binding::close(ctx);
                self.state = State::Closed;
                Ok(())
            }
            None => Err(CodecError::UseAfterClose),
        }
    }

    fn ensure_open(&self) -> Result<(), CodecError> {
        if self.ctx.is_none() {
            return Err(CodecError::UseAfterClose);
        }
        Ok(())
    }

    fn ctx_mut(&mut self) -> Result<&mut DecoderContext, CodecError> {
        self.ctx.as_deref_mut().ok_or(CodecError::UseAfterClose)
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        // Guaranteed release on every exit path; a no-op after an
        // explicit close.
        if let Some(ctx) = self.ctx.take() {
            binding::close(ctx);
        }
    }
}

/// Decode a compressed container into a pixel tensor, picking the natural
/// output format for the image (see [`OutputFormat::for_info`]).
pub fn decode_to_tensor(bytes: &[u8]) -> Result<PixelTensor, CodecError> {
    let mut decoder = Decoder::open()?;
    decoder.decode(bytes)?;
    let info = decoder.info()?;
    let format = OutputFormat::for_info(&info);
    stream_tensor(&mut decoder, &info, format)
}

/// Decode a compressed container into a pixel tensor in an explicit
/// output format.
pub fn decode_to_tensor_as(
    bytes: &[u8],
    format: OutputFormat,
) -> Result<PixelTensor, CodecError> {
    let mut decoder = Decoder::open()?;
    decoder.decode(bytes)?;
    let info = decoder.info()?;
    stream_tensor(&mut decoder, &info, format)
}

/// Drive the scanline stream through the plane reconstructor.
///
/// The scanline buffer is sized once from the shared bytes-per-pixel
/// function and reused for every row.
fn stream_tensor(
    decoder: &mut Decoder,
    info: &ImageInfo,
    format: OutputFormat,
) -> Result<PixelTensor, CodecError> {
    decoder.start(format)?;
    let mut reconstructor = PlaneReconstructor::new(info.width, info.height, format);
    let mut line = vec![0u8; reconstructor.row_len()];
    for _ in 0..info.height {
        decoder.next_line(&mut line)?;
        reconstructor.push_row(&line)?;
    }
    reconstructor.finish()
}

/// Read structural info from a buffer without a full decode.
///
/// Useful for fast rejection before committing to the pixel path; the
/// reported dimensions are identical to what a full decode would see.
pub fn probe(bytes: &[u8]) -> Result<ImageInfo, CodecError> {
    let (info, mut chain) = binding::probe_info(bytes)?;
    chain.free()?;
    Ok(info)
}

/// Read structural info and owned copies of all extension records from a
/// buffer without a full decode.
pub fn probe_with_extensions(
    bytes: &[u8],
) -> Result<(ImageInfo, Vec<ExtensionRecord>), CodecError> {
    let (info, mut chain) = binding::probe_info(bytes)?;
    let records = chain.copy_records()?;
    chain.free()?;
    Ok((info, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::container::{self, Compression};
    use crate::format::{ColorSpace, ExtensionTag, PixelFormat};

    fn solid_container(
        width: u32,
        height: u32,
        rgb: [u8; 3],
        extensions: &[ExtensionRecord],
    ) -> Vec<u8> {
        let info = ImageInfo {
            width,
            height,
            bit_depth: 8,
            color_space: ColorSpace::Rgb,
            format: PixelFormat::Chroma444,
            ..Default::default()
        };
        let mut samples = Vec::new();
        for _ in 0..width * height {
            samples.extend_from_slice(&rgb);
        }
        container::encode(&info, &samples, extensions, Compression::Rle)
    }

    #[test]
    fn test_solid_color_decodes_exactly() {
        let buf = solid_container(4, 4, [200, 100, 50], &[]);
        let tensor = decode_to_tensor(&buf).unwrap();

        assert_eq!(tensor.shape(), [4, 4, 3]);
        assert_eq!(tensor.format(), OutputFormat::Rgb24);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(tensor.get(y, x, 0), Some(200));
                assert_eq!(tensor.get(y, x, 1), Some(100));
                assert_eq!(tensor.get(y, x, 2), Some(50));
            }
        }
    }

    #[test]
    fn test_explicit_format_overrides_natural() {
        let buf = solid_container(2, 2, [10, 20, 30], &[]);
        let tensor = decode_to_tensor_as(&buf, OutputFormat::Rgba64).unwrap();

        assert_eq!(tensor.shape(), [2, 2, 4]);
        // 8-bit samples widen by 257; synthesized alpha is fully opaque.
        assert_eq!(tensor.get(0, 0, 0), Some(10 * 257));
        assert_eq!(tensor.get(0, 0, 3), Some(u16::MAX));
    }

    #[test]
    fn test_zero_length_input_is_a_decode_error() {
        let err = decode_to_tensor(&[]).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_probe_matches_full_decode() {
        let buf = solid_container(7, 3, [1, 2, 3], &[]);
        let info = probe(&buf).unwrap();
        let tensor = decode_to_tensor(&buf).unwrap();
        assert_eq!(
            [info.height as usize, info.width as usize],
            [tensor.shape()[0], tensor.shape()[1]]
        );
    }

    #[test]
    fn test_state_machine_ordering() {
        let buf = solid_container(2, 2, [0, 0, 0], &[]);
        let mut decoder = Decoder::open().unwrap();

        // Info and start before decode.
        assert_eq!(decoder.info(), Err(CodecError::NotDecoded));
        assert_eq!(
            decoder.start(OutputFormat::Rgb24),
            Err(CodecError::NotDecoded)
        );

        // Line before start.
        decoder.decode(&buf).unwrap();
        let mut line = vec![0u8; 6];
        assert_eq!(
            decoder.next_line(&mut line),
            Err(CodecError::StreamExhausted)
        );

        decoder.start(OutputFormat::Rgb24).unwrap();
        // start is exactly-once.
        assert_eq!(
            decoder.start(OutputFormat::Rgb24),
            Err(CodecError::NotDecoded)
        );

        decoder.next_line(&mut line).unwrap();
        decoder.next_line(&mut line).unwrap();
        assert_eq!(
            decoder.next_line(&mut line),
            Err(CodecError::StreamExhausted)
        );

        decoder.close().unwrap();
    }

    #[test]
    fn test_failed_decode_leaves_context_usable() {
        let mut decoder = Decoder::open().unwrap();
        assert!(decoder.decode(b"not a container").is_err());

        // Still Created: a valid decode afterwards succeeds.
        let buf = solid_container(1, 1, [5, 6, 7], &[]);
        decoder.decode(&buf).unwrap();
        assert_eq!(decoder.info().unwrap().width, 1);
    }

    #[test]
    fn test_use_after_close() {
        let buf = solid_container(1, 1, [0, 0, 0], &[]);
        let mut decoder = Decoder::open().unwrap();
        decoder.decode(&buf).unwrap();
        decoder.close().unwrap();

        assert_eq!(decoder.close(), Err(CodecError::UseAfterClose));
        assert_eq!(decoder.info(), Err(CodecError::UseAfterClose));
        assert_eq!(decoder.decode(&buf), Err(CodecError::UseAfterClose));
        assert_eq!(
            decoder.start(OutputFormat::Rgb24),
            Err(CodecError::UseAfterClose)
        );
        let mut line = vec![0u8; 3];
        assert_eq!(
            decoder.next_line(&mut line),
            Err(CodecError::UseAfterClose)
        );
        assert_eq!(decoder.take_extensions(), Err(CodecError::UseAfterClose));
    }

    #[test]
    fn test_close_from_created_state() {
        let mut decoder = Decoder::open().unwrap();
        decoder.close().unwrap();
        assert_eq!(decoder.info(), Err(CodecError::UseAfterClose));
    }

    #[test]
    fn test_drop_releases_without_explicit_close() {
        let buf = solid_container(2, 2, [0, 0, 0], &[]);
        let mut decoder = Decoder::open().unwrap();
        decoder.decode(&buf).unwrap();
        drop(decoder);
    }

    #[test]
    fn test_extension_retention_round_trip() {
        let records = vec![
            ExtensionRecord::new(ExtensionTag::Exif, vec![0xE0; 4]),
            ExtensionRecord::new(ExtensionTag::Iccp, vec![0x1C; 8]),
        ];
        let buf = solid_container(1, 1, [9, 9, 9], &records);

        let mut decoder = Decoder::open().unwrap();
        decoder.keep_extension_data(true).unwrap();
        decoder.decode(&buf).unwrap();
        assert_eq!(decoder.take_extensions().unwrap(), records);

        // The chain was released with the first take; nothing remains.
        assert!(decoder.take_extensions().unwrap().is_empty());
    }

    #[test]
    fn test_extensions_not_retained_by_default() {
        let records = vec![ExtensionRecord::new(ExtensionTag::Xmp, vec![1, 2])];
        let buf = solid_container(1, 1, [0, 0, 0], &records);

        let mut decoder = Decoder::open().unwrap();
        decoder.decode(&buf).unwrap();
        assert!(decoder.take_extensions().unwrap().is_empty());
    }

    #[test]
    fn test_probe_with_extensions_needs_no_retention_flag() {
        let records = vec![ExtensionRecord::new(ExtensionTag::Thumbnail, vec![3; 6])];
        let buf = solid_container(2, 1, [1, 1, 1], &records);

        let (info, copied) = probe_with_extensions(&buf).unwrap();
        assert_eq!((info.width, info.height), (2, 1));
        assert_eq!(copied, records);
    }

    #[test]
    fn test_16_bit_image_streams_as_rgb48() {
        let info = ImageInfo {
            width: 2,
            height: 1,
            bit_depth: 16,
            color_space: ColorSpace::Rgb,
            format: PixelFormat::Chroma444,
            ..Default::default()
        };
        // Two pixels, LE u16 samples.
        let samples = [
            0x00, 0x10, 0x00, 0x20, 0x00, 0x30, // pixel 0
            0xFF, 0xFF, 0x00, 0x00, 0x01, 0x00, // pixel 1
        ];
        let buf = container::encode(&info, &samples, &[], Compression::Raw);

        let tensor = decode_to_tensor(&buf).unwrap();
        assert_eq!(tensor.format(), OutputFormat::Rgb48);
        assert_eq!(tensor.get(0, 0, 0), Some(0x1000));
        assert_eq!(tensor.get(0, 1, 0), Some(0xFFFF));
        assert_eq!(tensor.get(0, 1, 2), Some(0x0001));
    }
}
