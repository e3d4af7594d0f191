//! Pixel tensor output and scanline deinterleaving.
//!
//! Scanlines arrive as flat interleaved channel bytes (R,G,B,R,G,B,...).
//! The [`PlaneReconstructor`] stride-slices each row into one plane per
//! channel, then stacks the planes along a trailing axis to produce the
//! final `[height, width, channels]` tensor. This is a pure reshape; no
//! interpolation or color transform happens here.

use crate::error::CodecError;
use crate::format::OutputFormat;

/// Tensor element storage, matching the bit depth of the output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorData {
    /// 8 bits per channel.
    U8(Vec<u8>),
    /// 16 bits per channel.
    U16(Vec<u16>),
}

impl TensorData {
    /// Number of elements (channel samples).
    pub fn len(&self) -> usize {
        match self {
            TensorData::U8(v) => v.len(),
            TensorData::U16(v) => v.len(),
        }
    }

    /// Whether the storage holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, widened to `u16` for uniform inspection.
    pub fn get_widened(&self, index: usize) -> Option<u16> {
        match self {
            TensorData::U8(v) => v.get(index).map(|&x| u16::from(x)),
            TensorData::U16(v) => v.get(index).copied(),
        }
    }
}

/// A single channel's 2-D data, extracted from interleaved scanlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    /// Plane width in samples.
    pub width: u32,
    /// Plane height in samples.
    pub height: u32,
    /// Row-major samples, `width * height` elements.
    pub data: TensorData,
}

/// The decoded image as a `[height, width, channels]` tensor.
///
/// The channel axis follows the color-model order of the output format
/// (RGB[A] or CMYK); element width is 8 or 16 bits per the format's bit
/// depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelTensor {
    width: u32,
    height: u32,
    format: OutputFormat,
    data: TensorData,
}

impl PixelTensor {
    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The output format the tensor was decoded in.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Number of channels along the trailing axis.
    pub fn channels(&self) -> usize {
        self.format.channel_count()
    }

    /// Tensor shape as `[height, width, channels]`.
    pub fn shape(&self) -> [usize; 3] {
        [
            self.height as usize,
            self.width as usize,
            self.channels(),
        ]
    }

    /// Backing element storage, channel-last row-major.
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Consume the tensor and return the backing storage.
    pub fn into_data(self) -> TensorData {
        self.data
    }

    /// Element at `[y, x, c]`, widened to `u16`.
    pub fn get(&self, y: u32, x: u32, channel: usize) -> Option<u16> {
        if y >= self.height || x >= self.width || channel >= self.channels() {
            return None;
        }
        let index =
            (y as usize * self.width as usize + x as usize) * self.channels() + channel;
        self.data.get_widened(index)
    }

    /// Extract one channel as a standalone plane.
    pub fn plane(&self, channel: usize) -> Option<Plane> {
        if channel >= self.channels() {
            return None;
        }
        let stride = self.channels();
        let data = match &self.data {
            TensorData::U8(v) => {
                TensorData::U8(v.iter().skip(channel).step_by(stride).copied().collect())
            }
            TensorData::U16(v) => {
                TensorData::U16(v.iter().skip(channel).step_by(stride).copied().collect())
            }
        };
        Some(Plane {
            width: self.width,
            height: self.height,
            data,
        })
    }
}

/// Per-channel plane accumulator used while reconstructing.
#[derive(Debug)]
enum PlaneBuf {
    U8(Vec<Vec<u8>>),
    U16(Vec<Vec<u16>>),
}

/// Reassembles streamed scanlines into a [`PixelTensor`].
///
/// Feed exactly `height` rows of `width * bytes_per_pixel(format)` bytes
/// each, then call [`finish`](Self::finish). Each row is stride-sliced
/// into one sub-row per channel (stride = channel count, offset = channel
/// index); `finish` stacks the accumulated planes channel-last.
#[derive(Debug)]
pub struct PlaneReconstructor {
    width: u32,
    height: u32,
    format: OutputFormat,
    planes: PlaneBuf,
    rows: u32,
}

impl PlaneReconstructor {
    /// Create a reconstructor for the given dimensions and format.
    pub fn new(width: u32, height: u32, format: OutputFormat) -> Self {
        let channels = format.channel_count();
        let planes = if format.bit_depth() == 8 {
            PlaneBuf::U8(vec![Vec::with_capacity((width * height) as usize); channels])
        } else {
            PlaneBuf::U16(vec![Vec::with_capacity((width * height) as usize); channels])
        };
        Self {
            width,
            height,
            format,
            planes,
            rows: 0,
        }
    }

    /// Expected byte length of each pushed row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Number of rows pushed so far.
    pub fn rows_pushed(&self) -> u32 {
        self.rows
    }

    /// Deinterleave one scanline into the per-channel planes.
    ///
    /// # Errors
    ///
    /// `StreamExhausted` if more than `height` rows are pushed; `Decode`
    /// if the row length does not match the format.
    pub fn push_row(&mut self, row: &[u8]) -> Result<(), CodecError> {
        if self.rows >= self.height {
            return Err(CodecError::StreamExhausted);
        }
        if row.len() != self.row_len() {
            return Err(CodecError::Decode(format!(
                "scanline is {} bytes, expected {}",
                row.len(),
                self.row_len()
            )));
        }
        let channels = self.format.channel_count();
        match &mut self.planes {
            PlaneBuf::U8(planes) => {
                for (channel, plane) in planes.iter_mut().enumerate() {
                    plane.extend(row.iter().skip(channel).step_by(channels).copied());
                }
            }
            PlaneBuf::U16(planes) => {
                for (channel, plane) in planes.iter_mut().enumerate() {
                    plane.extend(
                        row.chunks_exact(2)
                            .skip(channel)
                            .step_by(channels)
                            .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
                    );
                }
            }
        }
        self.rows += 1;
        Ok(())
    }

    /// Stack the accumulated planes into the final tensor.
    ///
    /// # Errors
    ///
    /// `Decode` if fewer than `height` rows were pushed.
    pub fn finish(self) -> Result<PixelTensor, CodecError> {
        if self.rows != self.height {
            return Err(CodecError::Decode(format!(
                "received {} of {} scanlines",
                self.rows, self.height
            )));
        }
        let pixels = self.width as usize * self.height as usize;
        let channels = self.format.channel_count();
        let data = match self.planes {
            PlaneBuf::U8(planes) => {
                let mut out = Vec::with_capacity(pixels * channels);
                for i in 0..pixels {
                    for plane in &planes {
                        out.push(plane[i]);
                    }
                }
                TensorData::U8(out)
            }
            PlaneBuf::U16(planes) => {
                let mut out = Vec::with_capacity(pixels * channels);
                for i in 0..pixels {
                    for plane in &planes {
                        out.push(plane[i]);
                    }
                }
                TensorData::U16(out)
            }
        };
        Ok(PixelTensor {
            width: self.width,
            height: self.height,
            format: self.format,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reconstruct_rgb24() {
        let mut recon = PlaneReconstructor::new(2, 2, OutputFormat::Rgb24);
        assert_eq!(recon.row_len(), 6);

        recon.push_row(&[1, 2, 3, 4, 5, 6]).unwrap();
        recon.push_row(&[7, 8, 9, 10, 11, 12]).unwrap();
        let tensor = recon.finish().unwrap();

        assert_eq!(tensor.shape(), [2, 2, 3]);
        assert_eq!(tensor.get(0, 0, 0), Some(1));
        assert_eq!(tensor.get(0, 1, 2), Some(6));
        assert_eq!(tensor.get(1, 0, 1), Some(8));
        assert_eq!(tensor.get(1, 1, 2), Some(12));
        assert_eq!(tensor.get(2, 0, 0), None);
    }

    #[test]
    fn test_reconstruct_rgb48_little_endian() {
        let mut recon = PlaneReconstructor::new(1, 1, OutputFormat::Rgb48);
        recon
            .push_row(&[0x34, 0x12, 0x78, 0x56, 0xBC, 0x9A])
            .unwrap();
        let tensor = recon.finish().unwrap();

        assert_eq!(tensor.shape(), [1, 1, 3]);
        assert_eq!(tensor.get(0, 0, 0), Some(0x1234));
        assert_eq!(tensor.get(0, 0, 1), Some(0x5678));
        assert_eq!(tensor.get(0, 0, 2), Some(0x9ABC));
    }

    #[test]
    fn test_row_count_is_enforced() {
        let mut recon = PlaneReconstructor::new(1, 2, OutputFormat::Rgb24);
        recon.push_row(&[0, 0, 0]).unwrap();

        // Finishing early is a decode failure.
        let err = PlaneReconstructor::new(1, 2, OutputFormat::Rgb24)
            .finish()
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));

        recon.push_row(&[0, 0, 0]).unwrap();
        assert_eq!(
            recon.push_row(&[0, 0, 0]),
            Err(CodecError::StreamExhausted)
        );
        assert!(recon.finish().is_ok());
    }

    #[test]
    fn test_wrong_row_length() {
        let mut recon = PlaneReconstructor::new(2, 1, OutputFormat::Rgba32);
        let err = recon.push_row(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_plane_extraction() {
        let mut recon = PlaneReconstructor::new(2, 1, OutputFormat::Rgb24);
        recon.push_row(&[10, 20, 30, 40, 50, 60]).unwrap();
        let tensor = recon.finish().unwrap();

        let green = tensor.plane(1).unwrap();
        assert_eq!(green.data, TensorData::U8(vec![20, 50]));
        assert!(tensor.plane(3).is_none());
    }

    proptest! {
        /// Deinterleave law: tensor[y, x, c] equals the interleaved
        /// sample at row y, position x * channels + c.
        #[test]
        fn prop_deinterleave_preserves_samples(
            width in 1u32..16,
            height in 1u32..16,
            seed in any::<u64>(),
        ) {
            let format = OutputFormat::Rgba32;
            let channels = format.channel_count();
            let mut recon = PlaneReconstructor::new(width, height, format);

            let mut state = seed;
            let mut rows = Vec::new();
            for _ in 0..height {
                let row: Vec<u8> = (0..width as usize * channels)
                    .map(|_| {
                        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                        (state >> 33) as u8
                    })
                    .collect();
                recon.push_row(&row).unwrap();
                rows.push(row);
            }
            let tensor = recon.finish().unwrap();

            for y in 0..height {
                for x in 0..width {
                    for c in 0..channels {
                        let expected = rows[y as usize][x as usize * channels + c];
                        prop_assert_eq!(tensor.get(y, x, c), Some(u16::from(expected)));
                    }
                }
            }
        }
    }
}
