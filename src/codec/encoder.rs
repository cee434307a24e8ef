use std::time::Instant;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;
use tracing::trace;

use super::transform::swap_red_blue;
use crate::capture::frame::{packed_len, ChannelOrder, EncodedFrame, Frame};
use crate::error::EncodeError;

/// Compresses raw frames into transport-ready buffers.
pub trait FrameEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<EncodedFrame, EncodeError>;
}

/// Baseline JPEG. BGR input is reordered so the JPEG carries true colour.
pub struct JpegEncoder {
    quality: u8,
    scratch: Vec<u8>,
}

impl JpegEncoder {
    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            scratch: Vec::new(),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(95)
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<EncodedFrame, EncodeError> {
        let (width, height) = frame.size();
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(EncodeError::Dimensions { width, height });
        }

        let expected = packed_len(width, height);
        if frame.data.len() != expected {
            return Err(EncodeError::BufferSize {
                width,
                height,
                expected,
                actual: frame.data.len(),
            });
        }

        let started = Instant::now();
        let pixels: &[u8] = match frame.order() {
            ChannelOrder::Rgb => &frame.data,
            ChannelOrder::Bgr => {
                self.scratch.clear();
                self.scratch.extend_from_slice(&frame.data);
                swap_red_blue(&mut self.scratch);
                &self.scratch
            }
        };

        let mut out = Vec::with_capacity(expected / 8);
        ImageJpegEncoder::new_with_quality(&mut out, self.quality).encode(
            pixels,
            width,
            height,
            ExtendedColorType::Rgb8,
        )?;

        let took = started.elapsed();
        metrics::histogram!("encode_time_us").record(took.as_micros() as f64);
        trace!(
            "Encoded frame {} to {} bytes in {:?}",
            frame.meta.sequence,
            out.len(),
            took
        );

        Ok(EncodedFrame {
            data: Bytes::from(out),
            sequence: frame.meta.sequence,
            captured_at: frame.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_a_jpeg_stream_with_capture_metadata() {
        let at = Instant::now();
        let frame = Frame::new(vec![128u8; 16 * 8 * 3], 16, 8, ChannelOrder::Rgb, 4, at).unwrap();

        let encoded = JpegEncoder::default().encode(&frame).unwrap();

        assert_eq!(&encoded.data[..2], &[0xFF, 0xD8]);
        assert_eq!(encoded.sequence, 4);
        assert_eq!(encoded.captured_at, at);
    }

    #[test]
    fn empty_frames_are_rejected() {
        let frame = Frame::new(Vec::new(), 0, 0, ChannelOrder::Rgb, 0, Instant::now()).unwrap();
        assert!(matches!(
            JpegEncoder::default().encode(&frame),
            Err(EncodeError::Dimensions { .. })
        ));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(JpegEncoder::new(0).quality(), 1);
        assert_eq!(JpegEncoder::new(250).quality(), 100);
    }
}
