use std::time::Instant;

use zune_jpeg::JpegDecoder;

use super::transform::{flip_vertical, swap_red_blue};
use crate::capture::frame::{packed_len, ChannelOrder, Frame};
use crate::error::DecodeError;
use crate::CameraStreamConfig;

/// Decoded JPEG, packed RGB.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Orientation and byte order agreed with the producer out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub flip_vertical: bool,
    pub output_order: ChannelOrder,
}

impl From<&CameraStreamConfig> for DecodeOptions {
    fn from(config: &CameraStreamConfig) -> Self {
        Self {
            flip_vertical: config.flip_vertical,
            output_order: config.output_order,
        }
    }
}

pub fn decode_jpeg(data: &[u8]) -> Result<DecodedImage, DecodeError> {
    let mut decoder = JpegDecoder::new(data);
    let pixels = decoder
        .decode()
        .map_err(|e| DecodeError::Jpeg(e.to_string()))?;
    let (width, height) = decoder.dimensions().ok_or(DecodeError::MissingHeader)?;
    let (width, height) = (width as u32, height as u32);

    let expected = packed_len(width, height);
    let pixels = if pixels.len() == expected {
        pixels
    } else if pixels.len() == expected / 3 {
        // Greyscale stream
        pixels.iter().flat_map(|&l| [l, l, l]).collect()
    } else {
        return Err(DecodeError::ShortImage {
            expected,
            actual: pixels.len(),
        });
    };

    Ok(DecodedImage {
        pixels,
        width,
        height,
    })
}

/// Decode a received buffer into a presentable frame.
pub fn decode_frame(
    data: &[u8],
    options: DecodeOptions,
    sequence: u64,
) -> Result<Frame, DecodeError> {
    let DecodedImage {
        mut pixels,
        width,
        height,
    } = decode_jpeg(data)?;

    if options.flip_vertical {
        flip_vertical(&mut pixels, width as usize * 3);
    }
    if options.output_order == ChannelOrder::Bgr {
        swap_red_blue(&mut pixels);
    }

    let actual = pixels.len();
    Frame::new(
        pixels,
        width,
        height,
        options.output_order,
        sequence,
        Instant::now(),
    )
    .map_err(|_| DecodeError::ShortImage {
        expected: packed_len(width, height),
        actual,
    })
}
