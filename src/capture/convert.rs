//! Device buffer -> packed 3-channel pixels.

use crate::codec::decoder::decode_jpeg;
use crate::error::DecodeError;

use super::frame::{packed_len, ChannelOrder, PixelFormat};

/// Convert one device buffer into packed pixels plus their channel order.
pub fn to_packed(
    data: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<(Vec<u8>, ChannelOrder), DecodeError> {
    match format {
        PixelFormat::Mjpeg => {
            let image = decode_jpeg(data)?;
            if (image.width, image.height) != (width, height) {
                tracing::trace!(
                    "MJPEG frame is {}x{}, negotiated {}x{}",
                    image.width,
                    image.height,
                    width,
                    height
                );
            }
            Ok((image.pixels, ChannelOrder::Rgb))
        }
        PixelFormat::Yuyv => Ok((yuyv_to_rgb(data, width, height)?, ChannelOrder::Rgb)),
        PixelFormat::Rgb24 => Ok((exact(data, width, height)?, ChannelOrder::Rgb)),
        PixelFormat::Bgr24 => Ok((exact(data, width, height)?, ChannelOrder::Bgr)),
    }
}

fn exact(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DecodeError> {
    let expected = packed_len(width, height);
    if data.len() < expected {
        return Err(DecodeError::ShortImage {
            expected,
            actual: data.len(),
        });
    }
    Ok(data[..expected].to_vec())
}

/// YUYV 4:2:2 to RGB24 using BT.601 studio-swing coefficients.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DecodeError> {
    if width % 2 != 0 {
        return Err(DecodeError::UnsupportedFormat(format!(
            "YUYV with odd width {width}"
        )));
    }

    let expected = width as usize * height as usize * 2;
    if data.len() < expected {
        return Err(DecodeError::ShortImage {
            expected,
            actual: data.len(),
        });
    }

    let mut rgb = Vec::with_capacity(packed_len(width, height));
    for chunk in data[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_pixel(y0, u, v));
        rgb.extend_from_slice(&yuv_pixel(y1, u, v));
    }
    Ok(rgb)
}

#[inline]
fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}
