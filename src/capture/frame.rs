use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::EncodeError;

/// Raw packed 8-bit, 3-channel image.
///
/// Owned by the capture step until it is handed to the encoder. `data` is
/// immutable and shared, so clones are cheap.
#[derive(Clone)]
pub struct Frame {
    pub data: Bytes,

    pub meta: Arc<FrameMetadata>,

    /// Monotonic capture (or decode, on the subscriber side) time
    pub timestamp: Instant,
}

#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub device_timestamp: Option<Duration>, // Hardware timestamp if available
}

/// Byte order of the three channels in a packed pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Formats a capture device can be asked to deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Yuyv,
    Mjpeg,
}

/// Compressed frame waiting in the delay queue.
///
/// `captured_at` never goes on the wire; only `data` does.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Bytes,
    pub sequence: u64,
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap a packed buffer, checking it holds exactly `width * height * 3` bytes.
    pub fn new(
        data: impl Into<Bytes>,
        width: u32,
        height: u32,
        order: ChannelOrder,
        sequence: u64,
        timestamp: Instant,
    ) -> Result<Self, EncodeError> {
        let data = data.into();
        let expected = packed_len(width, height);
        if data.len() != expected {
            return Err(EncodeError::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            meta: Arc::new(FrameMetadata {
                sequence,
                width,
                height,
                order,
                device_timestamp: None,
            }),
            timestamp,
        })
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.meta.width, self.meta.height)
    }

    pub fn order(&self) -> ChannelOrder {
        self.meta.order
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.meta.width as usize * 3
    }

    /// Channel values of the pixel at `(x, y)`, in this frame's channel order.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.meta.width || y >= self.meta.height {
            return None;
        }
        let at = y as usize * self.stride() + x as usize * 3;
        Some([self.data[at], self.data[at + 1], self.data[at + 2]])
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("bytes", &self.data.len())
            .field("meta", &self.meta)
            .finish()
    }
}

pub fn packed_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}
