//! Synthetic source for running the pipeline without hardware.

use std::time::Instant;

use super::frame::{packed_len, ChannelOrder, Frame};
use super::{effective_fps, FrameSource, SourceInfo};
use crate::CaptureConfig;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

/// Diagonal gradient that scrolls one pixel per frame, BGR like most cameras.
pub struct TestPattern {
    info: SourceInfo,
    sequence: u64,
}

impl TestPattern {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            info: SourceInfo {
                width,
                height,
                fps,
                description: format!("test pattern {width}x{height}@{fps:.1}"),
            },
            sequence: 0,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.width.unwrap_or(DEFAULT_WIDTH),
            config.height.unwrap_or(DEFAULT_HEIGHT),
            effective_fps(config.fps.map(f64::from).unwrap_or(0.0), config.fallback_fps),
        )
    }

    fn render(&self) -> Vec<u8> {
        let (width, height) = (self.info.width, self.info.height);
        let (w, h) = (width.max(1), height.max(1));
        let shift = (self.sequence % w as u64) as u32;
        let mut data = Vec::with_capacity(packed_len(width, height));
        for y in 0..height {
            for x in 0..width {
                let b = ((x + shift) % w * 255 / w) as u8;
                let g = (y * 255 / h) as u8;
                let r = ((x + y + shift) % 256) as u8;
                data.extend_from_slice(&[b, g, r]);
            }
        }
        data
    }
}

impl FrameSource for TestPattern {
    fn read(&mut self) -> Option<Frame> {
        let data = self.render();
        self.sequence += 1;
        Frame::new(
            data,
            self.info.width,
            self.info.height,
            ChannelOrder::Bgr,
            self.sequence,
            Instant::now(),
        )
        .ok()
    }

    fn info(&self) -> &SourceInfo {
        &self.info
    }
}
