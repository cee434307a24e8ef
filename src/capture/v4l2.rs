//! V4L2 camera source

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::convert::to_packed;
use crate::capture::frame::{Frame, PixelFormat};
use crate::capture::{effective_fps, FrameSource, SourceInfo};
use crate::error::DeviceError;
use crate::CaptureConfig;

/// Any V4L2 capture device, resolution and rate queried from the hardware.
pub struct GenericCamera {
    // Declared before `device` so buffers are unmapped before the handle closes
    stream: MmapStream<'static>,
    _device: Box<Device>,
    path: String,
    format: PixelFormat,
    info: SourceInfo,
    sequence: u64,
}

impl GenericCamera {
    /// Open `/dev/video{device_index}`.
    pub fn open(config: &CaptureConfig) -> Result<Self, DeviceError> {
        Self::open_path(&format!("/dev/video{}", config.device_index), config)
    }

    #[instrument(skip(config))]
    pub fn open_path(path: &str, config: &CaptureConfig) -> Result<Self, DeviceError> {
        let device = Device::with_path(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DeviceError::NotFound(path.to_string()),
            _ => DeviceError::Io(e),
        })?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(DeviceError::Unsupported {
                device: path.to_string(),
                what: "video capture".into(),
            });
        }

        // Only override what was asked for; otherwise keep the device defaults
        let mut fmt = device.format()?;
        if let Some(width) = config.width {
            fmt.width = width;
        }
        if let Some(height) = config.height {
            fmt.height = height;
        }
        fmt.fourcc = fourcc(config.format);

        let fmt = device.set_format(&fmt)?;
        let format = from_fourcc(fmt.fourcc).ok_or_else(|| DeviceError::Unsupported {
            device: path.to_string(),
            what: format!("negotiated fourcc {}", fmt.fourcc),
        })?;

        if let Some(fps) = config.fps {
            if let Err(e) = device.set_params(&Parameters::with_fps(fps)) {
                warn!("Could not set {} fps on {}: {}", fps, path, e);
            }
        }

        let reported = device
            .params()
            .map(|p| {
                if p.interval.numerator == 0 {
                    0.0
                } else {
                    p.interval.denominator as f64 / p.interval.numerator as f64
                }
            })
            .unwrap_or(0.0);
        let fps = effective_fps(reported, config.fallback_fps);

        let device = Box::new(device);
        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, config.buffer_count)?;
        info!(
            "Capture stream started with {} buffers, {}x{} {:?} @ {:.1} fps",
            config.buffer_count, fmt.width, fmt.height, format, fps
        );

        Ok(Self {
            stream,
            _device: device,
            path: path.to_string(),
            format,
            info: SourceInfo {
                width: fmt.width,
                height: fmt.height,
                fps,
                description: format!("{} {}x{}@{:.1}", path, fmt.width, fmt.height, fps),
            },
            sequence: 0,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FrameSource for GenericCamera {
    fn read(&mut self) -> Option<Frame> {
        let timestamp = Instant::now();

        let (buf, meta) = match self.stream.next() {
            Ok(next) => next,
            Err(e) => {
                debug!("Dequeue failed on {}: {}", self.path, e);
                return None;
            }
        };

        let (pixels, order) = match to_packed(buf, self.format, self.info.width, self.info.height)
        {
            Ok(converted) => converted,
            Err(e) => {
                debug!("Dropping unreadable buffer from {}: {}", self.path, e);
                return None;
            }
        };

        self.sequence += 1;
        let mut frame = match Frame::new(
            pixels,
            self.info.width,
            self.info.height,
            order,
            self.sequence,
            timestamp,
        ) {
            Ok(frame) => frame,
            Err(e) => {
                // MJPEG frames carry their own size, which can disagree with the negotiated one
                debug!("Dropping frame from {}: {}", self.path, e);
                return None;
            }
        };
        if let Some(frame_meta) = Arc::get_mut(&mut frame.meta) {
            frame_meta.device_timestamp = Some(
                Duration::from_secs(meta.timestamp.sec.max(0) as u64)
                    + Duration::from_micros(meta.timestamp.usec.max(0) as u64),
            );
        }
        Some(frame)
    }

    fn info(&self) -> &SourceInfo {
        &self.info
    }
}

impl Drop for GenericCamera {
    fn drop(&mut self) {
        info!("Releasing capture device {}", self.path);
    }
}

fn fourcc(format: PixelFormat) -> FourCC {
    match format {
        PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
        PixelFormat::Yuyv => FourCC::new(b"YUYV"),
        PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
        PixelFormat::Bgr24 => FourCC::new(b"BGR3"),
    }
}

fn from_fourcc(fourcc: FourCC) -> Option<PixelFormat> {
    match &fourcc.repr {
        b"MJPG" => Some(PixelFormat::Mjpeg),
        b"YUYV" => Some(PixelFormat::Yuyv),
        b"RGB3" => Some(PixelFormat::Rgb24),
        b"BGR3" => Some(PixelFormat::Bgr24),
        _ => None,
    }
}
