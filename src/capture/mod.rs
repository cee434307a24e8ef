pub mod convert;
pub mod frame;
pub mod pattern;
pub mod stereo;
#[cfg(feature = "v4l2")]
pub mod v4l2;

use std::fmt;

use clap::ValueEnum;
use tracing::info;

use crate::error::DeviceError;
use crate::CaptureConfig;

pub use frame::{ChannelOrder, EncodedFrame, Frame, PixelFormat};
pub use pattern::TestPattern;
pub use stereo::{crop_left_eye, Availability};
#[cfg(feature = "stereo-rig")]
pub use stereo::StereoRig;
#[cfg(feature = "v4l2")]
pub use v4l2::GenericCamera;

/// What an opened source actually delivers.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub description: String,
}

/// A capture device producing raw frames at its own rate.
pub trait FrameSource {
    /// Next frame, or `None` when nothing could be read this call.
    ///
    /// `None` is transient: the caller backs off briefly and tries again.
    fn read(&mut self) -> Option<Frame>;

    fn info(&self) -> &SourceInfo;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read(&mut self) -> Option<Frame> {
        (**self).read()
    }

    fn info(&self) -> &SourceInfo {
        (**self).info()
    }
}

/// Source selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceMode {
    /// Any V4L2 camera
    #[value(alias = "cv")]
    Camera,
    /// UVC stereo camera, left eye only
    #[value(alias = "zed")]
    Stereo,
    /// Synthetic moving gradient
    Pattern,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::Camera => f.write_str("camera"),
            SourceMode::Stereo => f.write_str("stereo"),
            SourceMode::Pattern => f.write_str("pattern"),
        }
    }
}

pub type BoxedSource = Box<dyn FrameSource + Send>;

/// Open the source for `mode`. Failure here is fatal for the publisher.
pub fn open_source(mode: SourceMode, config: &CaptureConfig) -> Result<BoxedSource, DeviceError> {
    let source: BoxedSource = match mode {
        SourceMode::Camera => open_camera(config)?,
        SourceMode::Stereo => open_stereo(config)?,
        SourceMode::Pattern => Box::new(TestPattern::from_config(config)),
    };

    info!("Opened {} source: {}", mode, source.info().description);
    Ok(source)
}

#[cfg(feature = "v4l2")]
fn open_camera(config: &CaptureConfig) -> Result<BoxedSource, DeviceError> {
    Ok(Box::new(GenericCamera::open(config)?))
}

#[cfg(not(feature = "v4l2"))]
fn open_camera(_config: &CaptureConfig) -> Result<BoxedSource, DeviceError> {
    Err(DeviceError::Unavailable(
        "built without the `v4l2` feature".into(),
    ))
}

#[cfg(feature = "stereo-rig")]
fn open_stereo(config: &CaptureConfig) -> Result<BoxedSource, DeviceError> {
    Ok(Box::new(StereoRig::open(config)?))
}

#[cfg(not(feature = "stereo-rig"))]
fn open_stereo(_config: &CaptureConfig) -> Result<BoxedSource, DeviceError> {
    match stereo::probe() {
        Availability::Unavailable(reason) => Err(DeviceError::Unavailable(reason)),
        Availability::Available { path, .. } => Err(DeviceError::Unavailable(format!(
            "stereo rig at {path} needs the `stereo-rig` feature"
        ))),
    }
}

/// Rate reported by a device, with the configured fallback for "unknown".
pub(crate) fn effective_fps(reported: f64, fallback: f64) -> f64 {
    if reported > 1e-3 {
        reported
    } else {
        fallback
    }
}
