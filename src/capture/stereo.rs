//! Stereo rig source.
//!
//! UVC stereo cameras (ZED and friends) enumerate as a plain V4L2 device that
//! delivers both eyes side by side in one YUYV image. The rig source opens
//! that device and hands out the left half only; no depth is computed.

use std::sync::Arc;

use bytes::Bytes;

use super::frame::{Frame, FrameMetadata};

/// Result of looking for a stereo rig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available { path: String, card: String },
    Unavailable(String),
}

/// Left half of a side-by-side stereo frame.
pub fn crop_left_eye(frame: &Frame) -> Frame {
    let eye_width = frame.width() / 2;
    let row = frame.stride();
    let eye_row = eye_width as usize * 3;
    if row == 0 {
        return frame.clone();
    }

    let mut data = Vec::with_capacity(eye_row * frame.height() as usize);
    for line in frame.data.chunks_exact(row) {
        data.extend_from_slice(&line[..eye_row]);
    }

    Frame {
        data: Bytes::from(data),
        meta: Arc::new(FrameMetadata {
            width: eye_width,
            ..(*frame.meta).clone()
        }),
        timestamp: frame.timestamp,
    }
}

#[cfg(feature = "stereo-rig")]
mod device {
    use tracing::info;

    use super::{crop_left_eye, Availability};
    use crate::capture::frame::{Frame, PixelFormat};
    use crate::capture::v4l2::GenericCamera;
    use crate::capture::{FrameSource, SourceInfo};
    use crate::error::DeviceError;
    use crate::utils::list_capture_devices;
    use crate::CaptureConfig;

    /// Look for a capture device whose card name identifies a stereo camera.
    pub fn probe() -> Availability {
        let found = list_capture_devices()
            .into_iter()
            .find(|d| d.card.to_ascii_lowercase().contains("zed"));

        match found {
            Some(d) => Availability::Available {
                path: d.path,
                card: d.card,
            },
            None => Availability::Unavailable("no stereo camera found".into()),
        }
    }

    pub struct StereoRig {
        camera: GenericCamera,
        info: SourceInfo,
    }

    impl StereoRig {
        pub fn open(config: &CaptureConfig) -> Result<Self, DeviceError> {
            let (path, card) = match probe() {
                Availability::Available { path, card } => (path, card),
                Availability::Unavailable(reason) => return Err(DeviceError::Unavailable(reason)),
            };
            info!("Using stereo rig {} at {}", card, path);

            // Side-by-side output is only offered uncompressed
            let mut config = config.clone();
            config.format = PixelFormat::Yuyv;
            if let Some(width) = config.width.as_mut() {
                *width *= 2;
            }

            let camera = GenericCamera::open_path(&path, &config)?;
            let full = camera.info();
            let info = SourceInfo {
                width: full.width / 2,
                height: full.height,
                fps: full.fps,
                description: format!(
                    "{} left eye {}x{}@{:.1}",
                    card,
                    full.width / 2,
                    full.height,
                    full.fps
                ),
            };

            Ok(Self { camera, info })
        }
    }

    impl FrameSource for StereoRig {
        fn read(&mut self) -> Option<Frame> {
            self.camera.read().map(|frame| crop_left_eye(&frame))
        }

        fn info(&self) -> &SourceInfo {
            &self.info
        }
    }
}

#[cfg(feature = "stereo-rig")]
pub use device::{probe, StereoRig};

#[cfg(not(feature = "stereo-rig"))]
pub fn probe() -> Availability {
    Availability::Unavailable("built without the `stereo-rig` feature".into())
}
