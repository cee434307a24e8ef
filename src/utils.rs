use tracing::{debug, info};
use v4l::{capability::Flags, video::Capture, Device, FourCC};

use crate::capture::frame::PixelFormat;

/// Detected capture device info
#[derive(Debug, Clone)]
pub struct FoundDevice {
    pub path: String,
    pub card: String,
    pub formats: Vec<PixelFormat>,
}

/// Enumerate `/dev/video0..9` capture devices and the formats we can convert.
pub fn list_capture_devices() -> Vec<FoundDevice> {
    use std::path::Path;

    let mut found = Vec::new();
    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            debug!("Cannot open {}", path);
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            continue;
        }

        let formats: Vec<PixelFormat> = dev
            .enum_formats()
            .map(|formats| {
                formats
                    .iter()
                    .filter_map(|fmt| match &fmt.fourcc {
                        f if *f == FourCC::new(b"MJPG") => Some(PixelFormat::Mjpeg),
                        f if *f == FourCC::new(b"YUYV") => Some(PixelFormat::Yuyv),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        info!("Found capture device: {} - {} {:?}", path, caps.card, formats);
        found.push(FoundDevice {
            path,
            card: caps.card,
            formats,
        });
    }

    found
}
