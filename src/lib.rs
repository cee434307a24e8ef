pub mod capture;
pub mod codec;
#[cfg(feature = "viewer")]
pub mod display;
pub mod error;
pub mod pipeline;
pub mod stream;
pub mod transport;
#[cfg(feature = "v4l2")]
pub mod utils;

use std::path::Path;

use capture::frame::{ChannelOrder, PixelFormat};
use serde::{Deserialize, Serialize};

pub use capture::{EncodedFrame, Frame, FrameSource};
pub use error::{ConfigError, DecodeError, DeviceError, EncodeError, ParseError, TransportError};

/// Environment variables override file values, e.g. `AVATAR_LINK__PUBLISHER__DELAY_MS=150`.
pub const ENV_PREFIX: &str = "AVATAR_LINK";

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    pub publisher: PublisherConfig,
    pub camera_stream: CameraStreamConfig,
    pub sensors: SensorBusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub device_index: u32,
    /// Overrides; `None` keeps whatever the device reports.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub format: PixelFormat,
    pub buffer_count: u32,
    /// Used when the device reports a zero frame rate.
    pub fallback_fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub endpoint: String,
    pub delay_ms: u64,
    pub jpeg_quality: u8,
    /// Frames waiting for the socket pump; beyond this they are dropped.
    pub send_queue: usize,
    pub read_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraStreamConfig {
    pub endpoint: String,
    pub flip_vertical: bool,
    pub output_order: ChannelOrder,
    /// Reported by `frame_size()` until the first frame arrives.
    pub default_width: u32,
    pub default_height: u32,
    pub recv_queue: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorBusConfig {
    pub endpoint: String,
    pub max_messages_per_poll: usize,
    pub recv_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                device_index: 0,
                width: None,
                height: None,
                fps: None,
                format: PixelFormat::Mjpeg,
                buffer_count: 4,
                fallback_fps: 30.0,
            },
            publisher: PublisherConfig {
                endpoint: "tcp://*:5555".into(),
                delay_ms: 0,
                jpeg_quality: 95,
                send_queue: 64,
                read_backoff_ms: 10,
            },
            camera_stream: CameraStreamConfig {
                endpoint: "tcp://localhost:5555".into(),
                flip_vertical: true,
                output_order: ChannelOrder::Rgb,
                default_width: 1280,
                default_height: 720,
                recv_queue: 4,
            },
            sensors: SensorBusConfig {
                endpoint: "tcp://localhost:5556".into(),
                max_messages_per_poll: 10,
                recv_queue: 256,
            },
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `AVATAR_LINK__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_wire_endpoints() {
        let config = Config::default();
        assert_eq!(config.publisher.endpoint, "tcp://*:5555");
        assert_eq!(config.camera_stream.endpoint, "tcp://localhost:5555");
        assert_eq!(config.sensors.endpoint, "tcp://localhost:5556");
        assert_eq!(config.sensors.max_messages_per_poll, 10);
        assert_eq!(config.capture.fallback_fps, 30.0);
    }
}
