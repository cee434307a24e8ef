//! Error taxonomy for the frame transport pipeline.
//!
//! Only [`DeviceError`] and [`ConfigError`] are meant to reach a process
//! boundary. Everything else is recovered inside the component that raised it.

use thiserror::Error;

/// Capture device could not be acquired. Fatal at startup.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("capture device {0} not found")]
    NotFound(String),

    #[error("capture device {device} does not support {what}")]
    Unsupported { device: String, what: String },

    #[error("capture backend unavailable: {0}")]
    Unavailable(String),

    #[error("device i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// A single frame could not be compressed. The frame is dropped.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("cannot encode a {width}x{height} frame as jpeg")]
    Dimensions { width: u32, height: u32 },

    #[error("jpeg encoder: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// A received buffer was not a decodable image. The previous frame is kept.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("jpeg decoder: {0}")]
    Jpeg(String),

    #[error("decoder produced no image header")]
    MissingHeader,

    #[error("decoded {actual} bytes, expected {expected}")]
    ShortImage { expected: usize, actual: usize },

    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(String),
}

/// A sensor message was not a JSON object.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is not utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload is not json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is json but not an object")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket: {0}")]
    Socket(#[from] zeromq::ZmqError),

    #[error("send queue full, message dropped")]
    QueueFull,

    #[error("transport closed")]
    Closed,

    #[error("no tokio runtime available to drive the socket")]
    NoRuntime,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration: {0}")]
    Load(#[from] config::ConfigError),
}
