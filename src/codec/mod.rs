//! JPEG in, JPEG out, and the pixel shuffles either side of it.

pub mod decoder;
pub mod encoder;
pub mod transform;

pub use decoder::{decode_frame, decode_jpeg, DecodeOptions, DecodedImage};
pub use encoder::{FrameEncoder, JpegEncoder};
pub use transform::{flip_vertical, swap_red_blue};
