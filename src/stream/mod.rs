//! Subscriber side: what the external renderer polls each tick.

pub mod camera;
pub mod latest;
pub mod sensor;

pub use camera::CameraStream;
pub use latest::LatestFrame;
pub use sensor::{encode_sensor_message, parse_sensor_message, SensorBus, UNKNOWN_TOPIC};
