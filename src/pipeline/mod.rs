pub mod delay_queue;
pub mod publisher;
pub mod shutdown;

pub use delay_queue::DelayQueue;
pub use publisher::{CaptureOutcome, Publisher, PublisherStats};
pub use shutdown::ShutdownToken;
