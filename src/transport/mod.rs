//! Publish/subscribe plumbing.
//!
//! The pipeline never touches sockets directly: the publisher writes into a
//! [`FrameSink`] and the subscribers read from a [`MessageSource`]. Both are
//! non-blocking. The socket implementations in [`zmq`] move messages between
//! a bounded channel and the network on a tokio task; plain `flume` channel
//! ends implement the same traits for in-process use and tests.

pub mod zmq;

use bytes::Bytes;
use flume::{TryRecvError, TrySendError};

use crate::error::TransportError;

pub use zmq::{Subscription, ZmqPublisher};

/// Where released frames go. One call, one message.
pub trait FrameSink {
    /// Queue `payload` for delivery without waiting.
    fn send(&mut self, payload: Bytes) -> Result<(), TransportError>;

    /// Stop delivering. Anything not yet written is dropped.
    fn close(&mut self) {}
}

/// A single non-blocking receive attempt per call.
pub trait MessageSource {
    /// `None` means nothing is queued right now; it is not an error.
    fn try_recv(&mut self) -> Option<Bytes>;

    /// Stop receiving. Unread messages are dropped.
    fn close(&mut self) {}
}

impl FrameSink for flume::Sender<Bytes> {
    fn send(&mut self, payload: Bytes) -> Result<(), TransportError> {
        self.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Disconnected(_) => TransportError::Closed,
        })
    }
}

impl MessageSource for flume::Receiver<Bytes> {
    fn try_recv(&mut self) -> Option<Bytes> {
        match flume::Receiver::try_recv(self) {
            Ok(payload) => Some(payload),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}
