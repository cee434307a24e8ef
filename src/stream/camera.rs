//! Non-blocking camera feed consumer.

use std::sync::Arc;

use tracing::{debug, trace};

use super::latest::LatestFrame;
use crate::capture::frame::Frame;
use crate::codec::{decode_frame, DecodeOptions};
use crate::error::TransportError;
use crate::transport::{MessageSource, Subscription};
use crate::CameraStreamConfig;

/// Receives compressed frames and keeps only the most recent decoded one.
///
/// Meant to be polled once per render tick. `poll` makes exactly one receive
/// attempt and never waits for the network.
pub struct CameraStream<R = Subscription> {
    source: R,
    latest: Arc<LatestFrame>,
    options: DecodeOptions,
    default_size: (u32, u32),
    decoded: u64,
}

impl CameraStream<Subscription> {
    /// Subscribe to `config.endpoint`. Must be called inside a tokio runtime.
    pub fn connect(config: &CameraStreamConfig) -> Result<Self, TransportError> {
        let subscription = Subscription::connect(&config.endpoint, config.recv_queue)?;
        Ok(Self::new(subscription, config))
    }
}

impl<R: MessageSource> CameraStream<R> {
    pub fn new(source: R, config: &CameraStreamConfig) -> Self {
        Self {
            source,
            latest: Arc::new(LatestFrame::new()),
            options: DecodeOptions::from(config),
            default_size: (config.default_width, config.default_height),
            decoded: 0,
        }
    }

    /// Try to receive and decode one frame. `true` if the latest frame changed.
    ///
    /// A buffer that fails to decode is discarded and the previous frame stays.
    pub fn poll(&mut self) -> bool {
        let Some(payload) = self.source.try_recv() else {
            return false;
        };

        match decode_frame(&payload, self.options, self.decoded + 1) {
            Ok(frame) => {
                self.decoded += 1;
                trace!("Decoded frame {}x{}", frame.width(), frame.height());
                self.latest.store(frame);
                true
            }
            Err(e) => {
                metrics::counter!("decode_failures").increment(1);
                debug!("Discarding undecodable frame ({} bytes): {}", payload.len(), e);
                false
            }
        }
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.latest.load()
    }

    /// Size of the latest frame, or the configured default before the first one.
    pub fn frame_size(&self) -> (u32, u32) {
        self.latest
            .load()
            .map(|frame| frame.size())
            .unwrap_or(self.default_size)
    }

    /// Height over width.
    pub fn aspect(&self) -> f32 {
        let (width, height) = self.frame_size();
        if width == 0 {
            9.0 / 16.0
        } else {
            height as f32 / width as f32
        }
    }

    /// Shared handle to the frame slot for a reader on another thread.
    pub fn latest_handle(&self) -> Arc<LatestFrame> {
        Arc::clone(&self.latest)
    }

    /// Frames decoded so far.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Drop the connection immediately, discarding unread frames.
    pub fn close(mut self) {
        self.source.close();
    }
}
