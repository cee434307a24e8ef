//! Capture -> encode -> delay -> send, paced to the source frame rate.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, trace, warn};

use super::delay_queue::DelayQueue;
use super::shutdown::ShutdownToken;
use crate::capture::frame::EncodedFrame;
use crate::capture::FrameSource;
use crate::codec::FrameEncoder;
use crate::transport::FrameSink;
use crate::PublisherConfig;

/// Counters for one publisher run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublisherStats {
    pub captured: u64,
    pub read_misses: u64,
    pub encode_failures: u64,
    pub sent: u64,
    pub send_failures: u64,
}

/// What the capture half of an iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Queued,
    /// Source had nothing this call; back off and retry.
    NoFrame,
    /// Encoder rejected the frame; it was dropped.
    Dropped,
}

/// Single-threaded publish loop.
///
/// Each iteration makes one capture attempt, then sends every queued frame
/// whose delay has expired, oldest first, then sleeps out the rest of the
/// frame interval.
pub struct Publisher<S, E, K> {
    source: S,
    encoder: E,
    sink: K,
    queue: DelayQueue<EncodedFrame>,
    frame_interval: Duration,
    read_backoff: Duration,
    stats: PublisherStats,
}

impl<S, E, K> Publisher<S, E, K>
where
    S: FrameSource,
    E: FrameEncoder,
    K: FrameSink,
{
    pub fn new(source: S, encoder: E, sink: K, config: &PublisherConfig) -> Self {
        // Sources already substitute their configured fallback rate; anything
        // still without a usable rate runs unpaced.
        let frame_interval =
            Duration::try_from_secs_f64(1.0 / source.info().fps).unwrap_or(Duration::ZERO);

        Self {
            source,
            encoder,
            sink,
            queue: DelayQueue::new(Duration::from_millis(config.delay_ms)),
            frame_interval,
            read_backoff: Duration::from_millis(config.read_backoff_ms),
            stats: PublisherStats::default(),
        }
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// One non-blocking capture; on success the encoded frame joins the queue tail.
    pub fn capture_once(&mut self) -> CaptureOutcome {
        let Some(frame) = self.source.read() else {
            self.stats.read_misses += 1;
            return CaptureOutcome::NoFrame;
        };
        self.stats.captured += 1;
        metrics::counter!("frames_captured").increment(1);

        match self.encoder.encode(&frame) {
            Ok(encoded) => {
                let at = encoded.captured_at;
                self.queue.push(encoded, at);
                metrics::gauge!("delay_queue_depth").set(self.queue.len() as f64);
                CaptureOutcome::Queued
            }
            Err(e) => {
                self.stats.encode_failures += 1;
                metrics::counter!("frames_dropped").increment(1);
                warn!("Dropping frame {}: {}", frame.meta.sequence, e);
                CaptureOutcome::Dropped
            }
        }
    }

    /// Send every frame due at `now`, in capture order. Returns how many were handed off.
    pub fn transmit_ready(&mut self, now: Instant) -> usize {
        let mut released = 0;
        while let Some(frame) = self.queue.pop_ready(now) {
            released += 1;
            let sequence = frame.sequence;
            match self.sink.send(frame.data) {
                Ok(()) => {
                    self.stats.sent += 1;
                    metrics::counter!("frames_sent").increment(1);
                    trace!("Sent frame {}", sequence);
                }
                Err(e) => {
                    self.stats.send_failures += 1;
                    metrics::counter!("frames_dropped").increment(1);
                    debug!("Frame {} not sent: {}", sequence, e);
                }
            }
        }
        if released > 0 {
            metrics::gauge!("delay_queue_depth").set(self.queue.len() as f64);
        }
        released
    }

    /// Capture then drain, without sleeping.
    pub fn iterate(&mut self) -> CaptureOutcome {
        let outcome = self.capture_once();
        self.transmit_ready(Instant::now());
        outcome
    }

    /// Run until `shutdown` is cancelled, then release the source and close
    /// the sink. Frames still in the queue are discarded.
    #[instrument(skip_all)]
    pub fn run(mut self, shutdown: &ShutdownToken) -> PublisherStats {
        info!(
            "Streaming {} with {} ms delay",
            self.source.info().description,
            self.queue.delay().as_millis()
        );

        while !shutdown.is_cancelled() {
            let started = Instant::now();

            if self.iterate() == CaptureOutcome::NoFrame {
                std::thread::sleep(self.read_backoff);
            }

            if let Some(rest) = self.frame_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }

        info!("Shutting down…");
        let Self {
            source,
            mut sink,
            queue,
            stats,
            ..
        } = self;
        if !queue.is_empty() {
            debug!("Discarding {} delayed frames", queue.len());
        }
        drop(source);
        sink.close();

        info!(
            "Captured {} frames, sent {}, dropped {}",
            stats.captured,
            stats.sent,
            stats.encode_failures + stats.send_failures
        );
        stats
    }
}
