use std::collections::VecDeque;
use std::time::{Duration, Instant};

use avatar_link::capture::{ChannelOrder, EncodedFrame, Frame, FrameSource, SourceInfo};
use avatar_link::codec::{FrameEncoder, JpegEncoder};
use avatar_link::pipeline::{CaptureOutcome, Publisher, ShutdownToken};
use avatar_link::stream::CameraStream;
use avatar_link::{Config, EncodeError};
use bytes::Bytes;

struct Scripted {
    frames: VecDeque<Frame>,
    info: SourceInfo,
}

impl Scripted {
    fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            info: SourceInfo {
                width: 4,
                height: 4,
                fps: 100.0,
                description: "scripted".into(),
            },
        }
    }
}

impl FrameSource for Scripted {
    fn read(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    fn info(&self) -> &SourceInfo {
        &self.info
    }
}

/// Tags each payload with the capture offset so wire order is visible.
struct OffsetEncoder {
    t0: Instant,
}

impl FrameEncoder for OffsetEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<EncodedFrame, EncodeError> {
        let offset = frame.timestamp.duration_since(self.t0).as_millis();
        Ok(EncodedFrame {
            data: Bytes::from(offset.to_string()),
            sequence: frame.meta.sequence,
            captured_at: frame.timestamp,
        })
    }
}

fn frame_at(t0: Instant, offset_ms: u64, sequence: u64) -> Frame {
    Frame::new(
        vec![0u8; 4 * 4 * 3],
        4,
        4,
        ChannelOrder::Bgr,
        sequence,
        t0 + Duration::from_millis(offset_ms),
    )
    .unwrap()
}

fn drain(rx: &flume::Receiver<Bytes>) -> Vec<String> {
    rx.try_iter()
        .map(|b| String::from_utf8(b.to_vec()).unwrap())
        .collect()
}

#[test]
fn frames_leave_in_capture_order_once_aged() {
    let t0 = Instant::now();
    let source = Scripted::new(vec![
        frame_at(t0, 0, 1),
        frame_at(t0, 50, 2),
        frame_at(t0, 100, 3),
    ]);
    let mut config = Config::default().publisher;
    config.delay_ms = 80;
    let (tx, rx) = flume::unbounded();
    let mut publisher = Publisher::new(source, OffsetEncoder { t0 }, tx, &config);

    for _ in 0..3 {
        assert_eq!(publisher.capture_once(), CaptureOutcome::Queued);
    }

    assert_eq!(publisher.transmit_ready(t0 + Duration::from_millis(90)), 1);
    assert_eq!(drain(&rx), vec!["0"]);

    assert_eq!(publisher.transmit_ready(t0 + Duration::from_millis(200)), 2);
    assert_eq!(drain(&rx), vec!["50", "100"]);
    assert_eq!(publisher.queued(), 0);
    assert_eq!(publisher.stats().sent, 3);
}

#[test]
fn nothing_is_released_early() {
    let t0 = Instant::now();
    let source = Scripted::new(vec![frame_at(t0, 0, 1)]);
    let mut config = Config::default().publisher;
    config.delay_ms = 80;
    let (tx, rx) = flume::unbounded();
    let mut publisher = Publisher::new(source, OffsetEncoder { t0 }, tx, &config);

    publisher.capture_once();
    assert_eq!(publisher.transmit_ready(t0 + Duration::from_millis(79)), 0);
    assert!(drain(&rx).is_empty());
    assert_eq!(publisher.transmit_ready(t0 + Duration::from_millis(80)), 1);
}

#[test]
fn published_jpegs_decode_on_the_subscriber() {
    let t0 = Instant::now();
    let source = Scripted::new(vec![frame_at(t0, 0, 1)]);
    let config = Config::default();
    let (tx, rx) = flume::unbounded();
    let mut publisher = Publisher::new(source, JpegEncoder::default(), tx, &config.publisher);
    publisher.iterate();

    let mut stream = CameraStream::new(rx, &config.camera_stream);
    assert!(stream.poll());
    assert_eq!(stream.frame_size(), (4, 4));
}

#[test]
fn run_stops_at_the_next_iteration_boundary() {
    let t0 = Instant::now();
    let frames = (0..1000).map(|i| frame_at(t0, 0, i)).collect();
    let config = Config::default().publisher;
    let (tx, rx) = flume::unbounded();
    let publisher = Publisher::new(Scripted::new(frames), OffsetEncoder { t0 }, tx, &config);

    let shutdown = ShutdownToken::new();
    let token = shutdown.clone();
    let worker = std::thread::spawn(move || publisher.run(&token));

    // 100 fps source: a few iterations, then stop
    std::thread::sleep(Duration::from_millis(60));
    shutdown.cancel();
    let stats = worker.join().unwrap();

    assert!(stats.captured > 0);
    assert!(stats.captured < 1000);
    assert_eq!(stats.sent as usize, drain(&rx).len());
}
