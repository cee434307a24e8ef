//! PUB/SUB round trips over TCP on an ephemeral port.

use std::time::{Duration, Instant};

use avatar_link::capture::{ChannelOrder, Frame};
use avatar_link::codec::{FrameEncoder, JpegEncoder};
use avatar_link::stream::{encode_sensor_message, CameraStream, SensorBus};
use avatar_link::transport::{FrameSink, MessageSource, Subscription, ZmqPublisher};
use avatar_link::Config;
use bytes::Bytes;
use serde_json::json;

const DEADLINE: Duration = Duration::from_secs(20);

/// SUB sockets miss whatever is published before they finish joining, so
/// keep publishing until `received` reports success.
async fn publish_until<F>(publisher: &mut ZmqPublisher, payload: Bytes, mut received: F) -> bool
where
    F: FnMut() -> bool,
{
    let started = Instant::now();
    while started.elapsed() < DEADLINE {
        let _ = publisher.send(payload.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        if received() {
            return true;
        }
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raw_bytes_cross_the_wire_unchanged() {
    let mut publisher = ZmqPublisher::bind("tcp://127.0.0.1:0", 8).await.unwrap();
    let mut subscription = Subscription::connect(publisher.endpoint(), 8).unwrap();

    let payload = Bytes::from_static(b"\xff\xd8 not really a jpeg \xff\xd9");
    let mut got = None;
    let ok = publish_until(&mut publisher, payload.clone(), || {
        got = subscription.try_recv();
        got.is_some()
    })
    .await;

    assert!(ok, "nothing received from {}", publisher.endpoint());
    assert_eq!(got.unwrap(), payload);
    publisher.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn camera_stream_decodes_published_frames() {
    let mut publisher = ZmqPublisher::bind("tcp://127.0.0.1:0", 8).await.unwrap();
    let mut config = Config::default().camera_stream;
    config.endpoint = publisher.endpoint().to_string();
    let mut stream = CameraStream::connect(&config).unwrap();

    let frame = Frame::new(vec![40u8; 24 * 12 * 3], 24, 12, ChannelOrder::Bgr, 1, Instant::now()).unwrap();
    let jpeg = JpegEncoder::default().encode(&frame).unwrap().data;

    assert!(publish_until(&mut publisher, jpeg, || stream.poll()).await);
    assert_eq!(stream.frame_size(), (24, 12));
    stream.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sensor_bus_tracks_topics_over_the_wire() {
    let mut publisher = ZmqPublisher::bind("tcp://127.0.0.1:0", 8).await.unwrap();
    let mut config = Config::default().sensors;
    config.endpoint = publisher.endpoint().to_string();
    let mut bus = SensorBus::connect(&config).unwrap();

    let message = encode_sensor_message("pose", json!({"x": 8, "y": 0, "z": 6}));
    assert!(publish_until(&mut publisher, message, || bus.poll_batch() > 0).await);
    assert_eq!(bus.get("pose"), Some(&json!({"x": 8, "y": 0, "z": 6})));
    bus.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_publisher_refuses_sends() {
    let mut publisher = ZmqPublisher::bind("tcp://127.0.0.1:0", 8).await.unwrap();
    publisher.close();
    assert!(publisher.send(Bytes::from_static(b"late")).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscription_survives_publisher_restart() {
    let mut publisher = ZmqPublisher::bind("tcp://127.0.0.1:0", 8).await.unwrap();
    let endpoint = publisher.endpoint().to_string();
    let mut subscription = Subscription::connect(&endpoint, 8).unwrap();

    let before = Bytes::from_static(b"before");
    assert!(publish_until(&mut publisher, before, || subscription.try_recv().is_some()).await);

    publisher.close();
    drop(publisher);
    tokio::time::sleep(Duration::from_millis(300)).await;
    while subscription.try_recv().is_some() {}

    let mut publisher = ZmqPublisher::bind(&endpoint, 8).await.unwrap();
    let after = Bytes::from_static(b"after");
    let mut got = None;
    let ok = publish_until(&mut publisher, after.clone(), || {
        got = subscription.try_recv();
        got.is_some()
    })
    .await;

    assert!(ok, "nothing received after rebinding {}", endpoint);
    assert_eq!(got.unwrap(), after);
    subscription.close();
}
