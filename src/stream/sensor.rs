//! Topic-keyed JSON sensor feed.
//!
//! Messages are UTF-8 JSON objects of the form `{"topic": "...", "data": ...}`.
//! A missing or non-string topic files the message under [`UNKNOWN_TOPIC`];
//! a missing `data` field stores the whole object.

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::error::{ParseError, TransportError};
use crate::transport::{MessageSource, Subscription};
use crate::SensorBusConfig;

pub const UNKNOWN_TOPIC: &str = "unknown";

/// Latest payload per topic. A new message for a topic replaces the old one
/// outright; nothing is merged.
pub struct SensorBus<R = Subscription> {
    source: R,
    latest: HashMap<String, Value>,
    batch: usize,
}

impl SensorBus<Subscription> {
    /// Subscribe to `config.endpoint`. Must be called inside a tokio runtime.
    pub fn connect(config: &SensorBusConfig) -> Result<Self, TransportError> {
        let subscription = Subscription::connect(&config.endpoint, config.recv_queue)?;
        Ok(Self::new(subscription, config))
    }
}

impl<R: MessageSource> SensorBus<R> {
    pub fn new(source: R, config: &SensorBusConfig) -> Self {
        Self {
            source,
            latest: HashMap::new(),
            batch: config.max_messages_per_poll,
        }
    }

    /// Receive at most `max_messages` pending messages.
    ///
    /// Returns how many were parsed and stored. Malformed messages still use
    /// up a slot in the batch but are otherwise ignored.
    pub fn poll(&mut self, max_messages: usize) -> usize {
        let mut processed = 0;
        for _ in 0..max_messages {
            let Some(payload) = self.source.try_recv() else {
                break;
            };
            match parse_sensor_message(&payload) {
                Ok((topic, data)) => {
                    trace!("Sensor update on {}", topic);
                    self.latest.insert(topic, data);
                    processed += 1;
                }
                Err(e) => {
                    metrics::counter!("sensor_parse_failures").increment(1);
                    debug!("Discarding sensor message: {}", e);
                }
            }
        }
        processed
    }

    /// `poll` with the configured batch size.
    pub fn poll_batch(&mut self) -> usize {
        self.poll(self.batch)
    }

    pub fn get(&self, topic: &str) -> Option<&Value> {
        self.latest.get(topic)
    }

    pub fn get_or<'a>(&'a self, topic: &str, default: &'a Value) -> &'a Value {
        self.latest.get(topic).unwrap_or(default)
    }

    /// Typed view of a topic. `None` if nothing has arrived for it yet.
    pub fn get_as<T: DeserializeOwned>(&self, topic: &str) -> Option<Result<T, serde_json::Error>> {
        self.latest
            .get(topic)
            .map(|value| serde_json::from_value(value.clone()))
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.latest.keys().map(String::as_str)
    }

    pub fn close(mut self) {
        self.source.close();
    }
}

/// Split a wire message into its topic and payload.
pub fn parse_sensor_message(payload: &[u8]) -> Result<(String, Value), ParseError> {
    let text = std::str::from_utf8(payload)?;
    let Value::Object(mut object) = serde_json::from_str::<Value>(text)? else {
        return Err(ParseError::NotAnObject);
    };

    let topic = match object.get("topic") {
        Some(Value::String(topic)) => topic.clone(),
        _ => UNKNOWN_TOPIC.to_string(),
    };
    let data = match object.remove("data") {
        Some(data) => data,
        None => Value::Object(object),
    };

    Ok((topic, data))
}

/// Wire form of a sensor message, for producers.
pub fn encode_sensor_message(topic: &str, data: Value) -> Bytes {
    let mut object = Map::new();
    object.insert("topic".into(), json!(topic));
    object.insert("data".into(), data);
    Bytes::from(Value::Object(object).to_string())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::Config;

    fn bus() -> (SensorBus<flume::Receiver<Bytes>>, flume::Sender<Bytes>) {
        let (tx, rx) = flume::unbounded();
        (SensorBus::new(rx, &Config::default().sensors), tx)
    }

    fn raw(text: &str) -> Bytes {
        Bytes::from(text.to_string())
    }

    #[test]
    fn later_message_replaces_without_merging() {
        let (mut bus, tx) = bus();
        tx.send(raw(r#"{"topic":"pose","data":{"x":1,"y":2,"z":3}}"#)).unwrap();
        tx.send(raw(r#"{"topic":"pose","data":{"x":9}}"#)).unwrap();

        assert_eq!(bus.poll(10), 2);
        assert_eq!(bus.get("pose"), Some(&json!({"x": 9})));
    }

    #[test]
    fn zero_budget_processes_nothing() {
        let (mut bus, tx) = bus();
        tx.send(encode_sensor_message("pose", json!({"x": 1}))).unwrap();

        assert_eq!(bus.poll(0), 0);
        assert!(bus.get("pose").is_none());
        assert_eq!(bus.poll(1), 1);
    }

    #[test]
    fn empty_poll_leaves_state_alone() {
        let (mut bus, tx) = bus();
        tx.send(encode_sensor_message("pose", json!({"x": 1}))).unwrap();
        bus.poll_batch();

        assert_eq!(bus.poll(10), 0);
        assert_eq!(bus.get("pose"), Some(&json!({"x": 1})));
    }

    #[test]
    fn malformed_messages_do_not_stop_the_drain() {
        let (mut bus, tx) = bus();
        tx.send(raw("{not json")).unwrap();
        tx.send(raw("[1, 2, 3]")).unwrap();
        tx.send(Bytes::from_static(&[0xff, 0xfe])).unwrap();
        tx.send(raw(r#"{"topic":"intrinsics","data":{"fx":900.0}}"#)).unwrap();

        assert_eq!(bus.poll(10), 1);
        assert_eq!(bus.get("intrinsics"), Some(&json!({"fx": 900.0})));
    }

    #[test]
    fn batch_bounds_receives_not_successes() {
        let (mut bus, tx) = bus();
        tx.send(raw("garbage")).unwrap();
        tx.send(encode_sensor_message("a", json!(1))).unwrap();
        tx.send(encode_sensor_message("b", json!(2))).unwrap();

        assert_eq!(bus.poll(2), 1);
        assert!(bus.get("b").is_none());
        assert_eq!(bus.poll(2), 1);
        assert_eq!(bus.get("b"), Some(&json!(2)));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let (topic, data) = parse_sensor_message(br#"{"data":{"x":1}}"#).unwrap();
        assert_eq!(topic, UNKNOWN_TOPIC);
        assert_eq!(data, json!({"x": 1}));

        let (topic, data) = parse_sensor_message(br#"{"topic":"battery","level":0.8}"#).unwrap();
        assert_eq!(topic, "battery");
        assert_eq!(data, json!({"topic": "battery", "level": 0.8}));

        let (topic, data) = parse_sensor_message(br#"{"topic":7,"data":null}"#).unwrap();
        assert_eq!(topic, UNKNOWN_TOPIC);
        assert_eq!(data, Value::Null);
    }

    #[test]
    fn get_or_and_typed_access() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Pose {
            x: f64,
            y: f64,
        }

        let (mut bus, tx) = bus();
        tx.send(encode_sensor_message("pose", json!({"x": 1.5, "y": -2.0}))).unwrap();
        bus.poll_batch();

        let fallback = json!({});
        assert_eq!(bus.get_or("missing", &fallback), &fallback);
        assert_eq!(
            bus.get_as::<Pose>("pose").unwrap().unwrap(),
            Pose { x: 1.5, y: -2.0 }
        );
        assert!(bus.get_as::<Pose>("missing").is_none());
        assert_eq!(bus.topics().collect::<Vec<_>>(), vec!["pose"]);
    }
}
