//! ZeroMQ PUB/SUB sockets, wire compatible with libzmq peers.

use std::time::Duration;

use bytes::Bytes;
use flume::TrySendError;
use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use zeromq::{PubSocket, Socket, SocketEvent, SocketRecv, SocketSend, SubSocket, ZmqMessage};

use super::{FrameSink, MessageSource};
use crate::error::TransportError;

const RECV_RETRY: Duration = Duration::from_millis(100);
const RECONNECT_DELAY: Duration = Duration::from_millis(200);

/// Map libzmq-style endpoints onto what the socket layer resolves.
///
/// `tcp://*:5555` binds all interfaces; `localhost` is pinned to IPv4.
pub fn normalize_endpoint(endpoint: &str) -> String {
    endpoint
        .replacen("://*:", "://0.0.0.0:", 1)
        .replacen("://localhost:", "://127.0.0.1:", 1)
}

/// Bound PUB socket fed from a bounded queue.
///
/// A full queue drops the new message, the same way a PUB socket behaves at
/// its high-water mark. Closing aborts the pump, so nothing is flushed.
pub struct ZmqPublisher {
    tx: flume::Sender<Bytes>,
    pump: Option<JoinHandle<()>>,
    endpoint: String,
}

impl ZmqPublisher {
    pub async fn bind(endpoint: &str, queue: usize) -> Result<Self, TransportError> {
        let mut socket = PubSocket::new();
        let bound = socket.bind(&normalize_endpoint(endpoint)).await?;
        let endpoint = bound.to_string();
        info!("Publishing on {}", endpoint);

        let (tx, rx) = flume::bounded::<Bytes>(queue.max(1));
        let pump = tokio::spawn(async move {
            while let Ok(payload) = rx.recv_async().await {
                if let Err(e) = socket.send(ZmqMessage::from(payload)).await {
                    warn!("Publish failed: {}", e);
                }
            }
            debug!("Publish pump drained");
            for e in socket.close().await {
                debug!("Error closing publisher: {}", e);
            }
        });

        Ok(Self {
            tx,
            pump: Some(pump),
            endpoint,
        })
    }

    /// Resolved endpoint, including the real port when bound to port 0.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FrameSink for ZmqPublisher {
    fn send(&mut self, payload: Bytes) -> Result<(), TransportError> {
        if self.pump.is_none() {
            return Err(TransportError::Closed);
        }
        FrameSink::send(&mut self.tx, payload)
    }

    fn close(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            info!("Publisher on {} closed", self.endpoint);
        }
    }
}

impl Drop for ZmqPublisher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connected SUB socket (subscribed to everything) draining into a bounded queue.
///
/// Connecting never waits for the peer; the pump keeps retrying in the
/// background and reconnects whenever the publisher goes away. When the queue is full new messages are discarded.
pub struct Subscription {
    rx: flume::Receiver<Bytes>,
    pump: Option<JoinHandle<()>>,
    endpoint: String,
}

impl Subscription {
    /// Must be called inside a tokio runtime.
    pub fn connect(endpoint: &str, queue: usize) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let endpoint = normalize_endpoint(endpoint);
        let (tx, rx) = flume::bounded::<Bytes>(queue.max(1));

        let pump = runtime.spawn(subscribe_loop(endpoint.clone(), tx));

        Ok(Self {
            rx,
            pump: Some(pump),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// How one connection to the publisher ended.
enum Session {
    /// Peer went away; connect again.
    Lost,
    /// Nobody reads the queue any more.
    Finished,
}

/// Pump for a [`Subscription`]. A SUB socket does not recover once its peer
/// disconnects, so every lost peer gets a fresh socket.
async fn subscribe_loop(target: String, tx: flume::Sender<Bytes>) {
    loop {
        let mut socket = SubSocket::new();
        let mut events = socket.monitor();

        if let Err(e) = socket.connect(&target).await {
            warn!("Cannot connect to {}: {}", target, e);
            tokio::time::sleep(RECONNECT_DELAY).await;
            continue;
        }
        if let Err(e) = socket.subscribe("").await {
            error!("Cannot subscribe on {}: {}", target, e);
            return;
        }
        info!("Subscribed to {}", target);

        match receive(&mut socket, &mut events, &target, &tx).await {
            Session::Lost => {
                info!("Publisher at {} went away, reconnecting", target);
                drop(socket);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
            Session::Finished => return,
        }
    }
}

async fn receive(
    socket: &mut SubSocket,
    events: &mut (impl Stream<Item = SocketEvent> + Unpin),
    target: &str,
    tx: &flume::Sender<Bytes>,
) -> Session {
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(SocketEvent::Disconnected(_)) | None => return Session::Lost,
                Some(_) => {}
            },
            received = socket.recv() => match received {
                Ok(message) => {
                    let Some(payload) = message.into_vec().into_iter().next() else {
                        continue;
                    };
                    match tx.try_send(payload) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            metrics::counter!("subscriber_overflow").increment(1);
                            trace!("Receive queue for {} full, dropping", target);
                        }
                        Err(TrySendError::Disconnected(_)) => return Session::Finished,
                    }
                }
                Err(e) => {
                    warn!("Receive failed on {}: {}", target, e);
                    tokio::time::sleep(RECV_RETRY).await;
                }
            },
        }
    }
}

impl MessageSource for Subscription {
    fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    fn close(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            // Unread messages go with the socket
            while self.rx.try_recv().is_ok() {}
            debug!("Subscription to {} closed", self.endpoint);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
