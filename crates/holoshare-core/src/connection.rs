//! Connection adapter between the replica and a publish/subscribe bus.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ connect() ┌────────────┐ subscribed ┌───────────┐
//! │ Disconnected │──────────>│ Connecting │───────────>│ Connected │
//! └──────────────┘           └────────────┘            └───────────┘
//!        ▲                         │ bus error               │
//!        └─────────────────────────┴─────────────────────────┘
//!                         shutdown() / link lost
//! ```
//!
//! # Outbound
//!
//! [`Connection::publish`] stamps the action with this client's identity and
//! the current time, encodes it, and hands it to the bus. It returns as soon
//! as the bus has accepted the request. Failures that surface later are
//! logged here and never retried: the next dirty scan supersedes a lost
//! Manipulate, and a lost Create or Delete is an accepted gap.
//!
//! # Inbound
//!
//! The bus calls back on its own thread for every message on the session
//! topic. The payload is decoded, envelopes that originated here are dropped
//! (echo suppression), and the rest are pushed onto the [`InboundQueue`].

use std::sync::Arc;

use holoshare_proto::OperationKind;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    Action, BusError, ClientId, ConnectionError, Environment, InboundQueue, PublishError,
    SessionConfig,
    codec::{self, EnvelopeMeta},
    transport::{Bus, BusEvents, BusMessage},
};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link to the broker.
    Disconnected,
    /// Link or subscription in progress.
    Connecting,
    /// Subscribed to the session topic, publishing allowed.
    Connected,
}

/// What the receive path did with one inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Decoded and queued for the next tick.
    Enqueued(OperationKind),
    /// Originated from this client; dropped.
    Echo,
    /// Could not be decoded; dropped.
    Malformed,
}

/// Handle to the eventual outcome of a publish.
///
/// Dropping it is fine; production code never waits on it.
#[derive(Debug)]
pub struct PublishCompletion {
    rx: oneshot::Receiver<Result<(), PublishError>>,
}

impl PublishCompletion {
    /// Completion that has already resolved to `result`.
    pub fn ready(result: Result<(), PublishError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Wait for the bus to finish the publish.
    pub async fn wait(self) -> Result<(), PublishError> {
        self.rx.await.unwrap_or(Err(PublishError::Abandoned))
    }

    /// Outcome if the bus has already reported one.
    pub fn try_result(&mut self) -> Option<Result<(), PublishError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(PublishError::Abandoned)),
        }
    }
}

/// Sink for outbound actions.
///
/// Implemented by [`Connection`]; tests substitute recorders.
pub trait Publisher {
    /// Submit `action` for delivery without waiting for acknowledgement.
    fn publish(&self, action: &Action) -> Result<PublishCompletion, ConnectionError>;
}

/// Receive side shared with the bus's callback threads.
struct Inbox {
    identity: ClientId,
    queue: InboundQueue,
    state: Arc<Mutex<ConnectionState>>,
}

impl Inbox {
    fn receive(&self, payload: &[u8]) -> ReceiveOutcome {
        let (action, meta) = match codec::decode(payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(error = %err, len = payload.len(), "dropping malformed payload");
                return ReceiveOutcome::Malformed;
            },
        };

        if self.identity.is_origin_of(meta.client_id.as_str()) {
            debug!(object_id = %action.object_id(), "dropping echo of own publish");
            return ReceiveOutcome::Echo;
        }

        let operation = action.operation();
        debug!(
            object_id = %action.object_id(),
            ?operation,
            origin = %meta.client_id,
            timestamp = meta.timestamp,
            "queued remote action"
        );
        self.queue.enqueue(action);
        ReceiveOutcome::Enqueued(operation)
    }
}

impl BusEvents for Inbox {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        let outcome = self.receive(payload);
        debug!(topic, ?outcome, "bus message handled");
    }

    fn on_link_lost(&self, reason: &str) {
        let mut state = self.state.lock();
        if *state != ConnectionState::Disconnected {
            warn!(reason, "bus link lost");
            *state = ConnectionState::Disconnected;
        }
    }
}

/// Connection to the scene session on a bus.
pub struct Connection<B: Bus, E: Environment> {
    bus: B,
    env: E,
    config: SessionConfig,
    inbox: Arc<Inbox>,
}

impl<B: Bus, E: Environment> Connection<B, E> {
    /// Create a disconnected connection that will feed `queue`.
    pub fn new(
        bus: B,
        env: E,
        config: SessionConfig,
        identity: ClientId,
        queue: InboundQueue,
    ) -> Self {
        let inbox = Arc::new(Inbox {
            identity,
            queue,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
        });
        Self { bus, env, config, inbox }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.inbox.state.lock()
    }

    /// This client's identity.
    pub fn identity(&self) -> &ClientId {
        &self.inbox.identity
    }

    /// Queue that receives decoded remote actions.
    pub fn inbound(&self) -> &InboundQueue {
        &self.inbox.queue
    }

    /// Session settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Underlying bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Open the link and subscribe to the session topic.
    ///
    /// A no-op when already connected.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if another connect is in progress
    /// - `Bus` if the broker refuses the link or the subscription, or
    ///   (`NotConnected`) if the link dropped or `shutdown` ran before the
    ///   subscription completed; the connection is left `Disconnected`
    pub fn connect(&self) -> Result<(), ConnectionError> {
        {
            let mut state = self.inbox.state.lock();
            match *state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => {
                    return Err(ConnectionError::InvalidState {
                        state: *state,
                        operation: "connect",
                    });
                },
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
            }
        }
        info!(broker = %self.config.broker_url, identity = %self.identity(), "connecting");

        let events: Arc<dyn BusEvents> = self.inbox.clone();
        if let Err(err) = self.bus.connect(&self.config, events) {
            *self.inbox.state.lock() = ConnectionState::Disconnected;
            warn!(error = %err, "connect failed");
            return Err(err.into());
        }

        if let Err(err) = self.bus.subscribe(&self.config.topic, self.config.qos) {
            self.bus.disconnect();
            *self.inbox.state.lock() = ConnectionState::Disconnected;
            warn!(error = %err, topic = %self.config.topic, "subscribe failed");
            return Err(err.into());
        }

        {
            let mut state = self.inbox.state.lock();
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Connected;
            } else {
                // Link lost or shutdown while the handshake was in flight.
                let current = *state;
                drop(state);
                self.bus.disconnect();
                *self.inbox.state.lock() = ConnectionState::Disconnected;
                warn!(state = ?current, "link dropped during connect");
                return Err(BusError::NotConnected.into());
            }
        }
        info!(topic = %self.config.topic, qos = ?self.config.qos, "connected");
        Ok(())
    }

    /// Stamp, encode and submit `action`.
    ///
    /// Returns once the bus has the message. The returned handle resolves
    /// when the bus reports the outcome; failures are logged either way.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the link is not up
    /// - `Encode` if the action cannot be serialised
    pub fn publish(&self, action: &Action) -> Result<PublishCompletion, ConnectionError> {
        if self.state() != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected);
        }

        let meta =
            EnvelopeMeta { client_id: self.identity().clone(), timestamp: self.env.unix_time() };
        let payload = codec::encode(action, &meta)?;
        let message = BusMessage {
            topic: self.config.topic.clone(),
            payload,
            qos: self.config.qos,
            retain: self.config.retain,
        };

        let object_id = action.object_id().clone();
        let operation = action.operation();
        let (tx, rx) = oneshot::channel();
        self.bus.publish(
            message,
            Box::new(move |result: Result<(), BusError>| {
                if let Err(err) = &result {
                    warn!(%object_id, ?operation, error = %err, "publish failed");
                }
                let _ = tx.send(result.map_err(PublishError::from));
            }),
        );

        debug!(object_id = %action.object_id(), ?operation, "published");
        Ok(PublishCompletion { rx })
    }

    /// Run the receive path on `payload` as if the bus had delivered it.
    pub fn handle_payload(&self, payload: &[u8]) -> ReceiveOutcome {
        self.inbox.receive(payload)
    }

    /// Close the link. Safe to call repeatedly.
    pub fn shutdown(&self) {
        {
            let mut state = self.inbox.state.lock();
            if *state == ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Disconnected;
        }
        // Lock released first: the bus may report link loss synchronously.
        self.bus.disconnect();
        info!(identity = %self.inbox.identity, "disconnected");
    }
}

impl<B: Bus, E: Environment> Publisher for Connection<B, E> {
    fn publish(&self, action: &Action) -> Result<PublishCompletion, ConnectionError> {
        Connection::publish(self, action)
    }
}

impl<B: Bus, E: Environment> Drop for Connection<B, E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use holoshare_proto::{ObjectKind, QoS};

    use super::*;
    use crate::{ObjectId, Transform, codec::encode};

    #[derive(Clone, Copy)]
    struct FixedEnv;

    impl Environment for FixedEnv {
        fn unix_time(&self) -> i64 {
            1_700_000_000
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(7);
        }
    }

    /// Bus that records publishes and completes them immediately.
    #[derive(Default)]
    struct LoopbackBus {
        sink: Mutex<Option<Arc<dyn BusEvents>>>,
        published: Mutex<Vec<BusMessage>>,
        subscribed: Mutex<Vec<(String, QoS)>>,
        refuse_subscribe: AtomicBool,
        lose_link_on_subscribe: AtomicBool,
        on_subscribe: Mutex<Option<Box<dyn FnOnce() + Send>>>,
        fail_publish: AtomicBool,
        disconnects: AtomicUsize,
    }

    impl Bus for Arc<LoopbackBus> {
        fn connect(
            &self,
            _config: &SessionConfig,
            events: Arc<dyn BusEvents>,
        ) -> Result<(), BusError> {
            *self.sink.lock() = Some(events);
            Ok(())
        }

        fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BusError> {
            if self.refuse_subscribe.load(Ordering::SeqCst) {
                return Err(BusError::Rejected("no".to_string()));
            }
            if self.lose_link_on_subscribe.load(Ordering::SeqCst) {
                let sink = self.sink.lock().clone();
                if let Some(sink) = sink {
                    sink.on_link_lost("broker went away");
                }
            }
            let hook = self.on_subscribe.lock().take();
            if let Some(hook) = hook {
                hook();
            }
            self.subscribed.lock().push((topic.to_string(), qos));
            Ok(())
        }

        fn publish(&self, message: BusMessage, on_complete: crate::PublishCallback) {
            self.published.lock().push(message);
            if self.fail_publish.load(Ordering::SeqCst) {
                on_complete(Err(BusError::NotConnected));
            } else {
                on_complete(Ok(()));
            }
        }

        fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn connection(bus: &Arc<LoopbackBus>) -> Connection<Arc<LoopbackBus>, FixedEnv> {
        Connection::new(
            bus.clone(),
            FixedEnv,
            SessionConfig::with_topic("scene/test"),
            ClientId::new("me").unwrap(),
            InboundQueue::new(),
        )
    }

    fn cube(id: &str) -> Action {
        Action::spawn(ObjectKind::Cube, ObjectId::new(id).unwrap(), Transform::IDENTITY)
    }

    fn payload_from(origin: &str, action: &Action) -> Vec<u8> {
        let meta = EnvelopeMeta { client_id: ClientId::new(origin).unwrap(), timestamp: 1 };
        encode(action, &meta).unwrap()
    }

    #[test]
    fn connect_subscribes_to_session_topic() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        conn.connect().unwrap();

        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(*bus.subscribed.lock(), vec![("scene/test".to_string(), QoS::ExactlyOnce)]);
    }

    #[test]
    fn connect_is_idempotent_once_connected() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);
        conn.connect().unwrap();
        conn.connect().unwrap();
        assert_eq!(bus.subscribed.lock().len(), 1);
    }

    #[test]
    fn refused_subscribe_leaves_connection_down() {
        let bus = Arc::new(LoopbackBus::default());
        bus.refuse_subscribe.store(true, Ordering::SeqCst);
        let conn = connection(&bus);

        assert!(matches!(conn.connect(), Err(ConnectionError::Bus(BusError::Rejected(_)))));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(bus.disconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn link_lost_during_subscribe_leaves_connection_down() {
        let bus = Arc::new(LoopbackBus::default());
        bus.lose_link_on_subscribe.store(true, Ordering::SeqCst);
        let conn = connection(&bus);

        assert!(matches!(conn.connect(), Err(ConnectionError::Bus(BusError::NotConnected))));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(bus.disconnects.load(Ordering::SeqCst), 1);
        assert!(matches!(conn.publish(&cube("c1")), Err(ConnectionError::NotConnected)));

        bus.lose_link_on_subscribe.store(false, Ordering::SeqCst);
        conn.connect().unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn shutdown_during_connect_wins() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = Arc::new(connection(&bus));
        let handle = Arc::downgrade(&conn);
        *bus.on_subscribe.lock() = Some(Box::new(move || {
            if let Some(conn) = handle.upgrade() {
                conn.shutdown();
            }
        }));

        assert!(matches!(conn.connect(), Err(ConnectionError::Bus(BusError::NotConnected))));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(bus.disconnects.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn publish_requires_connection() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);
        assert!(matches!(conn.publish(&cube("c1")), Err(ConnectionError::NotConnected)));
        assert!(bus.published.lock().is_empty());
    }

    #[test]
    fn publish_stamps_identity_and_time() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);
        conn.connect().unwrap();

        conn.publish(&cube("c1")).unwrap();

        let published = bus.published.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "scene/test");
        assert_eq!(published[0].qos, QoS::ExactlyOnce);
        assert!(!published[0].retain);

        let (action, meta) = codec::decode(&published[0].payload).unwrap();
        assert_eq!(action.object_id().as_str(), "c1");
        assert_eq!(meta.client_id.as_str(), "me");
        assert_eq!(meta.timestamp, 1_700_000_000);
    }

    #[tokio::test]
    async fn publish_failure_resolves_completion() {
        let bus = Arc::new(LoopbackBus::default());
        bus.fail_publish.store(true, Ordering::SeqCst);
        let conn = connection(&bus);
        conn.connect().unwrap();

        let completion = conn.publish(&cube("c1")).unwrap();
        assert_eq!(completion.wait().await, Err(PublishError::Bus(BusError::NotConnected)));
    }

    #[test]
    fn successful_publish_completes() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);
        conn.connect().unwrap();

        let mut completion = conn.publish(&cube("c1")).unwrap();
        assert_eq!(completion.try_result(), Some(Ok(())));
    }

    #[test]
    fn own_envelopes_are_never_enqueued() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);
        let id = ObjectId::new("c1").unwrap();

        let actions = [
            cube("c1"),
            Action::manipulate(id.clone(), Transform::IDENTITY),
            Action::delete(id),
        ];
        for action in &actions {
            assert_eq!(conn.handle_payload(&payload_from("me", action)), ReceiveOutcome::Echo);
        }
        assert!(conn.inbound().is_empty());
    }

    #[test]
    fn remote_envelopes_are_enqueued_in_order() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);

        conn.handle_payload(&payload_from("other", &cube("c1")));
        conn.handle_payload(&payload_from("other", &Action::delete(ObjectId::new("c1").unwrap())));

        let drained = conn.inbound().drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].operation(), OperationKind::Create);
        assert_eq!(drained[1].operation(), OperationKind::Delete);
    }

    #[test]
    fn malformed_payloads_are_dropped() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);

        assert_eq!(conn.handle_payload(b"\xff\xfe"), ReceiveOutcome::Malformed);
        assert_eq!(
            conn.handle_payload(br#"{"clientID":"x","timestamp":1,"type":7,"objectID":"c1"}"#),
            ReceiveOutcome::Malformed
        );
        assert!(conn.inbound().is_empty());
    }

    #[test]
    fn bus_delivery_goes_through_sink() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);
        conn.connect().unwrap();

        let sink = bus.sink.lock().clone().unwrap();
        sink.on_message("scene/test", &payload_from("other", &cube("c9")));

        assert_eq!(conn.inbound().len(), 1);
    }

    #[test]
    fn link_loss_disconnects_and_allows_reconnect() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);
        conn.connect().unwrap();

        let sink = bus.sink.lock().clone().unwrap();
        sink.on_link_lost("broker went away");
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(matches!(conn.publish(&cube("c1")), Err(ConnectionError::NotConnected)));

        conn.connect().unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let bus = Arc::new(LoopbackBus::default());
        let conn = connection(&bus);
        conn.connect().unwrap();

        conn.shutdown();
        conn.shutdown();
        drop(conn);

        assert_eq!(bus.disconnects.load(Ordering::SeqCst), 1);
    }
}
