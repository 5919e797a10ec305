//! Publish/subscribe bus abstraction.
//!
//! The connection adapter only needs four things from a broker client:
//! connect with an event sink, subscribe to a topic, publish without
//! blocking, and disconnect. Reconnect, TLS and keep-alive handling stay
//! inside the implementation. Production plugs in an MQTT client; tests use
//! the in-process broker from `holoshare-harness`.

use std::sync::Arc;

use holoshare_proto::QoS;

use crate::{BusError, SessionConfig};

/// Completion callback for a submitted publish.
///
/// Invoked exactly once, on whatever thread the bus finishes the publish.
pub type PublishCallback = Box<dyn FnOnce(Result<(), BusError>) + Send + 'static>;

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Destination topic.
    pub topic: String,
    /// Encoded envelope.
    pub payload: Vec<u8>,
    /// Requested delivery guarantee.
    pub qos: QoS,
    /// Retain flag.
    pub retain: bool,
}

/// Receiver for events the bus raises asynchronously.
///
/// Implementations must tolerate being called from any thread, concurrently
/// with the tick driver.
pub trait BusEvents: Send + Sync + 'static {
    /// A message arrived on a subscribed topic.
    fn on_message(&self, topic: &str, payload: &[u8]);

    /// The link to the broker dropped.
    fn on_link_lost(&self, reason: &str);
}

/// Client side of a publish/subscribe broker.
pub trait Bus: Send + Sync + 'static {
    /// Open the link and register the event sink.
    ///
    /// Returns once the broker has accepted the session.
    fn connect(&self, config: &SessionConfig, events: Arc<dyn BusEvents>) -> Result<(), BusError>;

    /// Subscribe to `topic` at `qos`.
    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BusError>;

    /// Submit `message` for delivery.
    ///
    /// Must not block on broker acknowledgement. The outcome is reported
    /// through `on_complete`.
    fn publish(&self, message: BusMessage, on_complete: PublishCallback);

    /// Close the link. Calling it on a closed link is a no-op.
    fn disconnect(&self);
}
