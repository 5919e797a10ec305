//! In-process publish/subscribe broker.
//!
//! [`MemoryBroker`] routes messages between any number of [`MemoryBus`]
//! client handles. Like a real MQTT broker it delivers a message to every
//! subscriber of the topic, including the publisher itself, which is what
//! makes echo suppression observable in tests.
//!
//! # Fault injection
//!
//! - [`Delivery::Deferred`] holds messages and their acknowledgements until
//!   [`MemoryBroker::flush`], so tests can interleave ticks with in-flight
//!   traffic.
//! - [`MemoryBroker::duplicate_deliveries`] hands every message over twice,
//!   as an at-least-once broker may.
//! - [`MemoryBroker::drop_next`] loses messages in transit while still
//!   acknowledging them to the publisher.
//! - [`MemoryBroker::reject_publishes`] fails publishes at the broker.
//! - [`MemoryBus::sever`] kills one client's link.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    thread,
};

use holoshare_core::{Bus, BusError, BusEvents, BusMessage, PublishCallback, SessionConfig};
use holoshare_proto::QoS;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// When the broker hands messages to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// During the publish call.
    #[default]
    Immediate,
    /// On the next [`MemoryBroker::flush`].
    Deferred,
}

struct Session {
    events: Arc<dyn BusEvents>,
    subscriptions: Vec<String>,
}

struct InFlight {
    message: BusMessage,
    on_complete: PublishCallback,
}

#[derive(Default)]
struct BrokerState {
    sessions: HashMap<u64, Session>,
    next_session: u64,
    delivery: Delivery,
    in_flight: VecDeque<InFlight>,
    drop_next: usize,
    duplicate: bool,
    reject_publishes: bool,
    refuse_connects: bool,
    published: usize,
    delivered: usize,
}

/// Shared in-process broker. Clones refer to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    /// Broker delivering during each publish call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker with the given delivery mode.
    pub fn with_delivery(delivery: Delivery) -> Self {
        let broker = Self::default();
        broker.set_delivery(delivery);
        broker
    }

    /// New client handle on this broker.
    pub fn client(&self) -> MemoryBus {
        MemoryBus { broker: self.clone(), session: Mutex::new(None) }
    }

    /// Switch delivery mode. Messages already held stay held until flushed.
    pub fn set_delivery(&self, delivery: Delivery) {
        self.state.lock().delivery = delivery;
    }

    /// Deliver every held message and complete its publish, in publish order.
    ///
    /// Returns how many messages were flushed.
    pub fn flush(&self) -> usize {
        let held: Vec<InFlight> = self.state.lock().in_flight.drain(..).collect();
        let count = held.len();
        for InFlight { message, on_complete } in held {
            self.route(&message);
            on_complete(Ok(()));
        }
        count
    }

    /// [`MemoryBroker::flush`] from a separate thread, the way a network
    /// client's event loop would call back.
    pub fn flush_from_thread(&self) -> usize {
        let broker = self.clone();
        thread::spawn(move || broker.flush()).join().unwrap_or(0)
    }

    /// Messages currently held for deferred delivery.
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Deliver every message twice.
    pub fn duplicate_deliveries(&self, enabled: bool) {
        self.state.lock().duplicate = enabled;
    }

    /// Lose the next `count` messages after accepting them.
    pub fn drop_next(&self, count: usize) {
        self.state.lock().drop_next = count;
    }

    /// Fail publishes at the broker.
    pub fn reject_publishes(&self, enabled: bool) {
        self.state.lock().reject_publishes = enabled;
    }

    /// Refuse new connections.
    pub fn refuse_connects(&self, enabled: bool) {
        self.state.lock().refuse_connects = enabled;
    }

    /// Publishes accepted so far.
    pub fn published(&self) -> usize {
        self.state.lock().published
    }

    /// Individual message hand-offs to subscribers so far.
    pub fn delivered(&self) -> usize {
        self.state.lock().delivered
    }

    /// Connected sessions.
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    fn accept(&self, message: BusMessage, on_complete: PublishCallback) {
        let delivery = {
            let mut state = self.state.lock();
            if state.reject_publishes {
                drop(state);
                on_complete(Err(BusError::Rejected("broker rejecting publishes".to_string())));
                return;
            }
            state.published += 1;
            state.delivery
        };

        match delivery {
            Delivery::Immediate => {
                self.route(&message);
                on_complete(Ok(()));
            },
            Delivery::Deferred => {
                self.state.lock().in_flight.push_back(InFlight { message, on_complete });
            },
        }
    }

    fn route(&self, message: &BusMessage) {
        // Subscribers are called without the broker lock so they may publish.
        let (targets, copies) = {
            let mut state = self.state.lock();
            if state.drop_next > 0 {
                state.drop_next -= 1;
                debug!(topic = %message.topic, "dropping message in transit");
                return;
            }
            let targets: Vec<Arc<dyn BusEvents>> = state
                .sessions
                .values()
                .filter(|session| session.subscriptions.iter().any(|t| *t == message.topic))
                .map(|session| session.events.clone())
                .collect();
            let copies = if state.duplicate { 2 } else { 1 };
            state.delivered += targets.len() * copies;
            (targets, copies)
        };

        for _ in 0..copies {
            for events in &targets {
                trace!(topic = %message.topic, len = message.payload.len(), "deliver");
                events.on_message(&message.topic, &message.payload);
            }
        }
    }
}

/// One client's handle on a [`MemoryBroker`].
pub struct MemoryBus {
    broker: MemoryBroker,
    session: Mutex<Option<u64>>,
}

impl MemoryBus {
    /// Broker this handle talks to.
    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    /// Whether the handle holds a live session.
    pub fn is_linked(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Kill the link as a network failure would, notifying the client.
    pub fn sever(&self, reason: &str) {
        let Some(id) = self.session.lock().take() else {
            return;
        };
        let session = self.broker.state.lock().sessions.remove(&id);
        if let Some(session) = session {
            session.events.on_link_lost(reason);
        }
    }
}

impl Bus for MemoryBus {
    fn connect(&self, config: &SessionConfig, events: Arc<dyn BusEvents>) -> Result<(), BusError> {
        let mut state = self.broker.state.lock();
        if state.refuse_connects {
            return Err(BusError::Rejected(format!("{} refused connection", config.broker_url)));
        }

        let id = state.next_session;
        state.next_session += 1;
        state.sessions.insert(id, Session { events, subscriptions: Vec::new() });
        drop(state);

        if let Some(previous) = self.session.lock().replace(id) {
            self.broker.state.lock().sessions.remove(&previous);
        }
        debug!(session = id, "session opened");
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BusError> {
        let id = self.session.lock().ok_or(BusError::NotConnected)?;
        let mut state = self.broker.state.lock();
        let session = state.sessions.get_mut(&id).ok_or(BusError::NotConnected)?;
        if !session.subscriptions.iter().any(|t| t == topic) {
            session.subscriptions.push(topic.to_string());
        }
        debug!(session = id, topic, qos = qos.level(), "subscribed");
        Ok(())
    }

    fn publish(&self, message: BusMessage, on_complete: PublishCallback) {
        let linked = {
            let session = *self.session.lock();
            session.is_some_and(|id| self.broker.state.lock().sessions.contains_key(&id))
        };
        if !linked {
            on_complete(Err(BusError::NotConnected));
            return;
        }
        self.broker.accept(message, on_complete);
    }

    fn disconnect(&self) {
        if let Some(id) = self.session.lock().take() {
            self.broker.state.lock().sessions.remove(&id);
            debug!(session = id, "session closed");
        }
    }
}
