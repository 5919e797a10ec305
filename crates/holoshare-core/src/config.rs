//! Session configuration.

use std::time::Duration;

use holoshare_proto::QoS;

/// Settings shared by every client joining one scene session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Topic all envelopes for this scene are published and received on.
    pub topic: String,
    /// Broker endpoint, handed to the bus implementation untouched.
    pub broker_url: String,
    /// Delivery guarantee requested for scene updates.
    pub qos: QoS,
    /// Ask the broker to retain the last envelope for late joiners.
    pub retain: bool,
    /// Start without broker-side session state.
    pub clean_session: bool,
    /// Broker keep-alive period.
    pub keep_alive: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            topic: "testtopic/objectSpawnTest123".to_string(),
            broker_url: "broker.mqttdashboard.com:8000/mqtt".to_string(),
            qos: QoS::ExactlyOnce,
            retain: false,
            clean_session: true,
            keep_alive: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    /// Default settings on a different topic.
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self { topic: topic.into(), ..Self::default() }
    }
}
