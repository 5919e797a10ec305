//! Delivery guarantee requested from the bus.

/// Quality-of-service level attached to a published message.
///
/// Scene updates ask for [`QoS::ExactlyOnce`]. Brokers that cannot honour it
/// downgrade silently, which is why receivers treat creates idempotently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget, no acknowledgement.
    AtMostOnce = 0,
    /// Acknowledged, may be redelivered.
    AtLeastOnce = 1,
    /// Four-way handshake, delivered once.
    #[default]
    ExactlyOnce = 2,
}

impl QoS {
    /// Level code as used by MQTT-style brokers.
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Parse an MQTT-style level code.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }
}
