//! Client identity.
//!
//! Every process mints one [`ClientId`] at startup and stamps it on each
//! envelope it publishes. The only thing it is ever used for is recognising
//! our own messages when the bus hands them back.

use std::fmt;

use uuid::Builder;

use crate::{ActionError, Environment};

/// Identity of one participating client process.
///
/// Random v4 UUIDs, so two processes collide only with negligible
/// probability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Mint a fresh identity.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut bytes = [0u8; 16];
        env.random_bytes(&mut bytes);
        Self(Builder::from_random_bytes(bytes).into_uuid().to_string())
    }

    /// Adopt an identity chosen elsewhere (tests, fixed deployments).
    ///
    /// # Errors
    ///
    /// [`ActionError::EmptyClientId`] if `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ActionError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ActionError::EmptyClientId);
        }
        Ok(Self(id))
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `origin` (a received `clientID`) is this client.
    pub fn is_origin_of(&self, origin: &str) -> bool {
        self.0 == origin
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemEnv;

    #[test]
    fn generated_identities_differ() {
        let a = ClientId::generate(&SystemEnv);
        let b = ClientId::generate(&SystemEnv);
        assert_ne!(a, b);
    }

    #[test]
    fn recognises_own_origin() {
        let me = ClientId::new("alice").unwrap();
        assert!(me.is_origin_of("alice"));
        assert!(!me.is_origin_of("bob"));
        assert!(!me.is_origin_of(""));
    }

    #[test]
    fn empty_identity_is_rejected() {
        assert_eq!(ClientId::new(""), Err(ActionError::EmptyClientId));
    }
}
