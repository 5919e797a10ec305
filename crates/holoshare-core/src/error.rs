//! Error types for the replication core.
//!
//! Races between uncoordinated writers (duplicate creates, deletes or moves of
//! unknown objects) are not errors; they surface as
//! [`crate::ApplyOutcome`] values. Likewise an echoed message is a
//! [`crate::ReceiveOutcome`], not a failure.

use holoshare_proto::PayloadError;
use thiserror::Error;

use crate::{ObjectId, connection::ConnectionState};

/// Invalid input to an action or identity constructor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Object ids must be non-empty.
    #[error("object id must not be empty")]
    EmptyObjectId,

    /// Client ids must be non-empty.
    #[error("client id must not be empty")]
    EmptyClientId,

    /// A transform component is NaN or infinite.
    #[error("transform {field} contains a non-finite component")]
    NonFiniteTransform {
        /// Which part of the transform was rejected.
        field: &'static str,
    },
}

/// Failure reported by a bus implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The link to the broker is down.
    #[error("not connected to broker")]
    NotConnected,

    /// The broker refused the request.
    #[error("broker rejected request: {0}")]
    Rejected(String),

    /// The bus has been shut down for good.
    #[error("bus closed")]
    Closed,
}

/// Errors from the connection adapter.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Publish attempted while the link is not up.
    #[error("connection is not established")]
    NotConnected,

    /// Operation not valid in the current state.
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// State the connection was in.
        state: ConnectionState,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// Outbound action could not be encoded.
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] PayloadError),

    /// The bus refused connect or subscribe.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

/// Asynchronous failure of a submitted publish.
///
/// The connection logs these itself; callers only see them if they choose to
/// await a [`crate::PublishCompletion`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The bus reported the publish as failed.
    #[error("publish failed: {0}")]
    Bus(#[from] BusError),

    /// The bus dropped the request without reporting an outcome.
    #[error("publish abandoned by transport")]
    Abandoned,
}

/// Errors from local scene intents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaError {
    /// A local spawn reused an id that is already in the registry.
    #[error("object {0} already exists")]
    DuplicateObject(ObjectId),
}
