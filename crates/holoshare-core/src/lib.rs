//! Holoshare replication core
//!
//! Keeps a local scene of 3-D primitives consistent with remote clients that
//! edit the same scene, using nothing but a publish/subscribe bus. There is no
//! central authority: every client publishes its own edits, applies everyone
//! else's, and ignores its own when the bus echoes them back.
//!
//! # Architecture
//!
//! ```text
//!   local edit ──► SceneReplica::tick (detect) ──► Connection::publish ──► Bus
//!                                                                          │
//!   SceneReplica::tick (apply) ◄── InboundQueue ◄── Connection (decode,    │
//!                                                   echo filter) ◄─────────┘
//! ```
//!
//! Only the [`InboundQueue`] is shared between the bus's callback threads and
//! the tick driver. Everything the tick touches (registry, dirty flags) is
//! owned by a single [`SceneReplica`] and needs no locking.
//!
//! # Components
//!
//! - [`action`]: Scene mutation values and their spatial payload
//! - [`identity`]: Per-process client identity used for echo suppression
//! - [`codec`]: Mapping between actions and wire envelopes
//! - [`transport`]: Bus abstraction consumed by the connection
//! - [`connection`]: Connection state machine, publish path, receive path
//! - [`queue`]: Thread-safe inbound action hand-off
//! - [`factory`]: External object factory the replica drives
//! - [`registry`]: Object id to handle mapping
//! - [`reconcile`]: Per-tick apply and detect phases
//! - [`config`]: Session configuration
//! - [`mod@env`]: Environment abstraction (time, RNG)
//! - [`error`]: Error types

pub mod action;
pub mod codec;
pub mod config;
pub mod connection;
pub mod env;
pub mod error;
pub mod factory;
pub mod identity;
pub mod queue;
pub mod reconcile;
pub mod registry;
pub mod transport;

pub use action::{Action, ObjectId, Transform};
pub use codec::EnvelopeMeta;
pub use config::SessionConfig;
pub use connection::{
    Connection, ConnectionState, PublishCompletion, Publisher, ReceiveOutcome,
};
pub use env::{Environment, SystemEnv};
pub use error::{ActionError, BusError, ConnectionError, PublishError, ReplicaError};
pub use factory::ObjectFactory;
pub use holoshare_proto::{ObjectKind, OperationKind, QoS};
pub use identity::ClientId;
pub use queue::InboundQueue;
pub use reconcile::{SceneReplica, TickReport};
pub use registry::{ApplyOutcome, ObjectRegistry, RegistryEntry};
pub use transport::{Bus, BusEvents, BusMessage, PublishCallback};
