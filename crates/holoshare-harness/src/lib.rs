//! Deterministic simulation harness for holoshare replication tests.
//!
//! In-process stand-ins for everything the replication core treats as
//! external: a broker with fault injection, a scene that tracks dirty flags,
//! and a seeded environment. [`World`] wires several clients together so
//! tests can drive multi-writer scenarios tick by tick.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod memory_bus;
pub mod sim_env;
pub mod sim_scene;
pub mod world;

pub use memory_bus::{Delivery, MemoryBroker, MemoryBus};
pub use sim_env::SimEnv;
pub use sim_scene::{SimHandle, SimObject, SimScene};
pub use world::{SimClient, Snapshot, World};
