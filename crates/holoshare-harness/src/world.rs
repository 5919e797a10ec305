//! Multi-client simulation.
//!
//! A [`World`] is a set of [`SimClient`]s joined to one [`MemoryBroker`].
//! Each client is the full production stack (connection, inbound queue,
//! replica) over a [`SimScene`]; only the broker and the scene are doubles.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use holoshare_core::{
    ClientId, Connection, ConnectionError, InboundQueue, ObjectFactory, ObjectId, ObjectKind,
    ReplicaError, SceneReplica, SessionConfig, TickReport, Transform,
};
use tracing::debug;

use crate::{MemoryBroker, MemoryBus, SimEnv, SimScene};

/// Kind and transform of every object a client holds, keyed by id.
pub type Snapshot = BTreeMap<String, (ObjectKind, Transform)>;

/// One simulated participant.
pub struct SimClient {
    name: String,
    env: SimEnv,
    connection: Connection<MemoryBus, SimEnv>,
    replica: SceneReplica<SimScene>,
}

impl SimClient {
    /// Label given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Production connection.
    pub fn connection(&self) -> &Connection<MemoryBus, SimEnv> {
        &self.connection
    }

    /// Production replica.
    pub fn replica(&self) -> &SceneReplica<SimScene> {
        &self.replica
    }

    /// One reconciliation tick.
    pub fn tick(&mut self) -> TickReport {
        self.replica.tick(self.connection.inbound(), &self.connection)
    }

    /// Spawn `object_id` locally and announce it.
    pub fn spawn(
        &mut self,
        kind: ObjectKind,
        object_id: ObjectId,
        transform: Transform,
    ) -> Result<(), ReplicaError> {
        self.replica.spawn_local(kind, object_id, transform, &self.connection)
    }

    /// Spawn under a freshly generated id.
    pub fn spawn_new(
        &mut self,
        kind: ObjectKind,
        transform: Transform,
    ) -> Result<ObjectId, ReplicaError> {
        let object_id = ObjectId::generate(&self.env);
        self.spawn(kind, object_id.clone(), transform)?;
        Ok(object_id)
    }

    /// Drag `object_id` to `position`. The move goes out on the next tick.
    ///
    /// Returns `false` if the object is not in this client's scene.
    pub fn move_object(&mut self, object_id: &str, position: Vec3) -> bool {
        let Some(handle) = self.replica.entry(object_id).map(|entry| *entry.handle()) else {
            return false;
        };
        self.replica.factory_mut().user_move(handle, position)
    }

    /// Delete `object_id` locally and announce it.
    pub fn delete(&mut self, object_id: &ObjectId) -> bool {
        self.replica.delete_local(object_id, &self.connection)
    }

    /// Ids currently in the registry.
    pub fn ids(&self) -> BTreeSet<String> {
        self.replica.registry().ids().map(|id| id.as_str().to_string()).collect()
    }

    /// Current transform of `object_id`.
    pub fn transform_of(&self, object_id: &str) -> Option<Transform> {
        self.replica.transform_of(object_id)
    }

    /// Full view of this client's scene.
    pub fn snapshot(&self) -> Snapshot {
        self.replica
            .registry()
            .iter()
            .map(|(id, entry)| {
                let transform = self.replica.factory().transform(entry.handle());
                (id.as_str().to_string(), (entry.kind(), transform))
            })
            .collect()
    }

    /// Kill this client's broker link.
    pub fn sever(&self, reason: &str) {
        self.connection.bus().sever(reason);
    }

    /// Re-establish the link after [`SimClient::sever`].
    pub fn reconnect(&self) -> Result<(), ConnectionError> {
        self.connection.connect()
    }
}

/// Several clients sharing one broker and one simulated clock.
pub struct World {
    broker: MemoryBroker,
    env: SimEnv,
    config: SessionConfig,
    clients: Vec<SimClient>,
}

impl World {
    /// Empty world with an immediate-delivery broker.
    pub fn new(seed: u64) -> Self {
        Self::with_broker(MemoryBroker::new(), seed)
    }

    /// Empty world on an existing broker.
    pub fn with_broker(broker: MemoryBroker, seed: u64) -> Self {
        Self::with_config(broker, SessionConfig::with_topic("holoshare/sim"), seed)
    }

    /// Empty world whose clients join with `config`.
    pub fn with_config(broker: MemoryBroker, config: SessionConfig, seed: u64) -> Self {
        Self { broker, env: SimEnv::with_seed(seed), config, clients: Vec::new() }
    }

    /// Shared broker, for fault injection.
    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    /// Session every client joins.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Join a new client and connect it. Returns its index.
    pub fn add_client(&mut self, name: &str) -> Result<usize, ConnectionError> {
        let connection = Connection::new(
            self.broker.client(),
            self.env.clone(),
            self.config.clone(),
            ClientId::generate(&self.env),
            InboundQueue::new(),
        );
        connection.connect()?;

        self.clients.push(SimClient {
            name: name.to_string(),
            env: self.env.clone(),
            connection,
            replica: SceneReplica::new(SimScene::new()),
        });
        Ok(self.clients.len() - 1)
    }

    /// Number of clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client has joined.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Client at `index`.
    pub fn client(&self, index: usize) -> &SimClient {
        &self.clients[index]
    }

    /// Client at `index`, mutably.
    pub fn client_mut(&mut self, index: usize) -> &mut SimClient {
        &mut self.clients[index]
    }

    /// All clients.
    pub fn clients(&self) -> &[SimClient] {
        &self.clients
    }

    /// Tick every client once, in join order.
    pub fn tick_all(&mut self) -> Vec<TickReport> {
        self.clients.iter_mut().map(SimClient::tick).collect()
    }

    /// Flush and tick until a round changes nothing, or `max_rounds` pass.
    ///
    /// Returns the number of rounds it took, or `None` if the world was still
    /// busy at the limit.
    pub fn settle(&mut self, max_rounds: usize) -> Option<usize> {
        for round in 1..=max_rounds {
            let flushed = self.broker.flush();
            let reports = self.tick_all();
            self.env.advance(1);
            if flushed == 0 && reports.iter().all(TickReport::is_quiescent) {
                debug!(round, "world settled");
                return Some(round);
            }
        }
        None
    }

    /// Whether every client holds the same scene.
    pub fn converged(&self) -> bool {
        let mut snapshots = self.clients.iter().map(SimClient::snapshot);
        let Some(first) = snapshots.next() else {
            return true;
        };
        snapshots.all(|snapshot| snapshot == first)
    }
}
