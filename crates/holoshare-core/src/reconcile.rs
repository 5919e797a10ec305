//! Reconciliation loop.
//!
//! [`SceneReplica::tick`] runs once per frame (or any periodic driver) and
//! does two strictly sequential things:
//!
//! 1. **Apply**: drain the inbound queue and apply every remote action to the
//!    registry through the factory.
//! 2. **Detect**: scan every registered object, publish a Manipulate for each
//!    one whose dirty flag is set, then clear the flag.
//!
//! Applying a remote Manipulate never leaves the object dirty. Otherwise the
//! detect phase would republish every remote move and two clients would
//! bounce the same transform back and forth forever.
//!
//! # Convergence
//!
//! With no new local edits and an empty queue, a tick changes nothing and
//! publishes nothing. Conflicting concurrent moves resolve last-write-wins in
//! arrival order.

use std::ops::AddAssign;

use holoshare_proto::ObjectKind;
use tracing::{debug, trace, warn};

use crate::{
    Action, ApplyOutcome, InboundQueue, ObjectFactory, ObjectId, ObjectRegistry, Publisher,
    ReplicaError, Transform, registry::RegistryEntry,
};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Remote creates that produced a new object.
    pub spawned: usize,
    /// Remote deletes that removed an object.
    pub deleted: usize,
    /// Remote manipulates that moved an object.
    pub moved: usize,
    /// Remote creates for ids already present.
    pub duplicate_creates: usize,
    /// Remote deletes for unknown ids.
    pub unknown_deletes: usize,
    /// Remote manipulates for unknown ids.
    pub unknown_manipulates: usize,
    /// Manipulates handed to the publisher by the detect phase.
    pub published: usize,
    /// Detect-phase publishes the publisher refused outright.
    pub publish_failures: usize,
}

impl TickReport {
    /// Number of inbound actions the apply phase consumed.
    pub fn applied(&self) -> usize {
        self.spawned
            + self.deleted
            + self.moved
            + self.duplicate_creates
            + self.unknown_deletes
            + self.unknown_manipulates
    }

    /// Whether the tick left the registry untouched.
    pub fn registry_unchanged(&self) -> bool {
        self.spawned == 0 && self.deleted == 0 && self.moved == 0
    }

    /// Whether the tick neither changed the scene nor published anything.
    pub fn is_quiescent(&self) -> bool {
        self.registry_unchanged() && self.published == 0 && self.publish_failures == 0
    }

    fn record(&mut self, outcome: ApplyOutcome) {
        let counter = match outcome {
            ApplyOutcome::Spawned => &mut self.spawned,
            ApplyOutcome::Deleted => &mut self.deleted,
            ApplyOutcome::Moved => &mut self.moved,
            ApplyOutcome::DuplicateCreate => &mut self.duplicate_creates,
            ApplyOutcome::DeleteOfUnknown => &mut self.unknown_deletes,
            ApplyOutcome::ManipulateOfUnknown => &mut self.unknown_manipulates,
        };
        *counter += 1;
    }
}

impl AddAssign for TickReport {
    fn add_assign(&mut self, other: Self) {
        self.spawned += other.spawned;
        self.deleted += other.deleted;
        self.moved += other.moved;
        self.duplicate_creates += other.duplicate_creates;
        self.unknown_deletes += other.unknown_deletes;
        self.unknown_manipulates += other.unknown_manipulates;
        self.published += other.published;
        self.publish_failures += other.publish_failures;
    }
}

/// A client's local copy of the shared scene.
///
/// Owns the registry and the factory behind it. Everything here runs on the
/// tick driver; nothing is shared with bus threads.
pub struct SceneReplica<F: ObjectFactory> {
    factory: F,
    registry: ObjectRegistry<F::Handle>,
}

impl<F: ObjectFactory> SceneReplica<F> {
    /// Empty scene backed by `factory`.
    pub fn new(factory: F) -> Self {
        Self { factory, registry: ObjectRegistry::new() }
    }

    /// Registered objects.
    pub fn registry(&self) -> &ObjectRegistry<F::Handle> {
        &self.registry
    }

    /// Backing factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Backing factory, for local edits.
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// Registry entry for `id`.
    pub fn entry(&self, id: &str) -> Option<&RegistryEntry<F::Handle>> {
        self.registry.get(id)
    }

    /// Current transform of `id`.
    pub fn transform_of(&self, id: &str) -> Option<Transform> {
        self.registry.get(id).map(|entry| self.factory.transform(entry.handle()))
    }

    /// Run one apply-then-detect cycle.
    pub fn tick<P: Publisher + ?Sized>(&mut self, inbound: &InboundQueue, publisher: &P) -> TickReport {
        let mut report = TickReport::default();

        for action in inbound.drain_all() {
            let outcome = self.apply(action);
            if !outcome.changed() {
                debug!(?outcome, "remote action left scene unchanged");
            }
            report.record(outcome);
        }

        self.detect(publisher, &mut report);

        if !report.is_quiescent() {
            debug!(?report, "tick");
        }
        report
    }

    /// Apply one remote action.
    pub fn apply(&mut self, action: Action) -> ApplyOutcome {
        match action {
            Action::SpawnCube { object_id, transform } => {
                self.spawn(ObjectKind::Cube, object_id, &transform)
            },
            Action::SpawnSphere { object_id, transform } => {
                self.spawn(ObjectKind::Sphere, object_id, &transform)
            },
            Action::SpawnSkeleton { object_id, transform } => {
                self.spawn(ObjectKind::Skeleton, object_id, &transform)
            },
            Action::Delete { object_id } => self.delete(&object_id),
            Action::Manipulate { object_id, transform } => self.manipulate(&object_id, &transform),
        }
    }

    /// Create an object locally and announce it.
    ///
    /// The object enters the registry clean; its initial transform travels in
    /// the Create itself. A publish failure is logged and not retried.
    ///
    /// # Errors
    ///
    /// [`ReplicaError::DuplicateObject`] if `object_id` is already present.
    pub fn spawn_local<P: Publisher + ?Sized>(
        &mut self,
        kind: ObjectKind,
        object_id: ObjectId,
        transform: Transform,
        publisher: &P,
    ) -> Result<(), ReplicaError> {
        if self.registry.contains(object_id.as_str()) {
            return Err(ReplicaError::DuplicateObject(object_id));
        }

        match self.spawn(kind, object_id.clone(), &transform) {
            ApplyOutcome::Spawned => {},
            _ => return Err(ReplicaError::DuplicateObject(object_id)),
        }

        let action = Action::spawn(kind, object_id, transform);
        if let Err(err) = publisher.publish(&action) {
            warn!(object_id = %action.object_id(), error = %err, "create not published");
        }
        Ok(())
    }

    /// Remove an object locally and announce it.
    ///
    /// Returns `false`, publishing nothing, if `object_id` is unknown.
    pub fn delete_local<P: Publisher + ?Sized>(&mut self, object_id: &ObjectId, publisher: &P) -> bool {
        if self.delete(object_id) != ApplyOutcome::Deleted {
            return false;
        }

        if let Err(err) = publisher.publish(&Action::delete(object_id.clone())) {
            warn!(%object_id, error = %err, "delete not published");
        }
        true
    }

    fn spawn(&mut self, kind: ObjectKind, object_id: ObjectId, transform: &Transform) -> ApplyOutcome {
        if self.registry.contains(object_id.as_str()) {
            debug!(%object_id, %kind, "ignoring duplicate create");
            return ApplyOutcome::DuplicateCreate;
        }

        let handle = self.factory.spawn(kind, transform);
        self.factory.clear_dirty(&handle);
        trace!(%object_id, %kind, "spawned");
        match self.registry.insert(object_id, kind, handle) {
            Ok(()) => ApplyOutcome::Spawned,
            Err(handle) => {
                self.factory.destroy(handle);
                ApplyOutcome::DuplicateCreate
            },
        }
    }

    fn delete(&mut self, object_id: &ObjectId) -> ApplyOutcome {
        match self.registry.remove(object_id.as_str()) {
            Some(handle) => {
                self.factory.destroy(handle);
                trace!(%object_id, "deleted");
                ApplyOutcome::Deleted
            },
            None => {
                debug!(%object_id, "ignoring delete of unknown object");
                ApplyOutcome::DeleteOfUnknown
            },
        }
    }

    fn manipulate(&mut self, object_id: &ObjectId, transform: &Transform) -> ApplyOutcome {
        let Some(entry) = self.registry.get(object_id.as_str()) else {
            debug!(%object_id, "ignoring manipulate of unknown object");
            return ApplyOutcome::ManipulateOfUnknown;
        };

        self.factory.set_transform(entry.handle(), transform);
        self.factory.clear_dirty(entry.handle());
        trace!(%object_id, "moved");
        ApplyOutcome::Moved
    }

    fn detect<P: Publisher + ?Sized>(&mut self, publisher: &P, report: &mut TickReport) {
        for (object_id, entry) in self.registry.iter() {
            if !self.factory.is_dirty(entry.handle()) {
                continue;
            }

            let action = Action::manipulate(object_id.clone(), self.factory.transform(entry.handle()));
            match publisher.publish(&action) {
                Ok(_) => report.published += 1,
                Err(err) => {
                    warn!(%object_id, error = %err, "manipulate not published");
                    report.publish_failures += 1;
                },
            }
            self.factory.clear_dirty(entry.handle());
        }
    }
}
