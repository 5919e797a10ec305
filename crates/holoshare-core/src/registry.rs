//! Object registry.
//!
//! Local authoritative view of the shared scene: at most one entry per
//! object id. An entry exists iff a Create for that id has been applied
//! (locally or remotely) and no Delete has been applied since.
//!
//! Only the reconciliation loop mutates the registry, so insertion and
//! removal are crate-private.

use std::collections::{HashMap, hash_map::Entry};

use holoshare_proto::ObjectKind;

use crate::ObjectId;

/// How one action landed on the registry.
///
/// The last three are benign races between uncoordinated writers and leave
/// the registry untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new entry was created.
    Spawned,
    /// An entry was removed.
    Deleted,
    /// An entry's transform was overwritten.
    Moved,
    /// Create for an id that already exists (duplicate delivery).
    DuplicateCreate,
    /// Delete for an id that is not present.
    DeleteOfUnknown,
    /// Manipulate for an id that is not present.
    ManipulateOfUnknown,
}

impl ApplyOutcome {
    /// Whether the registry or an object changed.
    pub fn changed(self) -> bool {
        matches!(self, Self::Spawned | Self::Deleted | Self::Moved)
    }
}

/// One registered object.
#[derive(Debug)]
pub struct RegistryEntry<H> {
    kind: ObjectKind,
    handle: H,
}

impl<H> RegistryEntry<H> {
    /// Primitive kind. Fixed at creation.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Factory handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }
}

/// Object id to handle mapping.
#[derive(Debug)]
pub struct ObjectRegistry<H> {
    entries: HashMap<ObjectId, RegistryEntry<H>>,
}

impl<H> ObjectRegistry<H> {
    /// Empty registry.
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scene is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Entry for `id`.
    pub fn get(&self, id: &str) -> Option<&RegistryEntry<H>> {
        self.entries.get(id)
    }

    /// Registered ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.entries.keys()
    }

    /// All entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &RegistryEntry<H>)> {
        self.entries.iter()
    }

    /// Insert unless `id` is taken. On conflict the handle is handed back.
    pub(crate) fn insert(&mut self, id: ObjectId, kind: ObjectKind, handle: H) -> Result<(), H> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(handle),
            Entry::Vacant(slot) => {
                slot.insert(RegistryEntry { kind, handle });
                Ok(())
            },
        }
    }

    /// Remove and return the handle for `id`.
    pub(crate) fn remove(&mut self, id: &str) -> Option<H> {
        self.entries.remove(id).map(|entry| entry.handle)
    }
}

impl<H> Default for ObjectRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
