//! Headless object factory.
//!
//! [`SimScene`] plays the part of a rendering engine: it owns the live
//! objects, marks them dirty on every transform write, and lets tests play
//! the user through [`SimScene::user_move`].

use std::collections::HashMap;

use glam::Vec3;
use holoshare_core::{ObjectFactory, ObjectKind, Transform};
use tracing::warn;

/// Handle to one simulated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimHandle(u64);

/// One live simulated object.
#[derive(Debug, Clone, PartialEq)]
pub struct SimObject {
    /// Primitive kind it was spawned as.
    pub kind: ObjectKind,
    /// Current transform.
    pub transform: Transform,
    /// Set on every transform write, cleared by the replica.
    pub dirty: bool,
}

/// In-memory scene.
#[derive(Debug, Default)]
pub struct SimScene {
    next_handle: u64,
    objects: HashMap<SimHandle, SimObject>,
    spawned: usize,
    destroyed: usize,
}

impl SimScene {
    /// Empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Object behind `handle`, if still alive.
    pub fn object(&self, handle: SimHandle) -> Option<&SimObject> {
        self.objects.get(&handle)
    }

    /// Live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is alive.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects instantiated so far.
    pub fn spawned(&self) -> usize {
        self.spawned
    }

    /// Objects torn down so far.
    pub fn destroyed(&self) -> usize {
        self.destroyed
    }

    /// Drag an object to `position`, as a user would.
    ///
    /// Returns `false` if the handle is stale.
    pub fn user_move(&mut self, handle: SimHandle, position: Vec3) -> bool {
        let Some(object) = self.objects.get_mut(&handle) else {
            return false;
        };
        match object.transform.with_position(position) {
            Ok(transform) => {
                object.transform = transform;
                object.dirty = true;
                true
            },
            Err(err) => {
                warn!(?handle, error = %err, "rejected user move");
                false
            },
        }
    }
}

impl ObjectFactory for SimScene {
    type Handle = SimHandle;

    fn spawn(&mut self, kind: ObjectKind, transform: &Transform) -> SimHandle {
        self.next_handle += 1;
        let handle = SimHandle(self.next_handle);
        self.objects.insert(handle, SimObject { kind, transform: *transform, dirty: true });
        self.spawned += 1;
        handle
    }

    fn destroy(&mut self, handle: SimHandle) {
        if self.objects.remove(&handle).is_some() {
            self.destroyed += 1;
        }
    }

    fn transform(&self, handle: &SimHandle) -> Transform {
        self.objects.get(handle).map_or(Transform::IDENTITY, |object| object.transform)
    }

    fn set_transform(&mut self, handle: &SimHandle, transform: &Transform) {
        if let Some(object) = self.objects.get_mut(handle) {
            object.transform = *transform;
            object.dirty = true;
        }
    }

    fn is_dirty(&self, handle: &SimHandle) -> bool {
        self.objects.get(handle).is_some_and(|object| object.dirty)
    }

    fn clear_dirty(&mut self, handle: &SimHandle) {
        if let Some(object) = self.objects.get_mut(handle) {
            object.dirty = false;
        }
    }
}
