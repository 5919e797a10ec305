//! Scene mutation actions.
//!
//! An [`Action`] is one discrete intent to change the shared scene: spawn a
//! primitive, delete it, or overwrite its transform. Actions are immutable
//! values. The reconciliation loop consumes each one exactly once.
//!
//! Validation happens when the parts are built: an [`ObjectId`] is never
//! empty and a [`Transform`] never holds NaN or infinite components, so every
//! `Action` that exists is encodable.

use std::{
    borrow::Borrow,
    fmt,
    hash::{Hash, Hasher},
};

use glam::{Quat, Vec3};
use holoshare_proto::{ObjectKind, OperationKind, Pose, WireQuat, WireVec3};
use uuid::Builder;

use crate::{ActionError, Environment};

/// Stable identity of one scene object, shared by every client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap an externally supplied id.
    ///
    /// # Errors
    ///
    /// [`ActionError::EmptyObjectId`] if `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ActionError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ActionError::EmptyObjectId);
        }
        Ok(Self(id))
    }

    /// Mint a fresh random (v4) UUID id.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut bytes = [0u8; 16];
        env.random_bytes(&mut bytes);
        Self(Builder::from_random_bytes(bytes).into_uuid().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position, rotation and scale of a scene object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl Transform {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self =
        Self { position: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE };

    /// Build a transform from all three spatial components.
    ///
    /// # Errors
    ///
    /// [`ActionError::NonFiniteTransform`] naming the offending component.
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Result<Self, ActionError> {
        if !position.is_finite() {
            return Err(ActionError::NonFiniteTransform { field: "position" });
        }
        if !rotation.is_finite() {
            return Err(ActionError::NonFiniteTransform { field: "rotation" });
        }
        if !scale.is_finite() {
            return Err(ActionError::NonFiniteTransform { field: "scale" });
        }
        Ok(Self { position, rotation, scale })
    }

    /// Default placement for a freshly spawned primitive of `kind`.
    ///
    /// Cubes and spheres are a fifth of a metre across. Skeletons are larger
    /// and turned to face the spawning user.
    pub fn spawn_default(kind: ObjectKind, position: Vec3) -> Result<Self, ActionError> {
        match kind {
            ObjectKind::Cube | ObjectKind::Sphere => {
                Self::new(position, Quat::IDENTITY, Vec3::splat(0.2))
            },
            ObjectKind::Skeleton => Self::new(
                position,
                Quat::from_rotation_y(std::f32::consts::PI),
                Vec3::splat(0.4),
            ),
        }
    }

    /// World position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// World rotation.
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Local scale.
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Copy with a different position.
    pub fn with_position(self, position: Vec3) -> Result<Self, ActionError> {
        Self::new(position, self.rotation, self.scale)
    }

    /// Wire representation.
    pub fn to_pose(&self) -> Pose {
        let [x, y, z, w] = self.rotation.to_array();
        Pose {
            position: WireVec3::new(self.position.x, self.position.y, self.position.z),
            rotation: WireQuat::new(x, y, z, w),
            scale: WireVec3::new(self.scale.x, self.scale.y, self.scale.z),
        }
    }

    /// Rebuild from the wire representation. Components are taken verbatim;
    /// the rotation is not renormalised.
    pub fn from_pose(pose: &Pose) -> Result<Self, ActionError> {
        let Pose { position, rotation, scale } = pose;
        Self::new(
            Vec3::new(position.x, position.y, position.z),
            Quat::from_xyzw(rotation.x, rotation.y, rotation.z, rotation.w),
            Vec3::new(scale.x, scale.y, scale.z),
        )
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One scene mutation.
///
/// Two actions are equal when they target the same object, whatever they do
/// to it. Compare [`Action::operation`] and [`Action::transform`] when the
/// content matters.
#[derive(Debug, Clone)]
pub enum Action {
    /// Instantiate a cube.
    SpawnCube {
        /// New object's id.
        object_id: ObjectId,
        /// Initial transform.
        transform: Transform,
    },
    /// Instantiate a sphere.
    SpawnSphere {
        /// New object's id.
        object_id: ObjectId,
        /// Initial transform.
        transform: Transform,
    },
    /// Instantiate a skeleton model.
    SpawnSkeleton {
        /// New object's id.
        object_id: ObjectId,
        /// Initial transform.
        transform: Transform,
    },
    /// Remove an object.
    Delete {
        /// Target object.
        object_id: ObjectId,
    },
    /// Overwrite an object's transform.
    Manipulate {
        /// Target object.
        object_id: ObjectId,
        /// Replacement transform.
        transform: Transform,
    },
}

impl Action {
    /// Spawn action for the given primitive kind.
    pub fn spawn(kind: ObjectKind, object_id: ObjectId, transform: Transform) -> Self {
        match kind {
            ObjectKind::Cube => Self::SpawnCube { object_id, transform },
            ObjectKind::Sphere => Self::SpawnSphere { object_id, transform },
            ObjectKind::Skeleton => Self::SpawnSkeleton { object_id, transform },
        }
    }

    /// Delete action.
    pub fn delete(object_id: ObjectId) -> Self {
        Self::Delete { object_id }
    }

    /// Manipulate action.
    pub fn manipulate(object_id: ObjectId, transform: Transform) -> Self {
        Self::Manipulate { object_id, transform }
    }

    /// Target object.
    pub fn object_id(&self) -> &ObjectId {
        match self {
            Self::SpawnCube { object_id, .. }
            | Self::SpawnSphere { object_id, .. }
            | Self::SpawnSkeleton { object_id, .. }
            | Self::Delete { object_id }
            | Self::Manipulate { object_id, .. } => object_id,
        }
    }

    /// Spatial payload, absent on delete.
    pub fn transform(&self) -> Option<&Transform> {
        match self {
            Self::SpawnCube { transform, .. }
            | Self::SpawnSphere { transform, .. }
            | Self::SpawnSkeleton { transform, .. }
            | Self::Manipulate { transform, .. } => Some(transform),
            Self::Delete { .. } => None,
        }
    }

    /// Primitive kind for spawn actions.
    pub fn spawn_kind(&self) -> Option<ObjectKind> {
        match self {
            Self::SpawnCube { .. } => Some(ObjectKind::Cube),
            Self::SpawnSphere { .. } => Some(ObjectKind::Sphere),
            Self::SpawnSkeleton { .. } => Some(ObjectKind::Skeleton),
            Self::Delete { .. } | Self::Manipulate { .. } => None,
        }
    }

    /// Wire operation this action travels as.
    pub fn operation(&self) -> OperationKind {
        match self {
            Self::SpawnCube { .. } | Self::SpawnSphere { .. } | Self::SpawnSkeleton { .. } => {
                OperationKind::Create
            },
            Self::Delete { .. } => OperationKind::Delete,
            Self::Manipulate { .. } => OperationKind::Manipulate,
        }
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.object_id() == other.object_id()
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object_id().hash(state);
    }
}
