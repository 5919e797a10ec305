//! Envelope: one scene mutation plus origin metadata.
//!
//! # Wire layout
//!
//! ```text
//! {
//!   "clientID":   "<origin identity>",
//!   "timestamp":  <unix seconds>,
//!   "type":       1 | 2 | 3,            // Create | Delete | Manipulate
//!   "objectType": 1 | 2 | 3,            // Cube | Sphere | Skeleton, Create only
//!   "objectID":   "<object identity>",
//!   "position":   {"x", "y", "z"},      // omitted for Delete
//!   "rotation":   {"x", "y", "z", "w"}, // omitted for Delete
//!   "scale":      {"x", "y", "z"}       // omitted for Delete
//! }
//! ```
//!
//! Fields that do not belong to the operation are ignored on decode. Older
//! clients serialise every field regardless of operation (zeroed spatial data
//! on Delete, `objectType: 0` on Manipulate) and those payloads must still be
//! accepted.

use serde::{Deserialize, Serialize};

use crate::{ObjectKind, OperationKind, PayloadError, Result};

/// Three-component vector as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireVec3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl WireVec3 {
    /// Build from components.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Quaternion as it appears on the wire (`w` last).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireQuat {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
    /// Scalar component.
    pub w: f32,
}

impl WireQuat {
    /// Identity rotation.
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Build from components.
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

/// Spatial payload of Create and Manipulate envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World position.
    pub position: WireVec3,
    /// World rotation.
    pub rotation: WireQuat,
    /// Local scale.
    pub scale: WireVec3,
}

impl Pose {
    fn validate(&self) -> Result<()> {
        if !self.position.is_finite() {
            return Err(PayloadError::NonFinite("position"));
        }
        if !self.rotation.is_finite() {
            return Err(PayloadError::NonFinite("rotation"));
        }
        if !self.scale.is_finite() {
            return Err(PayloadError::NonFinite("scale"));
        }
        Ok(())
    }
}

/// Operation-specific part of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Object creation with its kind and initial pose.
    Create {
        /// Primitive to instantiate.
        kind: ObjectKind,
        /// Initial pose.
        pose: Pose,
    },
    /// Object removal.
    Delete,
    /// Transform overwrite.
    Manipulate {
        /// New pose.
        pose: Pose,
    },
}

impl Body {
    /// Operation code for this body.
    pub fn operation(&self) -> OperationKind {
        match self {
            Self::Create { .. } => OperationKind::Create,
            Self::Delete => OperationKind::Delete,
            Self::Manipulate { .. } => OperationKind::Manipulate,
        }
    }
}

/// One decoded bus message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Identity of the publishing client.
    pub client_id: String,
    /// Publish time, unix seconds.
    pub timestamp: i64,
    /// Identity of the target object.
    pub object_id: String,
    /// What happened to the object.
    pub body: Body,
}

/// Serde shadow of [`Envelope`]. Every field is optional so that presence
/// can be checked per operation kind after parsing.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    operation: Option<u16>,
    #[serde(rename = "objectType", skip_serializing_if = "Option::is_none")]
    object_type: Option<u16>,
    #[serde(rename = "objectID", skip_serializing_if = "Option::is_none")]
    object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<WireVec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<WireQuat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<WireVec3>,
}

impl WireEnvelope {
    fn pose(&self) -> Result<Pose> {
        let pose = Pose {
            position: self.position.ok_or(PayloadError::MissingField("position"))?,
            rotation: self.rotation.ok_or(PayloadError::MissingField("rotation"))?,
            scale: self.scale.ok_or(PayloadError::MissingField("scale"))?,
        };
        pose.validate()?;
        Ok(pose)
    }
}

impl Envelope {
    /// Operation code carried by this envelope.
    pub fn operation(&self) -> OperationKind {
        self.body.operation()
    }

    /// Object kind, present only on Create.
    pub fn object_kind(&self) -> Option<ObjectKind> {
        match &self.body {
            Body::Create { kind, .. } => Some(*kind),
            Body::Delete | Body::Manipulate { .. } => None,
        }
    }

    /// Pose, absent on Delete.
    pub fn pose(&self) -> Option<&Pose> {
        match &self.body {
            Body::Create { pose, .. } | Body::Manipulate { pose } => Some(pose),
            Body::Delete => None,
        }
    }

    /// Serialise to a JSON payload.
    ///
    /// Output is deterministic: fields are always written in wire order.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.client_id.is_empty() {
            return Err(PayloadError::EmptyClientId);
        }
        if self.object_id.is_empty() {
            return Err(PayloadError::EmptyObjectId);
        }
        if let Some(pose) = self.pose() {
            pose.validate()?;
        }

        let mut wire = WireEnvelope {
            client_id: Some(self.client_id.clone()),
            timestamp: Some(self.timestamp),
            operation: Some(self.operation().to_u16()),
            object_type: self.object_kind().map(ObjectKind::to_u16),
            object_id: Some(self.object_id.clone()),
            ..WireEnvelope::default()
        };
        if let Some(pose) = self.pose() {
            wire.position = Some(pose.position);
            wire.rotation = Some(pose.rotation);
            wire.scale = Some(pose.scale);
        }

        Ok(serde_json::to_vec(&wire)?)
    }

    /// Parse a JSON payload.
    ///
    /// # Errors
    ///
    /// Any [`PayloadError`]; the caller should drop the message.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let wire: WireEnvelope = serde_json::from_slice(payload)?;

        let client_id = wire.client_id.clone().ok_or(PayloadError::MissingField("clientID"))?;
        if client_id.is_empty() {
            return Err(PayloadError::EmptyClientId);
        }
        let timestamp = wire.timestamp.ok_or(PayloadError::MissingField("timestamp"))?;
        let operation = wire.operation.ok_or(PayloadError::MissingField("type"))?;
        let operation = OperationKind::try_from(operation)?;
        let object_id = wire.object_id.clone().ok_or(PayloadError::MissingField("objectID"))?;
        if object_id.is_empty() {
            return Err(PayloadError::EmptyObjectId);
        }

        let body = match operation {
            OperationKind::Create => {
                let code = wire.object_type.ok_or(PayloadError::MissingField("objectType"))?;
                Body::Create { kind: ObjectKind::try_from(code)?, pose: wire.pose()? }
            },
            OperationKind::Delete => Body::Delete,
            OperationKind::Manipulate => Body::Manipulate { pose: wire.pose()? },
        };

        Ok(Self { client_id, timestamp, object_id, body })
    }
}
