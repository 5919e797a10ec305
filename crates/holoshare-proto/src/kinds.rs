//! Operation and object kind codes.
//!
//! Codes start at 1 on the wire. Zero is never assigned so that a
//! zero-initialised field on a foreign client decodes as unknown rather than
//! silently mapping to the first variant.

use std::fmt;

use crate::PayloadError;

/// Kind of scene mutation carried by an envelope (`type` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OperationKind {
    /// A new object enters the shared scene.
    Create = 1,
    /// An object leaves the shared scene.
    Delete = 2,
    /// An existing object's transform changed.
    Manipulate = 3,
}

impl OperationKind {
    /// Wire code for this operation.
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for OperationKind {
    type Error = PayloadError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Create),
            2 => Ok(Self::Delete),
            3 => Ok(Self::Manipulate),
            other => Err(PayloadError::UnknownOperation(other)),
        }
    }
}

/// Primitive kind of a created object (`objectType` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ObjectKind {
    /// Unit cube primitive.
    Cube = 1,
    /// Sphere primitive.
    Sphere = 2,
    /// Anatomical skeleton model.
    Skeleton = 3,
}

impl ObjectKind {
    /// All kinds, in wire-code order.
    pub const ALL: [Self; 3] = [Self::Cube, Self::Sphere, Self::Skeleton];

    /// Wire code for this kind.
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for ObjectKind {
    type Error = PayloadError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Cube),
            2 => Ok(Self::Sphere),
            3 => Ok(Self::Skeleton),
            other => Err(PayloadError::UnknownObjectKind(other)),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cube => "cube",
            Self::Sphere => "sphere",
            Self::Skeleton => "skeleton",
        };
        f.write_str(name)
    }
}
