//! External object factory.
//!
//! The replica never renders, simulates or manipulates objects itself. It
//! asks a factory to instantiate and destroy them, and reads and writes their
//! transforms through it. A rendering engine, a headless simulation or a test
//! double all fit behind this trait.

use holoshare_proto::ObjectKind;

use crate::Transform;

/// Owner of the live objects behind registry entries.
///
/// Dirty flags belong to the factory's object representation: they are set
/// by local edits (user manipulation, physics) and read and cleared by the
/// replica's detect phase. [`ObjectFactory::set_transform`] is how the replica
/// applies remote state; the replica clears the flag afterwards, so a
/// factory may treat it like any other edit.
pub trait ObjectFactory {
    /// Handle to one live object.
    type Handle;

    /// Instantiate a primitive of `kind` at `transform`.
    fn spawn(&mut self, kind: ObjectKind, transform: &Transform) -> Self::Handle;

    /// Tear down an object. The handle is consumed.
    fn destroy(&mut self, handle: Self::Handle);

    /// Current transform.
    fn transform(&self, handle: &Self::Handle) -> Transform;

    /// Overwrite the transform.
    fn set_transform(&mut self, handle: &Self::Handle, transform: &Transform);

    /// Whether the transform changed since the flag was last cleared.
    fn is_dirty(&self, handle: &Self::Handle) -> bool;

    /// Reset the dirty flag.
    fn clear_dirty(&mut self, handle: &Self::Handle);
}
