//! Action codec.
//!
//! Bridges [`Action`] values and wire [`Envelope`]s. The JSON layout itself
//! lives in `holoshare-proto`; this module adds the origin metadata on the way
//! out and rebuilds validated actions on the way in.

use holoshare_proto::{Body, Envelope, ObjectKind, PayloadError};

use crate::{Action, ActionError, ClientId, ObjectId, Transform};

/// Origin metadata stamped on every outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeMeta {
    /// Publishing client.
    pub client_id: ClientId,
    /// Publish time, unix seconds.
    pub timestamp: i64,
}

/// Wrap `action` in an envelope carrying `meta`.
pub fn to_envelope(action: &Action, meta: &EnvelopeMeta) -> Envelope {
    let body = match action {
        Action::Delete { .. } => Body::Delete,
        Action::Manipulate { transform, .. } => Body::Manipulate { pose: transform.to_pose() },
        Action::SpawnCube { transform, .. } => {
            Body::Create { kind: ObjectKind::Cube, pose: transform.to_pose() }
        },
        Action::SpawnSphere { transform, .. } => {
            Body::Create { kind: ObjectKind::Sphere, pose: transform.to_pose() }
        },
        Action::SpawnSkeleton { transform, .. } => {
            Body::Create { kind: ObjectKind::Skeleton, pose: transform.to_pose() }
        },
    };

    Envelope {
        client_id: meta.client_id.as_str().to_string(),
        timestamp: meta.timestamp,
        object_id: action.object_id().as_str().to_string(),
        body,
    }
}

/// Rebuild the action and metadata carried by `envelope`.
pub fn from_envelope(envelope: Envelope) -> Result<(Action, EnvelopeMeta), PayloadError> {
    let client_id = ClientId::new(envelope.client_id).map_err(payload_error)?;
    let object_id = ObjectId::new(envelope.object_id).map_err(payload_error)?;

    let action = match envelope.body {
        Body::Create { kind, pose } => {
            Action::spawn(kind, object_id, Transform::from_pose(&pose).map_err(payload_error)?)
        },
        Body::Delete => Action::delete(object_id),
        Body::Manipulate { pose } => {
            Action::manipulate(object_id, Transform::from_pose(&pose).map_err(payload_error)?)
        },
    };

    Ok((action, EnvelopeMeta { client_id, timestamp: envelope.timestamp }))
}

/// Encode `action` plus `meta` to a wire payload.
pub fn encode(action: &Action, meta: &EnvelopeMeta) -> Result<Vec<u8>, PayloadError> {
    to_envelope(action, meta).encode()
}

/// Decode a wire payload.
///
/// # Errors
///
/// [`PayloadError`] for anything malformed or from an unknown protocol
/// revision. Receivers drop such payloads.
pub fn decode(payload: &[u8]) -> Result<(Action, EnvelopeMeta), PayloadError> {
    from_envelope(Envelope::decode(payload)?)
}

fn payload_error(err: ActionError) -> PayloadError {
    match err {
        ActionError::EmptyObjectId => PayloadError::EmptyObjectId,
        ActionError::EmptyClientId => PayloadError::EmptyClientId,
        ActionError::NonFiniteTransform { field } => PayloadError::NonFinite(field),
    }
}
