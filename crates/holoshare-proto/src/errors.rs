//! Payload decode and encode errors.

use thiserror::Error;

/// Convenience alias for codec results.
pub type Result<T> = std::result::Result<T, PayloadError>;

/// A payload that could not be turned into (or produced from) an envelope.
///
/// Receivers drop the offending message and keep going; none of these are
/// fatal to a session.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Payload is not a JSON object of the expected shape.
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A field required for this operation kind is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// `type` carries a code this revision does not understand.
    #[error("unknown operation kind {0}")]
    UnknownOperation(u16),

    /// `objectType` carries a code this revision does not understand.
    #[error("unknown object kind {0}")]
    UnknownObjectKind(u16),

    /// `objectID` is present but empty.
    #[error("object id is empty")]
    EmptyObjectId,

    /// `clientID` is present but empty.
    #[error("client id is empty")]
    EmptyClientId,

    /// A spatial component is NaN or infinite.
    #[error("non-finite value in `{0}`")]
    NonFinite(&'static str),
}
