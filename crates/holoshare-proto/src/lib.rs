//! Wire format for holographic scene replication.
//!
//! Every bus message carries exactly one [`Envelope`]: the origin client's
//! identity, a unix timestamp, the operation, and the object it targets. The
//! payload is a UTF-8 JSON document so that clients written against other
//! toolkits can read it without a schema compiler.
//!
//! Decoding is strict about required fields and lenient about unknown ones.
//! Remote clients may run a newer protocol revision, so callers are expected
//! to drop payloads that fail to decode instead of treating the failure as
//! fatal.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod kinds;
pub mod qos;

pub use envelope::{Body, Envelope, Pose, WireQuat, WireVec3};
pub use errors::{PayloadError, Result};
pub use kinds::{ObjectKind, OperationKind};
pub use qos::QoS;
