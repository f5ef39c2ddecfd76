use thiserror::Error;

use crate::types::ObjectRef;

/// Errors raised while configuring a mover.
///
/// Per-tick simulation never fails; it degrades (logging, clamping, or disabling the
/// controller) instead of returning one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MoverError {
    #[error("invalid mover settings: {0}")]
    InvalidSettings(&'static str),
    #[error("capsule radius {radius} does not fit height {height}")]
    InvalidCapsule { radius: f32, height: f32 },
    #[error("no collision query provider bound")]
    MissingCollisionProvider,
    #[error("unknown collision object {0:?}")]
    UnknownObject(ObjectRef),
}
