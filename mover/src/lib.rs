pub mod activity;
pub mod bitmask_flags;
pub mod controller;
pub mod deflect;
pub mod error;
pub mod events;
pub mod forces;
pub mod gravity;
pub mod ground;
pub mod intent;
pub mod motion;
pub mod platform;
pub mod query;
pub mod render;
pub mod schedule;
pub mod settings;
pub mod state;
pub mod types;
pub mod utils;
pub mod volume;
pub mod world;

#[cfg(test)]
mod test_world;

// Re-export rapier so the harness can build shapes without depending on it directly.
pub use rapier3d;

pub use activity::{Activity, ActivityGate, ActivitySet, OpenGate};
pub use bitmask_flags::{BitmaskFlags, FlagBitmask};
pub use controller::{ControllerStatus, MoverController};
pub use error::MoverError;
pub use events::MoverEvent;
pub use intent::{HeldIntent, IntentSource, MoveIntent};
pub use query::CollisionQuery;
pub use settings::MoverSettings;
pub use state::MoverState;
pub use types::{
    CapsuleSpec, ContactSide, ContactSides, Iso, Layer, LayerMask, ObjectRef, Quat, QueryHit,
    SweepMove, SweepRequest, Vec2, Vec3,
};
pub use volume::{CapsuleVolume, CharacterCapsuleVolume, CollisionVolumeShape};
pub use world::{ColliderShapeDef, QueryWorld, WorldObjectDef};
