use crate::activity::Activity;
use crate::types::Vec3;

/// Notifications raised during a fixed tick, drained by the host afterwards.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MoverEvent {
    /// A tracked fall ended on ground; the payload is the scaled drop height.
    FallImpact(f32),
    /// Upward force was stopped by a ceiling. Negative when the deflection went to the
    /// mover's left.
    HeadImpact(f32),
    /// Horizontal external force absorbed by a wall.
    ForceImpact(Vec3),
    /// Net displacement of the tick.
    Move(Vec3),
    /// Every motion source was zeroed.
    Stop,
    ActivityStarted(Activity),
    ActivityStopped(Activity),
}
