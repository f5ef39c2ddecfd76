use crate::types::Vec2;

/// What the input or AI layer wants this tick.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MoveIntent {
    /// x = strafe (right positive), y = forward. Clamped to [-1, 1] by the motor.
    pub move_vector: Vec2,
    /// New facing in radians, if the source steers.
    pub yaw: Option<f32>,
    pub jump: bool,
    pub crouch: bool,
    pub run: bool,
}

impl MoveIntent {
    pub fn forward() -> Self {
        Self {
            move_vector: Vec2::new(0.0, 1.0),
            ..Self::default()
        }
    }
}

/// Supplies one [`MoveIntent`] per fixed tick.
pub trait IntentSource {
    fn intent(&mut self, tick: u64) -> MoveIntent;
}

impl<F> IntentSource for F
where
    F: FnMut(u64) -> MoveIntent,
{
    fn intent(&mut self, tick: u64) -> MoveIntent {
        self(tick)
    }
}

/// Repeats the same intent every tick.
#[derive(Copy, Clone, Debug, Default)]
pub struct HeldIntent(pub MoveIntent);

impl IntentSource for HeldIntent {
    fn intent(&mut self, _tick: u64) -> MoveIntent {
        self.0
    }
}
