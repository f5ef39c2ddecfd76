use crate::forces::{ForceAccumulator, JumpState};
use crate::types::{CapsuleSpec, Iso, ObjectRef, Vec3};

/// Ground sensor output. `normal`, `angle_deg` and `point` only mean something while
/// `grounded` is true.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundInfo {
    pub grounded: bool,
    pub normal: Vec3,
    pub angle_deg: f32,
    pub point: Vec3,
    pub object: Option<ObjectRef>,
}

impl Default for GroundInfo {
    fn default() -> Self {
        Self {
            grounded: false,
            normal: Vec3::y(),
            angle_deg: 0.0,
            point: Vec3::zeros(),
            object: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlideState {
    pub speed: f32,
    /// Seconds spent on ground steeper than the walkable limit.
    pub time_on_steep: f32,
    pub fast: bool,
    /// Height at the last fast-sliding tick, used to carry the slide into a fall.
    pub fall_height: Option<f32>,
}

/// A movable solid the mover is riding.
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformBinding {
    pub object: ObjectRef,
    /// Mover feet in the platform's local space.
    pub local_position: Vec3,
    pub last_pose: Iso,
    /// Platform velocity over the last tick (m/s).
    pub velocity: Vec3,
}

/// Everything the controller mutates during a fixed tick.
#[derive(Clone, Debug, PartialEq)]
pub struct MoverState {
    pub position: Vec3,
    pub prev_position: Vec3,
    pub velocity: Vec3,
    pub prev_velocity: Vec3,
    /// Facing (radians, 0 faces -Z).
    pub yaw: f32,
    /// Signed vertical speed (m/s).
    pub fall_speed: f32,
    pub forces: ForceAccumulator,

    pub ground: GroundInfo,
    pub was_grounded: bool,
    /// Ground contact was acquired this tick after being absent.
    pub on_new_ground: bool,

    pub platform: Option<PlatformBinding>,
    /// Bumped whenever the platform binding changes; the render reconciler snaps on change.
    pub platform_epoch: u32,

    pub fall_start_height: Option<f32>,
    pub slide: SlideState,
    pub jump: JumpState,

    /// Downward offset folded into this tick's sweep.
    pub anti_bump: f32,
    /// Offset to give back next tick because ground was lost right after it was applied.
    pub pending_anti_bump_reversal: f32,

    /// Composed velocity of the last tick (m/s), replayed by the render reconciler.
    pub move_direction: Vec3,
    pub predicted_position: Vec3,
    /// Capsule used on the previous tick.
    pub last_capsule: CapsuleSpec,
    /// Zero the horizontal part of `prev_velocity` on the next tick (teleport).
    pub reset_horizontal_velocity: bool,
}

impl MoverState {
    pub fn new(position: Vec3, capsule: CapsuleSpec) -> Self {
        Self {
            position,
            prev_position: position,
            velocity: Vec3::zeros(),
            prev_velocity: Vec3::zeros(),
            yaw: 0.0,
            fall_speed: 0.0,
            forces: ForceAccumulator::default(),
            ground: GroundInfo::default(),
            was_grounded: false,
            on_new_ground: false,
            platform: None,
            platform_epoch: 0,
            fall_start_height: None,
            slide: SlideState::default(),
            jump: JumpState::default(),
            anti_bump: 0.0,
            pending_anti_bump_reversal: 0.0,
            move_direction: Vec3::zeros(),
            predicted_position: position,
            last_capsule: capsule,
            reset_horizontal_velocity: false,
        }
    }

    /// Respawn/teleport reset: zero every force, forget the fall and the platform.
    pub fn reset(&mut self, position: Vec3) {
        let yaw = self.yaw;
        let capsule = self.last_capsule;
        let epoch = self.platform_epoch.wrapping_add(1);
        *self = Self::new(position, capsule);
        self.yaw = yaw;
        self.platform_epoch = epoch;
    }

    /// Zero every motion source without touching position or contacts.
    pub fn stop(&mut self) {
        self.forces.stop();
        self.fall_speed = 0.0;
        self.fall_start_height = None;
        self.slide = SlideState::default();
        self.jump.reset_accumulators();
        self.move_direction = Vec3::zeros();
        self.anti_bump = 0.0;
        self.pending_anti_bump_reversal = 0.0;
    }
}
