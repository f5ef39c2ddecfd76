//! Motor throttle, external force and the soft-force queue.

use crate::settings::{DIST_EPS, MoverSettings, SOFT_FORCE_FRAMES};
use crate::types::{Vec2, Vec3};
use crate::utils::{nan_safe, yaw_forward, yaw_right};

/// Ring buffer of force contributions spread over future ticks.
///
/// Slot `head` is consumed by the next [`SoftForceQueue::pop`]; popping clears it and
/// advances the head, so exactly one slot is ever the head.
#[derive(Clone, Debug, PartialEq)]
pub struct SoftForceQueue {
    slots: [Vec3; SOFT_FORCE_FRAMES],
    head: usize,
}

impl Default for SoftForceQueue {
    fn default() -> Self {
        Self {
            slots: [Vec3::zeros(); SOFT_FORCE_FRAMES],
            head: 0,
        }
    }
}

impl SoftForceQueue {
    /// Add `per_frame` to each of the next `frames` slots.
    pub fn enqueue(&mut self, per_frame: Vec3, frames: usize) {
        for i in 0..frames.min(SOFT_FORCE_FRAMES) {
            let slot = (self.head + i) % SOFT_FORCE_FRAMES;
            self.slots[slot] += per_frame;
        }
    }

    /// Take the head contribution and shift the queue forward one tick.
    pub fn pop(&mut self) -> Vec3 {
        let value = std::mem::replace(&mut self.slots[self.head], Vec3::zeros());
        self.head = (self.head + 1) % SOFT_FORCE_FRAMES;
        value
    }

    pub fn clear(&mut self) {
        self.slots = [Vec3::zeros(); SOFT_FORCE_FRAMES];
        self.head = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| *s == Vec3::zeros())
    }

    /// Sum of everything still queued.
    #[cfg(test)]
    pub(crate) fn total(&self) -> Vec3 {
        self.slots.iter().sum()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vec3> {
        self.slots.iter_mut()
    }
}

/// Inputs of one motor update.
#[derive(Copy, Clone, Debug)]
pub struct MotorInput {
    /// x = strafe (right positive), y = forward.
    pub intent: Vec2,
    pub yaw: f32,
    pub grounded: bool,
    pub slope_factor: f32,
    /// Run/crouch acceleration multiplier.
    pub acceleration_modifier: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForceAccumulator {
    /// Velocity contribution from player/AI intent (m/s).
    pub motor_throttle: Vec3,
    /// Decaying velocity contribution from impacts and explosions (m/s).
    pub external_force: Vec3,
    pub soft: SoftForceQueue,
}

impl ForceAccumulator {
    pub fn add_force(&mut self, force: Vec3) {
        self.external_force = nan_safe(self.external_force + force, self.external_force);
    }

    /// Spread `force` over `frames` ticks, applying the first share immediately.
    pub fn add_soft_force(&mut self, force: Vec3, frames: u32) {
        let frames = (frames as usize).clamp(1, SOFT_FORCE_FRAMES);
        let share = nan_safe(force / frames as f32, Vec3::zeros());
        self.add_force(share);
        self.soft.enqueue(share, frames - 1);
    }

    /// Damp the external force and feed in this tick's soft-force share.
    pub fn update_forces(&mut self, force_damping: f32, time_scale: f32) {
        self.external_force /= 1.0 + force_damping * time_scale;
        let head = self.soft.pop();
        self.add_force(head);
        if self.external_force.norm_squared() < DIST_EPS * DIST_EPS {
            self.external_force = Vec3::zeros();
        }
    }

    /// Accelerate the horizontal throttle toward the intent and damp it.
    pub fn update_motor(&mut self, input: &MotorInput, settings: &MoverSettings) {
        let mut intent = Vec2::new(
            input.intent.x.clamp(-1.0, 1.0),
            input.intent.y.clamp(-1.0, 1.0),
        );
        if intent.y < 0.0 {
            intent.y *= settings.backwards_speed;
        }
        let direction = yaw_right(input.yaw) * intent.x + yaw_forward(input.yaw) * intent.y;

        let air = if input.grounded { 1.0 } else { settings.air_speed };
        let gain = direction
            * settings.acceleration
            * input.acceleration_modifier
            * air
            * input.slope_factor;
        let throttle = self.motor_throttle + gain;

        let damping = 1.0 + settings.damping * air * settings.time_scale;
        let next = Vec3::new(throttle.x / damping, throttle.y, throttle.z / damping);
        self.motor_throttle = nan_safe(next, self.motor_throttle);
    }

    /// Clear throttle, external force and the soft queue together.
    pub fn stop(&mut self) {
        self.motor_throttle = Vec3::zeros();
        self.external_force = Vec3::zeros();
        self.soft.clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.motor_throttle == Vec3::zeros()
            && self.external_force == Vec3::zeros()
            && self.soft.is_empty()
    }
}

/// Per-jump accumulators.
#[derive(Clone, Debug, PartialEq)]
pub struct JumpState {
    pub hold_acc: f32,
    /// Held ticks counted toward `jump_hold_skip_ticks`.
    pub hold_ticks: u32,
    /// Ticks left in the take-off window, during which falls are not tracked.
    pub initiating_ticks: u32,
    /// Jump input was released since the last jump.
    pub released: bool,
    /// Set after a head impact until the scheduled re-permission fires.
    pub blocked: bool,
}

impl Default for JumpState {
    fn default() -> Self {
        Self {
            hold_acc: 0.0,
            hold_ticks: 0,
            initiating_ticks: 0,
            released: true,
            blocked: false,
        }
    }
}

impl JumpState {
    pub fn reset_accumulators(&mut self) {
        self.hold_acc = 0.0;
        self.hold_ticks = 0;
        self.initiating_ticks = 0;
    }
}

/// Per-tick vertical throttle update.
///
/// `holding` is true while the jump activity is active and the input still held.
pub fn update_jump(
    forces: &mut ForceAccumulator,
    jump: &mut JumpState,
    settings: &MoverSettings,
    holding: bool,
    grounded: bool,
    vertical_velocity: f32,
) {
    jump.initiating_ticks = jump.initiating_ticks.saturating_sub(1);

    if holding && !grounded && vertical_velocity >= 0.0 {
        if jump.hold_ticks >= settings.jump_hold_skip_ticks {
            jump.hold_acc += settings.jump_force_hold;
        } else {
            jump.hold_ticks += 1;
        }
    }

    let ts = settings.time_scale;
    let throttle = &mut forces.motor_throttle;
    throttle.y += jump.hold_acc;
    jump.hold_acc /= 1.0 + settings.jump_force_hold_damping * ts;
    throttle.y /= 1.0 + settings.jump_damping * ts;
    if throttle.y.abs() < DIST_EPS {
        throttle.y = 0.0;
    }
}

/// Speed the motor settles at after `seconds` of full forward intent on flat ground.
///
/// Runs the same accelerate/damp recurrence as [`ForceAccumulator::update_motor`].
pub fn calculate_max_speed(settings: &MoverSettings, seconds: f32) -> f32 {
    let ticks = (seconds / settings.fixed_dt).round().max(0.0) as u32;
    let damping = 1.0 + settings.damping * settings.time_scale;
    (0..ticks).fold(0.0, |speed, _| (speed + settings.acceleration) / damping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn soft_force_applies_first_share_now_and_rest_later() {
        let mut forces = ForceAccumulator::default();
        forces.add_soft_force(Vec3::new(4.0, 0.0, 0.0), 4);

        assert_relative_eq!(forces.external_force.x, 1.0);
        assert_relative_eq!(forces.soft.total().x, 3.0);

        for _ in 0..3 {
            forces.update_forces(0.0, 1.0);
        }
        assert_relative_eq!(forces.external_force.x, 4.0, epsilon = 1e-5);
        assert!(forces.soft.is_empty());
    }

    #[test]
    fn soft_force_frames_are_clamped() {
        let mut forces = ForceAccumulator::default();
        forces.add_soft_force(Vec3::new(0.0, 2.0, 0.0), 0);
        assert_relative_eq!(forces.external_force.y, 2.0);
        assert!(forces.soft.is_empty());

        let mut forces = ForceAccumulator::default();
        forces.add_soft_force(Vec3::new(0.0, 240.0, 0.0), 500);
        assert_relative_eq!(forces.external_force.y, 2.0);
        assert_relative_eq!(forces.soft.total().y, 238.0, epsilon = 1e-3);
    }

    #[test]
    fn queue_wraps_around_the_ring() {
        let mut queue = SoftForceQueue::default();
        for _ in 0..100 {
            queue.pop();
        }
        queue.enqueue(Vec3::x(), 50);
        let mut total = Vec3::zeros();
        for _ in 0..SOFT_FORCE_FRAMES {
            total += queue.pop();
        }
        assert_relative_eq!(total.x, 50.0);
        assert!(queue.is_empty());
    }

    #[test]
    fn non_finite_forces_are_ignored() {
        let mut forces = ForceAccumulator::default();
        forces.add_force(Vec3::new(1.0, 0.0, 0.0));
        forces.add_force(Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(forces.external_force, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn stop_clears_everything() {
        let mut forces = ForceAccumulator::default();
        forces.motor_throttle = Vec3::new(1.0, 2.0, 3.0);
        forces.add_soft_force(Vec3::new(5.0, 0.0, 0.0), 10);
        forces.stop();
        assert!(forces.is_stopped());
        let once = forces.clone();
        forces.stop();
        assert_eq!(forces, once);
    }

    #[test]
    fn backward_intent_is_slower_than_forward() {
        let settings = MoverSettings::default();
        let input = |y: f32| MotorInput {
            intent: Vec2::new(0.0, y),
            yaw: 0.0,
            grounded: true,
            slope_factor: 1.0,
            acceleration_modifier: 1.0,
        };
        let mut forward = ForceAccumulator::default();
        let mut backward = ForceAccumulator::default();
        forward.update_motor(&input(1.0), &settings);
        backward.update_motor(&input(-1.0), &settings);

        // Yaw 0 faces -Z.
        assert!(forward.motor_throttle.z < 0.0);
        assert!(backward.motor_throttle.z > 0.0);
        assert_relative_eq!(
            backward.motor_throttle.z,
            -forward.motor_throttle.z * settings.backwards_speed,
            epsilon = 1e-6
        );
    }

    #[test]
    fn max_speed_converges_to_acceleration_over_damping() {
        let settings = MoverSettings::default();
        let expected = settings.acceleration / settings.damping;
        assert_relative_eq!(calculate_max_speed(&settings, 30.0), expected, max_relative = 1e-3);
        assert_eq!(calculate_max_speed(&settings, 0.0), 0.0);
    }

    #[test]
    fn jump_hold_kicks_in_after_skip_ticks() {
        let settings = MoverSettings::default();
        let mut forces = ForceAccumulator::default();
        let mut jump = JumpState::default();
        forces.motor_throttle.y = settings.jump_force;

        for _ in 0..settings.jump_hold_skip_ticks {
            update_jump(&mut forces, &mut jump, &settings, true, false, 1.0);
            assert_eq!(jump.hold_acc, 0.0);
        }
        update_jump(&mut forces, &mut jump, &settings, true, false, 1.0);
        assert!(jump.hold_acc > 0.0);

        // Descending stops the hold from growing.
        let before = jump.hold_acc;
        update_jump(&mut forces, &mut jump, &settings, true, false, -1.0);
        assert!(jump.hold_acc < before);
    }
}
