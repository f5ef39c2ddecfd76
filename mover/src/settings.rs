use crate::error::MoverError;
use crate::types::{CapsuleSpec, Layer, LayerMask};

/// Gravitational acceleration along +Y (m/s^2).
pub const GRAVITY_MPS2: f32 = -9.81;

/// Fall speed (m/s) applied every tick while grounded.
///
/// A small negative value keeps the mover pressed onto uneven ground so the ground sensor
/// keeps finding it.
pub const GROUNDED_FALL_SPEED: f32 = -0.25;

/// Terminal fall speed (m/s, negative = downward).
pub const TERMINAL_FALL_SPEED: f32 = -50.0;

/// Number of future ticks a soft force can be spread over.
pub const SOFT_FORCE_FRAMES: usize = 120;

/// Simulation tick length (seconds).
pub const DEFAULT_FIXED_DT: f32 = 1.0 / 60.0;

/// Squared displacement below which a sweep is skipped.
pub const MIN_MOVE_SQ: f32 = 1.0e-10;

/// Generic float epsilon used for "is this component non-zero" checks.
pub const DIST_EPS: f32 = 1.0e-4;

/// Normals pointing further down than this are ceiling contacts.
pub const CEILING_NORMAL_Y: f32 = -0.7;

/// Extra distance beyond the skin width the ground probe reaches.
pub const GROUND_PROBE_MARGIN: f32 = 0.05;

/// Render positions closer than this to the authoritative position are snapped onto it.
pub const RENDER_SNAP_EPS: f32 = 1.0e-4;

/// Angle tolerance (as a fraction of 90 degrees) inside which the slope factor is treated as 1.
pub const SLOPE_FACTOR_SNAP: f32 = 0.01;

/// Extra boost applied on top of the inverse slope factor when walking on slopes without a
/// tuned slope speed.
pub const DEFAULT_SLOPE_BOOST: f32 = 1.2;

/// Ratio of slidiness that becomes the base slide speed.
pub const SLIDE_BASE_RATIO: f32 = 0.6;

/// Per-tick decay divisor for slide speed on walkable-but-slippery slopes.
pub const SLIDE_DECAY: f32 = 1.05;

/// Scale of the time-on-steep-ground accumulation.
pub const STEEP_SLIDE_ACCUMULATION: f32 = 0.125;

/// Tunable parameters for a single mover.
///
/// All velocity-like quantities (throttle, forces, fall speed) are in m/s; the per-tick
/// displacement is `velocity * fixed_dt`. Per-tick increments (`acceleration`, jump hold,
/// slide accumulation) are tuned against `fixed_dt`.
#[derive(Clone, Debug, PartialEq)]
pub struct MoverSettings {
    // --- Motor ---
    /// Throttle gained per tick at full intent (m/s).
    pub acceleration: f32,
    /// Per-tick exponential damping of horizontal throttle.
    pub damping: f32,
    /// Multiplier on backward intent.
    pub backwards_speed: f32,
    /// Multiplier on acceleration and damping while airborne.
    pub air_speed: f32,
    /// Uphill slope speed multiplier. `None` uses the built-in boost.
    pub slope_speed_up: Option<f32>,
    /// Downhill slope speed multiplier. `None` uses the built-in boost.
    pub slope_speed_down: Option<f32>,
    pub run_acceleration_modifier: f32,
    pub crouch_acceleration_modifier: f32,

    // --- Jump ---
    /// Upward throttle set when a jump starts (m/s).
    pub jump_force: f32,
    pub jump_damping: f32,
    /// Hold force accumulated per tick while jump is held (m/s).
    pub jump_force_hold: f32,
    pub jump_force_hold_damping: f32,
    /// Ticks after the jump start before the hold force kicks in.
    pub jump_hold_skip_ticks: u32,
    /// Ticks the jump stays blocked after a head impact.
    pub jump_block_ticks: u64,

    // --- Physics ---
    pub force_damping: f32,
    pub gravity_modifier: f32,
    pub terminal_fall_speed: f32,
    /// Slopes steeper than this (degrees) start sliding.
    pub slope_slide_limit: f32,
    /// Steepest slope (degrees) the mover can walk up or jump from.
    pub walkable_slope_limit: f32,
    pub slidiness: f32,
    /// Slide speed above which the mover counts as sliding fast.
    pub fast_slide_speed: f32,
    pub wall_bounce: f32,
    pub wall_friction: f32,
    pub fall_impact_multiplier: f32,
    /// Fall impacts smaller than this are not reported.
    pub fall_impact_threshold: f32,
    pub out_of_control_force: f32,
    pub out_of_control_fall_speed: f32,

    // --- Volume ---
    pub radius: f32,
    pub height: f32,
    pub skin_width: f32,
    pub step_offset: f32,
    pub crouch_height_modifier: f32,
    pub stand_retry_ticks: u64,
    pub ground_probe_margin: f32,
    pub collision_mask: LayerMask,

    // --- Timing ---
    pub fixed_dt: f32,
    pub time_scale: f32,
    /// Render relaxation rate (per second) toward the authoritative position.
    pub render_relax_rate: f32,
}

impl Default for MoverSettings {
    fn default() -> Self {
        Self {
            acceleration: 1.08,
            damping: 0.17,
            backwards_speed: 0.65,
            air_speed: 0.35,
            slope_speed_up: None,
            slope_speed_down: None,
            run_acceleration_modifier: 1.8,
            crouch_acceleration_modifier: 0.5,

            jump_force: 6.0,
            jump_damping: 0.08,
            jump_force_hold: 0.18,
            jump_force_hold_damping: 0.5,
            jump_hold_skip_ticks: 2,
            jump_block_ticks: 30,

            force_damping: 0.05,
            gravity_modifier: 1.5,
            terminal_fall_speed: TERMINAL_FALL_SPEED,
            slope_slide_limit: 30.0,
            walkable_slope_limit: 45.0,
            slidiness: 0.15,
            fast_slide_speed: 0.5,
            wall_bounce: 0.0,
            wall_friction: 0.0,
            fall_impact_multiplier: 1.0,
            fall_impact_threshold: 0.05,
            out_of_control_force: 8.0,
            out_of_control_fall_speed: 20.0,

            radius: 0.4,
            height: 1.8,
            skin_width: 0.02,
            step_offset: 0.3,
            crouch_height_modifier: 0.5,
            stand_retry_ticks: 6,
            ground_probe_margin: GROUND_PROBE_MARGIN,
            collision_mask: Layer::solid_mask(),

            fixed_dt: DEFAULT_FIXED_DT,
            time_scale: 1.0,
            render_relax_rate: 1.0,
        }
    }
}

impl MoverSettings {
    /// Standing capsule described by these settings.
    pub fn capsule(&self) -> CapsuleSpec {
        CapsuleSpec::new(self.radius, self.height, self.skin_width)
    }

    /// Reject settings that would break the controller's invariants.
    pub fn validate(&self) -> Result<(), MoverError> {
        if !(self.radius > 0.0) || !(self.height > 0.0) {
            return Err(MoverError::InvalidSettings(
                "capsule radius and height must be positive",
            ));
        }
        if self.radius * 2.0 > self.height {
            return Err(MoverError::InvalidCapsule {
                radius: self.radius,
                height: self.height,
            });
        }
        if self.skin_width < 0.0 || self.step_offset < 0.0 {
            return Err(MoverError::InvalidSettings(
                "skin width and step offset must not be negative",
            ));
        }
        if self.damping < 0.0
            || self.force_damping < 0.0
            || self.jump_damping < 0.0
            || self.jump_force_hold_damping < 0.0
        {
            return Err(MoverError::InvalidSettings("damping must not be negative"));
        }
        if !(self.fixed_dt > 0.0) {
            return Err(MoverError::InvalidSettings("fixed_dt must be positive"));
        }
        if !(self.crouch_height_modifier > 0.0 && self.crouch_height_modifier <= 1.0) {
            return Err(MoverError::InvalidSettings(
                "crouch height modifier must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.wall_friction) || !(0.0..=1.0).contains(&self.wall_bounce)
        {
            return Err(MoverError::InvalidSettings(
                "wall friction and bounce must be in [0, 1]",
            ));
        }
        if self.slope_slide_limit > self.walkable_slope_limit {
            log::warn!(
                "slope slide limit {} is above the walkable limit {}",
                self.slope_slide_limit,
                self.walkable_slope_limit
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(MoverSettings::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_capsule_wider_than_tall() {
        let settings = MoverSettings {
            radius: 1.0,
            height: 1.5,
            ..MoverSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(MoverError::InvalidCapsule {
                radius: 1.0,
                height: 1.5
            })
        );
    }

    #[test]
    fn rejects_out_of_range_tuning() {
        let bad = [
            MoverSettings {
                fixed_dt: 0.0,
                ..MoverSettings::default()
            },
            MoverSettings {
                damping: -0.1,
                ..MoverSettings::default()
            },
            MoverSettings {
                crouch_height_modifier: 0.0,
                ..MoverSettings::default()
            },
            MoverSettings {
                wall_friction: 1.5,
                ..MoverSettings::default()
            },
            MoverSettings {
                radius: f32::NAN,
                ..MoverSettings::default()
            },
        ];
        for settings in bad {
            assert!(matches!(
                settings.validate(),
                Err(MoverError::InvalidSettings(_))
            ));
        }
    }
}
