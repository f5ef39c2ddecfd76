//! Gravity, slope factor and slope sliding.

use crate::settings::{
    DEFAULT_SLOPE_BOOST, GRAVITY_MPS2, GROUNDED_FALL_SPEED, MoverSettings, SLIDE_BASE_RATIO,
    SLIDE_DECAY, SLOPE_FACTOR_SNAP, STEEP_SLIDE_ACCUMULATION,
};
use crate::state::MoverState;
use crate::types::Vec3;
use crate::utils::{angle_deg, horizontal, is_negligible};

/// Motor scale for the current ground slope and direction of travel.
///
/// 1 on flat ground, in the air, or when standing still. Walking downhill is boosted,
/// walking uphill is slowed, and slopes above the walkable limit cannot be climbed at all.
pub fn slope_factor(state: &MoverState, settings: &MoverSettings) -> f32 {
    let velocity = horizontal(state.velocity);
    if !state.ground.grounded || is_negligible(&velocity) {
        return 1.0;
    }

    let factor = 1.0 + (1.0 - angle_deg(&state.ground.normal, &velocity) / 90.0);
    if (1.0 - factor).abs() < SLOPE_FACTOR_SNAP {
        return 1.0;
    }

    if factor > 1.0 {
        match settings.slope_speed_down {
            Some(speed) => factor * speed,
            None => DEFAULT_SLOPE_BOOST / factor,
        }
    } else {
        if state.ground.angle_deg > settings.walkable_slope_limit {
            return 0.0;
        }
        match settings.slope_speed_up {
            Some(speed) => factor * speed,
            None => factor * DEFAULT_SLOPE_BOOST,
        }
    }
}

/// Integrate fall speed for one tick.
pub fn update_fall_speed(state: &mut MoverState, settings: &MoverSettings) {
    if state.ground.grounded && state.fall_speed <= 0.0 {
        state.fall_speed = GROUNDED_FALL_SPEED;
        return;
    }
    state.fall_speed +=
        GRAVITY_MPS2 * settings.gravity_modifier * settings.fixed_dt * settings.time_scale;
    state.fall_speed = state.fall_speed.max(settings.terminal_fall_speed);
}

/// Steepest-descent direction along a surface (not normalized; length is `sin(angle)`).
pub fn downhill(normal: &Vec3) -> Vec3 {
    normal.cross(&-Vec3::y()).cross(normal)
}

/// Slope sliding. Adds the slide push to the external force and seeds the fall speed when a
/// fast slide runs off its slope.
pub fn update_sliding(state: &mut MoverState, settings: &MoverSettings) {
    let dt = settings.fixed_dt;

    if !state.ground.grounded {
        if let Some(height) = state.slide.fall_height.take() {
            // Keep the vertical speed the slide had instead of restarting the fall from rest.
            let carried = (state.position.y - height) / dt;
            state.fall_speed = state.fall_speed.min(carried);
            log::trace!("fast slide left the ground, seeding fall speed {carried}");
        }
        // A slide never resumes across an airborne gap.
        state.slide = Default::default();
        return;
    }

    if state.ground.angle_deg <= settings.slope_slide_limit {
        state.slide = Default::default();
        return;
    }

    let base = settings.slidiness * SLIDE_BASE_RATIO;
    let slide = &mut state.slide;
    if state.ground.angle_deg <= settings.walkable_slope_limit {
        slide.speed = slide.speed.max(base) / SLIDE_DECAY;
        slide.time_on_steep = 0.0;
        slide.fast = false;
    } else {
        slide.fast = slide.speed > settings.fast_slide_speed;
        slide.time_on_steep += dt * settings.time_scale;
        slide.speed += base * slide.time_on_steep * STEEP_SLIDE_ACCUMULATION;
        slide.speed = slide.speed.max(base);
    }
    slide.fall_height = slide.fast.then_some(state.position.y);

    let push = downhill(&state.ground.normal) * slide.speed;
    state.forces.add_force(push);
}
