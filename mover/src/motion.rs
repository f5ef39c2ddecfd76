use crate::platform;
use crate::query::CollisionQuery;
use crate::settings::{DIST_EPS, MIN_MOVE_SQ, MoverSettings};
use crate::state::MoverState;
use crate::types::{CapsuleSpec, SweepMove, SweepRequest, Vec3};
use crate::utils::{horizontal, nan_safe};

/// Velocity the mover wants this tick: external force, motor throttle and fall speed.
pub fn composed_velocity(state: &MoverState) -> Vec3 {
    let forces = &state.forces;
    forces.external_force + forces.motor_throttle + Vec3::new(0.0, state.fall_speed, 0.0)
}

/// Downward bias applied while grounded so descending slopes and stairs stay in contact.
///
/// Zero while the mover is gaining height on purpose (jump or upward knock).
pub fn anti_bump_offset(state: &MoverState, displacement: &Vec3, step_offset: f32) -> f32 {
    let rising =
        state.forces.motor_throttle.y > DIST_EPS || state.forces.external_force.y > DIST_EPS;
    if !state.ground.grounded || rising {
        return 0.0;
    }
    step_offset.max(horizontal(*displacement).norm())
}

/// One sweep-move for the whole tick.
///
/// This is the only place the authoritative position changes during a tick. The platform
/// carry and any pending anti-bump reversal ride along in the same sweep.
pub fn integrate<Q: CollisionQuery>(
    world: &Q,
    state: &mut MoverState,
    capsule: &CapsuleSpec,
    step_offset: f32,
    settings: &MoverSettings,
    collide: bool,
) -> SweepMove {
    let dt = settings.fixed_dt;
    let velocity = nan_safe(composed_velocity(state), state.move_direction);
    state.move_direction = velocity;

    let mut displacement = velocity * dt;

    let anti_bump = if collide {
        anti_bump_offset(state, &displacement, step_offset)
    } else {
        0.0
    };
    displacement.y -= anti_bump;
    displacement.y += std::mem::take(&mut state.pending_anti_bump_reversal);

    let carry = platform::carry(world, state);
    displacement += carry.translation;
    state.yaw += carry.yaw;

    let displacement = nan_safe(displacement, Vec3::zeros());
    state.predicted_position = state.position + displacement;

    let moved = if !collide || displacement.norm_squared() <= MIN_MOVE_SQ {
        SweepMove::unobstructed(state.predicted_position)
    } else {
        world.sweep_move(&SweepRequest {
            feet: state.position,
            displacement,
            capsule: *capsule,
            step_offset,
            slope_limit_deg: settings.walkable_slope_limit,
            mask: settings.collision_mask,
            dt,
        })
    };

    state.position = nan_safe(moved.position, state.position);
    // Only the part of the offset that actually lowered the mover can be given back.
    let sunk = state.predicted_position.y + anti_bump - state.position.y;
    state.anti_bump = anti_bump.min(sunk.max(0.0));
    log::trace!(
        "integrated {displacement:?} -> {:?} (anti-bump {})",
        state.position,
        state.anti_bump
    );
    moved
}
