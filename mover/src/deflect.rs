//! Collision response on the force vectors.
//!
//! After the sweep-move, the gap between predicted and actual position tells us what was
//! hit. Blocked force is redirected (ceilings, walls) or turned into an impact report
//! (landing), so a blocked force never keeps pushing into a surface.

use crate::events::MoverEvent;
use crate::query::CollisionQuery;
use crate::settings::{CEILING_NORMAL_Y, DIST_EPS, MoverSettings};
use crate::state::MoverState;
use crate::types::{CapsuleSpec, ContactSide, QueryHit, SweepMove, Vec3};
use crate::utils::{horizontal, is_negligible, reflect, with_y, yaw_right};

/// What the deflector did this tick.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Deflection {
    pub head_impact: bool,
    pub landed: bool,
}

/// Run the ceiling, wall and landing cases in that order.
///
/// `contact` is what the tick's sweep-move touched.
pub fn deflect<Q: CollisionQuery>(
    world: &Q,
    state: &mut MoverState,
    capsule: &CapsuleSpec,
    contact: &SweepMove,
    settings: &MoverSettings,
    events: &mut Vec<MoverEvent>,
) -> Deflection {
    let head_impact = deflect_ceiling(world, state, capsule, contact, settings, events);
    deflect_wall(world, state, settings, events);
    Deflection {
        head_impact,
        landed: land(state, settings, events),
    }
}

/// The ceiling the sweep ran into, or failing that one just above the head.
fn ceiling_hit<Q: CollisionQuery>(
    world: &Q,
    state: &MoverState,
    capsule: &CapsuleSpec,
    contact: &SweepMove,
    settings: &MoverSettings,
) -> Option<QueryHit> {
    let swept = contact
        .last_hit
        .filter(|hit| contact.sides.has(ContactSide::Above) && hit.normal.y < CEILING_NORMAL_Y);
    swept
        .or_else(|| {
            world.sphere_cast(
                capsule.top_sphere(state.position),
                Vec3::y(),
                capsule.radius,
                capsule.skin_width + settings.ground_probe_margin,
                settings.collision_mask,
            )
        })
        .filter(|hit| !hit.is_trigger)
}

/// Blocked upward motion under a ceiling slides off along the ceiling instead.
fn deflect_ceiling<Q: CollisionQuery>(
    world: &Q,
    state: &mut MoverState,
    capsule: &CapsuleSpec,
    contact: &SweepMove,
    settings: &MoverSettings,
    events: &mut Vec<MoverEvent>,
) -> bool {
    let stalled = state.predicted_position.y > state.position.y + DIST_EPS;
    let pushing_up =
        state.forces.external_force.y > 0.0 || state.forces.motor_throttle.y > 0.0;
    if !stalled || !pushing_up {
        return false;
    }
    let Some(hit) = ceiling_hit(world, state, capsule, contact, settings) else {
        return false;
    };

    let n = hit.normal;
    let tangent = horizontal(n.cross(&Vec3::y()).cross(&n));
    let impact = state.forces.motor_throttle.y + state.forces.external_force.y;
    let slide = tangent * impact * (1.0 - settings.wall_friction);
    let absorbed = impact - slide.norm();

    state.forces.add_force(slide * settings.time_scale);
    state.forces.motor_throttle.y = 0.0;
    state.forces.external_force.y = 0.0;
    state.fall_speed = 0.0;

    let side = if tangent.dot(&yaw_right(state.yaw)) < 0.0 { -1.0 } else { 1.0 };
    log::debug!("head impact {absorbed} against {:?}", hit.object);
    events.push(MoverEvent::HeadImpact(absorbed * side));
    true
}

/// External force driven into a wall is turned along it.
fn deflect_wall<Q: CollisionQuery>(
    world: &Q,
    state: &mut MoverState,
    settings: &MoverSettings,
    events: &mut Vec<MoverEvent>,
) -> bool {
    let blocked = horizontal(state.predicted_position - state.position).norm() > DIST_EPS;
    let external = horizontal(state.forces.external_force);
    if !blocked || is_negligible(&external) {
        return false;
    }

    // Level with where the tick started, using the previous tick's capsule.
    let from = state.prev_position;
    let capsule = state.last_capsule;
    let Some(hit) = world.sweep_capsule(
        from,
        with_y(state.predicted_position, from.y),
        capsule.radius,
        capsule.height,
        settings.collision_mask,
    ) else {
        return false;
    };
    let walkable_cos = settings.walkable_slope_limit.to_radians().cos();
    if hit.is_trigger || hit.normal.y >= walkable_cos || state.ground.object == Some(hit.object) {
        return false;
    }

    let Some(turn) = WallTurn::new(&hit, &external, settings) else {
        return false;
    };

    let deflected = turn.apply(&external);
    state.forces.external_force = with_y(deflected, state.forces.external_force.y);
    for slot in state.forces.soft.iter_mut() {
        let h = horizontal(*slot);
        if !is_negligible(&h) {
            *slot = with_y(turn.apply(&h), slot.y);
        }
    }

    let absorbed = external - deflected;
    log::debug!("wall impact {absorbed:?} against {:?}", hit.object);
    events.push(MoverEvent::ForceImpact(absorbed));
    true
}

/// Direction and scale a horizontal force takes after hitting a wall.
#[derive(Copy, Clone, Debug)]
struct WallTurn {
    direction: Vec3,
    multiplier: f32,
}

impl WallTurn {
    fn new(hit: &QueryHit, approach: &Vec3, settings: &MoverSettings) -> Option<Self> {
        let wall = horizontal(hit.normal).try_normalize(DIST_EPS)?;
        let incoming = approach.try_normalize(DIST_EPS)?;

        let mut direction = wall.cross(&Vec3::y()).try_normalize(DIST_EPS)?;
        if direction.dot(&incoming) < 0.0 {
            direction = -direction;
        }

        let friction = 1.0 - settings.wall_friction;
        let mut multiplier = incoming.dot(&direction).abs() * friction;
        if settings.wall_bounce > 0.0 {
            let bounce = settings.wall_bounce;
            direction = direction
                .lerp(&reflect(&incoming, &wall), bounce)
                .try_normalize(DIST_EPS)
                .unwrap_or(direction);
            multiplier += (1.0 - multiplier) * bounce * friction;
        }
        Some(Self {
            direction,
            multiplier,
        })
    }

    fn apply(&self, force: &Vec3) -> Vec3 {
        self.direction * force.norm() * self.multiplier
    }
}

/// Report the fall that just ended and reset jump accumulators.
fn land(state: &mut MoverState, settings: &MoverSettings, events: &mut Vec<MoverEvent>) -> bool {
    if !state.on_new_ground {
        return false;
    }

    if let Some(start) = state.fall_start_height.take() {
        let impact = (start - state.position.y) * settings.fall_impact_multiplier;
        if impact > settings.fall_impact_threshold {
            log::debug!("fall impact {impact}");
            events.push(MoverEvent::FallImpact(impact));
        }
    }
    // A jump taking off from this contact keeps its throttle.
    if state.jump.initiating_ticks == 0 {
        state.jump.reset_accumulators();
        state.forces.motor_throttle.y = 0.0;
    }
    true
}
