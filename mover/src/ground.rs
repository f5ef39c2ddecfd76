use crate::query::CollisionQuery;
use crate::settings::MoverSettings;
use crate::state::{GroundInfo, MoverState};
use crate::types::{CapsuleSpec, Vec3};
use crate::utils::angle_deg;

/// Hits whose normal points less upward than this are walls, not ground.
const MIN_GROUND_NORMAL_Y: f32 = 1.0e-3;

/// Probe for ground under the capsule and refresh the contact state.
///
/// Casts a sphere of the capsule radius down from the lower hemisphere center by the skin
/// width plus a small margin. Also starts fall tracking and queues the anti-bump reversal
/// when ground disappears.
pub fn sense_ground<Q: CollisionQuery>(
    world: &Q,
    state: &mut MoverState,
    capsule: &CapsuleSpec,
    settings: &MoverSettings,
    jump_initiating: bool,
) {
    let origin = capsule.bottom_sphere(state.position);
    let reach = capsule.skin_width + settings.ground_probe_margin;

    let ground = world
        .sphere_cast(
            origin,
            -Vec3::y(),
            capsule.radius,
            reach,
            settings.collision_mask,
        )
        .filter(|hit| !hit.is_trigger && hit.normal.y > MIN_GROUND_NORMAL_Y)
        .map(|hit| GroundInfo {
            grounded: true,
            normal: hit.normal,
            angle_deg: angle_deg(&hit.normal, &Vec3::y()),
            point: hit.point,
            object: Some(hit.object),
        })
        .unwrap_or_default();
    apply_ground(state, ground, jump_initiating);
}

/// Install a fresh ground reading and derive the transition state from it.
pub fn apply_ground(state: &mut MoverState, ground: GroundInfo, jump_initiating: bool) {
    state.was_grounded = state.ground.grounded;
    state.ground = ground;
    state.on_new_ground = state.ground.grounded && !state.was_grounded;

    if state.ground.grounded {
        return;
    }

    if state.was_grounded && state.anti_bump > 0.0 {
        state.pending_anti_bump_reversal = state.anti_bump;
        log::trace!("ground lost under anti-bump, reversing {}", state.anti_bump);
    }

    if state.velocity.y < 0.0 && !jump_initiating && state.fall_start_height.is_none() {
        state.fall_start_height = Some(state.position.y);
        log::trace!("fall started at {}", state.position.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_world::PlaneWorld;
    use crate::types::{Layer, ObjectRef};
    use approx::assert_relative_eq;

    fn capsule() -> CapsuleSpec {
        CapsuleSpec::new(0.4, 1.8, 0.02)
    }

    #[test]
    fn finds_floor_within_probe_and_misses_above_it() {
        let world = PlaneWorld::new().with_floor(ObjectRef(1), 0.0);
        let settings = MoverSettings::default();

        let mut state = MoverState::new(Vec3::new(0.0, 0.02, 0.0), capsule());
        sense_ground(&world, &mut state, &capsule(), &settings, false);
        assert!(state.ground.grounded);
        assert!(state.on_new_ground);
        assert_eq!(state.ground.object, Some(ObjectRef(1)));
        assert_relative_eq!(state.ground.angle_deg, 0.0, epsilon = 1e-3);

        let mut high = MoverState::new(Vec3::new(0.0, 0.5, 0.0), capsule());
        sense_ground(&world, &mut high, &capsule(), &settings, false);
        assert!(!high.ground.grounded);
    }

    #[test]
    fn trigger_volumes_are_not_ground() {
        let world = PlaneWorld::new().with_trigger(ObjectRef(3), Vec3::zeros(), Vec3::y());
        let settings = MoverSettings {
            collision_mask: Layer::solid_mask().with(Layer::Trigger),
            ..MoverSettings::default()
        };

        let mut state = MoverState::new(Vec3::new(0.0, 0.02, 0.0), capsule());
        sense_ground(&world, &mut state, &capsule(), &settings, false);
        assert!(!state.ground.grounded);
        assert!(state.ground.object.is_none());
    }

    #[test]
    fn reports_slope_angle() {
        let a = 35.0_f32.to_radians();
        let world = PlaneWorld::new().with_plane(
            ObjectRef(2),
            Vec3::zeros(),
            Vec3::new(a.sin(), a.cos(), 0.0),
        );
        let mut state = MoverState::new(Vec3::new(0.0, 0.12, 0.0), capsule());
        sense_ground(&world, &mut state, &capsule(), &MoverSettings::default(), false);
        assert!(state.ground.grounded);
        assert_relative_eq!(state.ground.angle_deg, 35.0, epsilon = 1e-2);
    }

    #[test]
    fn losing_ground_starts_a_fall_and_queues_reversal() {
        let mut state = MoverState::new(Vec3::new(0.0, 3.0, 0.0), capsule());
        state.ground.grounded = true;
        state.anti_bump = 0.3;
        state.velocity.y = -2.0;

        apply_ground(&mut state, GroundInfo::default(), false);
        assert!(!state.ground.grounded);
        assert_eq!(state.fall_start_height, Some(3.0));
        assert_eq!(state.pending_anti_bump_reversal, 0.3);

        // A second airborne tick keeps the original start height.
        state.position.y = 2.0;
        apply_ground(&mut state, GroundInfo::default(), false);
        assert_eq!(state.fall_start_height, Some(3.0));
    }

    #[test]
    fn jump_take_off_is_not_a_fall() {
        let mut state = MoverState::new(Vec3::new(0.0, 1.0, 0.0), capsule());
        state.ground.grounded = true;
        state.velocity.y = -0.1;
        apply_ground(&mut state, GroundInfo::default(), true);
        assert!(state.fall_start_height.is_none());
    }
}
