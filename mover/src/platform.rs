//! Riding movable platforms.
//!
//! While bound, the platform's motion since the last tick is folded into the mover's single
//! sweep as a carry offset. The binding is refreshed after the move.

use nalgebra as na;

use crate::forces::ForceAccumulator;
use crate::query::CollisionQuery;
use crate::state::{MoverState, PlatformBinding};
use crate::types::{Iso, Layer, ObjectRef, Quat, Vec2, Vec3};
use crate::utils::yaw_from_xz;

/// Translation and yaw the platform applied to the mover since the last tick.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PlatformCarry {
    pub translation: Vec3,
    pub yaw: f32,
}

/// Yaw (radians, about +Y) of the rotation taking `from` to `to`.
fn yaw_delta(from: &Quat, to: &Quat) -> f32 {
    let forward = (to * from.inverse()) * -Vec3::z();
    yaw_from_xz(Vec2::new(forward.x, forward.z)).unwrap_or(0.0)
}

/// How far the bound platform moved the mover's feet since the binding was refreshed.
pub fn carry<Q: CollisionQuery>(world: &Q, state: &MoverState) -> PlatformCarry {
    let Some(binding) = state.platform.as_ref() else {
        return PlatformCarry::default();
    };
    let Some(pose) = world.object_pose(binding.object) else {
        return PlatformCarry::default();
    };
    let target = pose * na::Point3::from(binding.local_position);
    PlatformCarry {
        translation: target.coords - state.position,
        yaw: yaw_delta(&binding.last_pose.rotation, &pose.rotation),
    }
}

fn bind(state: &mut MoverState, object: ObjectRef, pose: Iso) {
    state.platform = Some(PlatformBinding {
        object,
        local_position: pose.inverse_transform_point(&na::Point3::from(state.position)).coords,
        last_pose: pose,
        velocity: Vec3::zeros(),
    });
    state.platform_epoch = state.platform_epoch.wrapping_add(1);
    log::debug!("bound to platform {object:?}");
}

fn unbind(state: &mut MoverState) -> Option<PlatformBinding> {
    let binding = state.platform.take()?;
    state.platform_epoch = state.platform_epoch.wrapping_add(1);
    log::debug!("left platform {:?}", binding.object);
    Some(binding)
}

/// Refresh the platform binding after the move.
///
/// Returns the momentum handed to the external force when the mover leaves a platform
/// by losing ground.
pub fn update_binding<Q: CollisionQuery>(
    world: &Q,
    state: &mut MoverState,
    dt: f32,
) -> Option<Vec3> {
    let ground_platform = state
        .ground
        .grounded
        .then_some(state.ground.object)
        .flatten()
        .filter(|obj| world.object_layer(*obj) == Some(Layer::Platform))
        .and_then(|obj| world.object_pose(obj).map(|pose| (obj, pose)));

    let bound = state.platform.as_ref().map(|b| b.object);
    let bound_still_exists = bound.is_some_and(|obj| world.object_pose(obj).is_some());

    match (ground_platform, bound) {
        (Some((object, pose)), Some(current)) if current == object => {
            if let Some(binding) = state.platform.as_mut() {
                // Velocity of the riding point, spin included.
                let local = na::Point3::from(binding.local_position);
                binding.velocity = (pose * local - binding.last_pose * local) / dt;
                binding.local_position = pose
                    .inverse_transform_point(&na::Point3::from(state.position))
                    .coords;
                binding.last_pose = pose;
            }
            None
        }
        (Some((object, pose)), _) => {
            // Stepping from one solid onto another platform hands over silently.
            unbind(state);
            bind(state, object, pose);
            None
        }
        (None, Some(_)) if state.ground.grounded && bound_still_exists => {
            unbind(state);
            None
        }
        (None, Some(_)) => unbind(state).map(|binding| binding.velocity),
        (None, None) => None,
    }
}

/// Apply momentum returned by [`update_binding`].
pub fn impart(forces: &mut ForceAccumulator, momentum: Option<Vec3>) {
    if let Some(velocity) = momentum {
        log::debug!("platform momentum {velocity:?}");
        forces.add_force(velocity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GroundInfo;
    use crate::test_world::PlaneWorld;
    use crate::types::CapsuleSpec;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn on_platform(world: &PlaneWorld, object: ObjectRef) -> MoverState {
        let capsule = CapsuleSpec::new(0.4, 1.8, 0.02);
        let mut state = MoverState::new(Vec3::new(1.0, 0.02, 0.0), capsule);
        state.ground = GroundInfo {
            grounded: true,
            object: Some(object),
            ..GroundInfo::default()
        };
        assert!(world.object_pose(object).is_some());
        state
    }

    #[test]
    fn binds_then_carries_translation_and_yaw() {
        let platform = ObjectRef(7);
        let mut world = PlaneWorld::new().with_platform(platform, 0.0);
        let mut state = on_platform(&world, platform);

        assert!(update_binding(&world, &mut state, DT).is_none());
        assert_eq!(state.platform_epoch, 1);

        let turn = Quat::from_axis_angle(&Vec3::y_axis(), 0.5);
        world.set_pose(platform, Iso::from_parts(Vec3::new(0.0, 0.0, 0.2).into(), turn));
        let c = carry(&world, &state);
        assert_relative_eq!(c.yaw, 0.5, epsilon = 1e-5);
        let expected = turn * Vec3::new(1.0, 0.02, 0.0) + Vec3::new(0.0, 0.0, 0.2);
        assert_relative_eq!(state.position + c.translation, expected, epsilon = 1e-5);
    }

    #[test]
    fn leaving_by_air_hands_over_momentum() {
        let platform = ObjectRef(7);
        let mut world = PlaneWorld::new().with_platform(platform, 0.0);
        let mut state = on_platform(&world, platform);
        update_binding(&world, &mut state, DT);

        world.set_pose(platform, Iso::translation(0.05, 0.0, 0.0));
        state.position.x += 0.05;
        update_binding(&world, &mut state, DT);

        state.ground = GroundInfo::default();
        let momentum = update_binding(&world, &mut state, DT).unwrap();
        assert_relative_eq!(momentum, Vec3::new(3.0, 0.0, 0.0), epsilon = 1e-3);
        assert!(state.platform.is_none());
        assert_eq!(state.platform_epoch, 2);
    }

    #[test]
    fn leaving_a_spinning_platform_keeps_the_tangential_speed() {
        let platform = ObjectRef(7);
        let mut world = PlaneWorld::new().with_platform(platform, 0.0);
        let mut state = on_platform(&world, platform);
        update_binding(&world, &mut state, DT);

        // Rider sits 1 m out on +X; a turn about +Y swings it toward -Z.
        let angle = 0.06;
        let turn = Iso::rotation(Vec3::y() * angle);
        world.set_pose(platform, turn);
        state.position = turn * state.position;
        update_binding(&world, &mut state, DT);

        state.ground = GroundInfo::default();
        let momentum = update_binding(&world, &mut state, DT).unwrap();
        let expected = Vec3::new(angle.cos() - 1.0, 0.0, -angle.sin()) / DT;
        assert_relative_eq!(momentum, expected, epsilon = 1e-3);
        assert!(momentum.z < -3.0);
    }

    #[test]
    fn stepping_onto_static_ground_unbinds_silently() {
        let platform = ObjectRef(7);
        let world = PlaneWorld::new()
            .with_platform(platform, 0.0)
            .with_floor(ObjectRef(1), 0.0);
        let mut state = on_platform(&world, platform);
        update_binding(&world, &mut state, DT);

        state.ground.object = Some(ObjectRef(1));
        assert!(update_binding(&world, &mut state, DT).is_none());
        assert!(state.platform.is_none());
    }
}
