use nalgebra as na;

use crate::bitmask_flags::BitmaskFlags;
use crate::define_bitmask_flags;

pub type Vec2 = na::Vector2<f32>;
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// Stable handle for an object owned by the collision world.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(pub u32);

define_bitmask_flags!(Layer, u32, {
    Default,
    /// Movable solids the mover rides.
    Platform,
    /// Non-solid volumes; reported but never blocking.
    Trigger,
    Debris,
    Player,
});

pub type LayerMask = BitmaskFlags<u32>;

impl Layer {
    /// Everything the mover collides with.
    pub fn solid_mask() -> LayerMask {
        LayerMask::of(&[Layer::Default, Layer::Platform, Layer::Debris])
    }
}

define_bitmask_flags!(ContactSide, u8, { Below, Sides, Above });

pub type ContactSides = BitmaskFlags<u8>;

/// Y-aligned capsule anchored at the feet.
///
/// `height` is the full extent from the bottom of the lower hemisphere to the top of the
/// upper one, so the cylinder part is `height - 2 * radius` long.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CapsuleSpec {
    pub radius: f32,
    pub height: f32,
    /// Separation kept from surfaces during sweeps (meters).
    pub skin_width: f32,
}

impl CapsuleSpec {
    pub fn new(radius: f32, height: f32, skin_width: f32) -> Self {
        Self {
            radius,
            height,
            skin_width,
        }
    }

    /// Half length of the cylinder segment (parry/rapier `Capsule::new_y` convention).
    pub fn half_segment(&self) -> f32 {
        (self.height * 0.5 - self.radius).max(0.0)
    }

    /// World-space capsule center for a feet position.
    pub fn center(&self, feet: Vec3) -> Vec3 {
        feet + Vec3::y() * (self.height * 0.5)
    }

    pub fn feet_from_center(&self, center: Vec3) -> Vec3 {
        center - Vec3::y() * (self.height * 0.5)
    }

    /// Center of the lower hemisphere.
    pub fn bottom_sphere(&self, feet: Vec3) -> Vec3 {
        feet + Vec3::y() * self.radius
    }

    /// Center of the upper hemisphere.
    pub fn top_sphere(&self, feet: Vec3) -> Vec3 {
        feet + Vec3::y() * (self.height - self.radius).max(self.radius)
    }
}

/// A single blocking (or trigger) contact reported by a collision query.
///
/// `None` in place of a `QueryHit` is the "no hit" result.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QueryHit {
    pub point: Vec3,
    /// Surface normal of the hit object, pointing back toward the query shape.
    pub normal: Vec3,
    /// Distance travelled along the cast direction before contact.
    pub distance: f32,
    pub object: ObjectRef,
    pub layer: Layer,
    pub is_trigger: bool,
}

/// Input of the single per-tick sweep-move.
#[derive(Copy, Clone, Debug)]
pub struct SweepRequest {
    pub feet: Vec3,
    pub displacement: Vec3,
    pub capsule: CapsuleSpec,
    /// Ledges up to this height are climbed without blocking. `0.0` disables stepping.
    pub step_offset: f32,
    /// Steepest slope (degrees) that can be walked up.
    pub slope_limit_deg: f32,
    pub mask: LayerMask,
    pub dt: f32,
}

/// Result of a sweep-move: where the feet ended up and what was touched on the way.
#[derive(Copy, Clone, Debug)]
pub struct SweepMove {
    pub position: Vec3,
    pub sides: ContactSides,
    pub last_hit: Option<QueryHit>,
}

impl SweepMove {
    pub fn unobstructed(position: Vec3) -> Self {
        Self {
            position,
            sides: ContactSides::default(),
            last_hit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn capsule_anchors_are_measured_from_the_feet() {
        let capsule = CapsuleSpec::new(0.4, 1.8, 0.02);
        let feet = Vec3::new(1.0, 2.0, 3.0);

        assert_relative_eq!(capsule.half_segment(), 0.5);
        assert_relative_eq!(capsule.center(feet), Vec3::new(1.0, 2.9, 3.0));
        assert_relative_eq!(capsule.feet_from_center(capsule.center(feet)), feet);
        assert_relative_eq!(capsule.bottom_sphere(feet).y, 2.4);
        assert_relative_eq!(capsule.top_sphere(feet).y, 3.4);
    }

    #[test]
    fn solid_mask_skips_triggers_and_players() {
        let mask = Layer::solid_mask();
        assert!(mask.has(Layer::Default));
        assert!(mask.has(Layer::Platform));
        assert!(!mask.has(Layer::Trigger));
        assert!(!mask.has(Layer::Player));
    }
}
