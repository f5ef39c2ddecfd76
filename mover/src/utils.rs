use crate::settings::DIST_EPS;
use crate::types::{Vec2, Vec3};

/// Minimum planar length required to derive a yaw.
const YAW_EPS: f32 = 1.0e-6;

/// Returns `value` unless it contains a NaN or infinity, in which case `fallback` is kept.
#[inline]
pub fn nan_safe(value: Vec3, fallback: Vec3) -> Vec3 {
    if value.iter().all(|c| c.is_finite()) {
        value
    } else {
        log::warn!("discarding non-finite vector {value:?}");
        fallback
    }
}

#[inline]
pub fn nan_safe_f32(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

/// The XZ part of a vector (Y zeroed).
#[inline]
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

#[inline]
pub fn with_y(v: Vec3, y: f32) -> Vec3 {
    Vec3::new(v.x, y, v.z)
}

/// Forward direction for a yaw (radians). Yaw 0 faces -Z.
#[inline]
pub fn yaw_forward(yaw: f32) -> Vec3 {
    Vec3::new(-yaw.sin(), 0.0, -yaw.cos())
}

/// Right direction for a yaw (radians).
#[inline]
pub fn yaw_right(yaw: f32) -> Vec3 {
    Vec3::new(yaw.cos(), 0.0, -yaw.sin())
}

/// Yaw that faces along a planar direction, if it is long enough to have one.
pub fn yaw_from_xz(xz: Vec2) -> Option<f32> {
    if xz.norm_squared() > YAW_EPS {
        return Some((-xz.x).atan2(-xz.y));
    }
    None
}

/// Angle between two vectors in degrees, 0 if either is degenerate.
pub fn angle_deg(a: &Vec3, b: &Vec3) -> f32 {
    let len = a.norm() * b.norm();
    if len <= f32::EPSILON {
        return 0.0;
    }
    (a.dot(b) / len).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Component-wise check that a vector is (almost) zero.
#[inline]
pub fn is_negligible(v: &Vec3) -> bool {
    v.norm_squared() <= DIST_EPS * DIST_EPS
}

/// Reflect `v` about the plane with unit `normal`.
#[inline]
pub fn reflect(v: &Vec3, normal: &Vec3) -> Vec3 {
    v - normal * (2.0 * v.dot(normal))
}
