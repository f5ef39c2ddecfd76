use crate::types::{
    CapsuleSpec, Iso, Layer, LayerMask, ObjectRef, QueryHit, SweepMove, SweepRequest, Vec3,
};

/// Geometry collaborator the mover runs against.
///
/// The mover never implements geometry itself; every contact it reasons about comes from
/// one of these calls. Capsules are Y-aligned and addressed by their feet position.
pub trait CollisionQuery {
    /// Sweep a capsule from `from` to `to` and report the first contact.
    fn sweep_capsule(
        &self,
        from: Vec3,
        to: Vec3,
        radius: f32,
        height: f32,
        mask: LayerMask,
    ) -> Option<QueryHit>;

    /// Cast a sphere from `origin` along `direction` up to `max_distance`.
    fn sphere_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<QueryHit>;

    /// Move a capsule through the world, halting at blocking contacts and sliding along them.
    fn sweep_move(&self, req: &SweepRequest) -> SweepMove;

    /// Whether a capsule at `feet` overlaps any solid in `mask`.
    fn penetrates(&self, feet: Vec3, capsule: &CapsuleSpec, mask: LayerMask) -> bool;

    fn object_pose(&self, object: ObjectRef) -> Option<Iso>;

    fn object_layer(&self, object: ObjectRef) -> Option<Layer>;
}
