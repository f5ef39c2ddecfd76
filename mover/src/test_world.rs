//! Analytic half-space world for unit tests.
//!
//! Every object is an infinite plane with solid space behind its normal, which makes contact
//! distances exact and lets tests reason about positions without a physics engine.

use crate::query::CollisionQuery;
use crate::settings::{CEILING_NORMAL_Y, DIST_EPS, MIN_MOVE_SQ};
use crate::types::{
    CapsuleSpec, ContactSide, ContactSides, Iso, Layer, LayerMask, ObjectRef, QueryHit,
    SweepMove, SweepRequest, Vec3,
};
use crate::utils::horizontal;

const MAX_SLIDE_ITERATIONS: usize = 4;

#[derive(Clone, Debug)]
struct PlaneObject {
    id: ObjectRef,
    layer: Layer,
    local_normal: Vec3,
    pose: Iso,
}

impl PlaneObject {
    fn normal(&self) -> Vec3 {
        self.pose.rotation * self.local_normal
    }

    fn origin(&self) -> Vec3 {
        self.pose.translation.vector
    }

    fn sphere_distance(&self, center: Vec3, radius: f32) -> f32 {
        self.normal().dot(&(center - self.origin())) - radius
    }

    /// Signed distance from the capsule surface to the plane, plus the closer sphere center.
    fn capsule_distance(&self, feet: Vec3, capsule: &CapsuleSpec) -> (f32, Vec3) {
        let bottom = capsule.bottom_sphere(feet);
        let top = capsule.top_sphere(feet);
        let db = self.sphere_distance(bottom, capsule.radius);
        let dt = self.sphere_distance(top, capsule.radius);
        if db <= dt { (db, bottom) } else { (dt, top) }
    }

    fn hit(&self, point: Vec3, distance: f32) -> QueryHit {
        QueryHit {
            point,
            normal: self.normal(),
            distance,
            object: self.id,
            layer: self.layer,
            is_trigger: self.layer == Layer::Trigger,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct PlaneWorld {
    objects: Vec<PlaneObject>,
}

impl PlaneWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_floor(self, id: ObjectRef, y: f32) -> Self {
        self.with_object(id, Layer::Default, Vec3::y(), Iso::translation(0.0, y, 0.0))
    }

    pub fn with_plane(self, id: ObjectRef, point: Vec3, normal: Vec3) -> Self {
        let pose = Iso::translation(point.x, point.y, point.z);
        self.with_object(id, Layer::Default, normal.normalize(), pose)
    }

    pub fn with_platform(self, id: ObjectRef, y: f32) -> Self {
        self.with_object(id, Layer::Platform, Vec3::y(), Iso::translation(0.0, y, 0.0))
    }

    pub fn with_trigger(self, id: ObjectRef, point: Vec3, normal: Vec3) -> Self {
        let pose = Iso::translation(point.x, point.y, point.z);
        self.with_object(id, Layer::Trigger, normal.normalize(), pose)
    }

    fn with_object(mut self, id: ObjectRef, layer: Layer, local_normal: Vec3, pose: Iso) -> Self {
        self.objects.push(PlaneObject {
            id,
            layer,
            local_normal,
            pose,
        });
        self
    }

    pub fn set_pose(&mut self, id: ObjectRef, pose: Iso) {
        if let Some(obj) = self.objects.iter_mut().find(|o| o.id == id) {
            obj.pose = pose;
        }
    }

    pub fn remove(&mut self, id: ObjectRef) {
        self.objects.retain(|o| o.id != id);
    }

    fn visible(&self, mask: LayerMask) -> impl Iterator<Item = &PlaneObject> {
        self.objects.iter().filter(move |o| mask.has(o.layer))
    }
}

impl CollisionQuery for PlaneWorld {
    fn sweep_capsule(
        &self,
        from: Vec3,
        to: Vec3,
        radius: f32,
        height: f32,
        mask: LayerMask,
    ) -> Option<QueryHit> {
        let capsule = CapsuleSpec::new(radius, height, 0.0);
        let motion = to - from;
        let len = motion.norm();

        self.visible(mask)
            .filter_map(|obj| {
                let rate = obj.normal().dot(&motion);
                let (d0, _) = obj.capsule_distance(from, &capsule);
                if rate >= 0.0 && d0 > 0.0 {
                    return None;
                }
                let s = if d0 <= 0.0 { 0.0 } else { d0 / -rate };
                if s > 1.0 {
                    return None;
                }
                let feet = from + motion * s;
                let (_, center) = obj.capsule_distance(feet, &capsule);
                Some(obj.hit(center - obj.normal() * radius, s * len))
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn sphere_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<QueryHit> {
        let dir = direction.try_normalize(DIST_EPS)?;
        self.visible(mask)
            .filter_map(|obj| {
                let rate = obj.normal().dot(&dir);
                if rate >= 0.0 {
                    return None;
                }
                let t = (obj.sphere_distance(origin, radius) / -rate).max(0.0);
                (t <= max_distance)
                    .then(|| obj.hit(origin + dir * t - obj.normal() * radius, t))
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn sweep_move(&self, req: &SweepRequest) -> SweepMove {
        let skin = req.capsule.skin_width;
        let walkable_cos = req.slope_limit_deg.to_radians().cos();
        let mut pos = req.feet;
        let mut remaining = req.displacement;
        let mut sides = ContactSides::default();
        let mut last_hit = None;

        for _ in 0..MAX_SLIDE_ITERATIONS {
            if remaining.norm_squared() <= MIN_MOVE_SQ {
                break;
            }

            let first = self
                .visible(req.mask)
                .filter(|obj| obj.layer != Layer::Trigger)
                .filter_map(|obj| {
                    let rate = obj.normal().dot(&remaining);
                    if rate >= 0.0 {
                        return None;
                    }
                    let (d0, _) = obj.capsule_distance(pos, &req.capsule);
                    let t = ((d0 - skin) / -rate).max(0.0);
                    (t <= 1.0).then_some((t, obj))
                })
                .min_by(|a, b| a.0.total_cmp(&b.0));

            let Some((t, obj)) = first else {
                pos += remaining;
                break;
            };

            let n = obj.normal();
            pos += remaining * t;
            let (d, center) = obj.capsule_distance(pos, &req.capsule);
            if d < skin {
                pos += n * (skin - d);
            }
            last_hit = Some(obj.hit(center - n * req.capsule.radius, 0.0));

            // Upward-facing hits keep only the horizontal intent, carried along the surface.
            // Steep ones block it like a wall when it points into them.
            let leftover = remaining * (1.0 - t);
            let h = horizontal(leftover);
            if n.y >= walkable_cos {
                sides.add(ContactSide::Below);
                remaining = h - n * h.dot(&n);
            } else if n.y > DIST_EPS {
                sides.add(ContactSide::Sides);
                let wall = horizontal(n).normalize();
                let into = h.dot(&wall);
                remaining = if into < 0.0 { h - wall * into } else { h - n * h.dot(&n) };
            } else {
                let side = if n.y < CEILING_NORMAL_Y {
                    ContactSide::Above
                } else {
                    ContactSide::Sides
                };
                sides.add(side);
                remaining = leftover - n * leftover.dot(&n);
            }
        }

        SweepMove {
            position: pos,
            sides,
            last_hit,
        }
    }

    fn penetrates(&self, feet: Vec3, capsule: &CapsuleSpec, mask: LayerMask) -> bool {
        self.visible(mask)
            .filter(|obj| obj.layer != Layer::Trigger)
            .any(|obj| obj.capsule_distance(feet, capsule).0 < -DIST_EPS)
    }

    fn object_pose(&self, object: ObjectRef) -> Option<Iso> {
        self.objects.iter().find(|o| o.id == object).map(|o| o.pose)
    }

    fn object_layer(&self, object: ObjectRef) -> Option<Layer> {
        self.objects.iter().find(|o| o.id == object).map(|o| o.layer)
    }
}
