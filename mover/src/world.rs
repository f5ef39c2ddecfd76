//! Rapier-backed collision world.
//!
//! Colliders are parentless and posed directly, so there is no rigid-body simulation here.
//! The broad phase is refreshed whenever an object is moved, which keeps the query pipeline
//! (and the kinematic character controller that runs on it) in sync with platforms.

use std::f32::consts::FRAC_PI_2;

use rapier3d::control::{
    CharacterAutostep, CharacterCollision, CharacterLength, KinematicCharacterController,
};
use rapier3d::parry::query::{self, ShapeCastOptions};
use rapier3d::parry::shape::Shape;
use rapier3d::parry::utils::hashmap::HashMap;
use rapier3d::prelude::{
    Ball, BroadPhaseBvh, Capsule, Collider, ColliderBuilder, ColliderHandle, ColliderSet, Group,
    IntegrationParameters, InteractionGroups, NarrowPhase, QueryFilter, QueryPipeline,
    RigidBodySet, Vector,
};

use crate::bitmask_flags::FlagBitmask;
use crate::error::MoverError;
use crate::query::CollisionQuery;
use crate::settings::{CEILING_NORMAL_Y, DEFAULT_FIXED_DT, DIST_EPS};
use crate::types::{
    CapsuleSpec, ContactSide, ContactSides, Iso, Layer, LayerMask, ObjectRef, Quat, QueryHit,
    SweepMove, SweepRequest, Vec3,
};

/// Supported collider shapes. All dimensions are meters.
#[derive(Clone, Debug, PartialEq)]
pub enum ColliderShapeDef {
    /// Infinite half-space. The normal is the pose's local +Y, shifted along it by the offset.
    Plane { offset_along_normal: f32 },
    Cuboid { half_extents: Vec3 },
    Sphere { radius: f32 },
    CapsuleY { radius: f32, half_height: f32 },
    CylinderY { radius: f32, half_height: f32 },
}

/// One object of the collision world.
#[derive(Clone, Debug)]
pub struct WorldObjectDef {
    /// Stable id. Objects are inserted in id order so identical inputs build identical sets.
    pub id: ObjectRef,
    pub translation: Vec3,
    pub rotation: Quat,
    pub shape: ColliderShapeDef,
    pub layer: Layer,
    /// Overlap-only volume. Objects on [`Layer::Trigger`] are always sensors.
    pub sensor: bool,
}

impl WorldObjectDef {
    pub fn new(id: u32, translation: Vec3, shape: ColliderShapeDef) -> Self {
        Self {
            id: ObjectRef(id),
            translation,
            rotation: Quat::identity(),
            shape,
            layer: Layer::Default,
            sensor: false,
        }
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn on_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn as_sensor(mut self) -> Self {
        self.sensor = true;
        self
    }

    fn pose(&self) -> Iso {
        Iso::from_parts(self.translation.into(), self.rotation)
    }

    fn is_sensor(&self) -> bool {
        self.sensor || self.layer == Layer::Trigger
    }
}

/// Pack an object id and its layer into collider `user_data`.
///
/// Bits 0..32 hold the id, bits 32..40 the layer's bit index.
pub fn pack_user_data(id: ObjectRef, layer: Layer) -> u128 {
    u128::from(id.0) | (u128::from(layer.bit_index()) << 32)
}

pub fn unpack_user_data(data: u128) -> (ObjectRef, Layer) {
    let id = ObjectRef((data & 0xFFFF_FFFF) as u32);
    let layer = Layer::from_bit_index(((data >> 32) & 0xFF) as u8).unwrap_or(Layer::Default);
    (id, layer)
}

fn layer_group(layer: Layer) -> Group {
    Group::from_bits_truncate(layer.mask())
}

fn mask_group(mask: LayerMask) -> Group {
    Group::from_bits_truncate(mask.bits)
}

#[derive(Copy, Clone, Debug)]
struct ObjectEntry {
    handle: ColliderHandle,
    /// Collider pose relative to the object's pose (non-identity for offset planes).
    anchor: Iso,
}

/// Collision world built from [`WorldObjectDef`]s.
pub struct QueryWorld {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    objects: HashMap<ObjectRef, ObjectEntry>,
    dt: f32,
}

impl QueryWorld {
    /// Build a world from object definitions, sorted by id before insertion.
    pub fn build(mut defs: Vec<WorldObjectDef>, dt: f32) -> Self {
        defs.sort_by_key(|d| d.id);

        let bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let mut objects = HashMap::default();
        let mut modified = Vec::with_capacity(defs.len());

        for def in &defs {
            let (collider, anchor) = collider_from_def(def);
            let handle = colliders.insert(collider);
            if objects.insert(def.id, ObjectEntry { handle, anchor }).is_some() {
                log::warn!("duplicate world object id {:?}, keeping the last one", def.id);
            }
            modified.push(handle);
        }

        let mut world = Self {
            bodies,
            colliders,
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::default(),
            objects,
            dt: if dt > 0.0 { dt } else { DEFAULT_FIXED_DT },
        };
        world.refresh(&modified);
        log::info!("built query world with {} objects", world.objects.len());
        world
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Move an object (usually a platform) to a new pose.
    pub fn set_object_pose(&mut self, object: ObjectRef, pose: Iso) -> Result<(), MoverError> {
        let entry = *self
            .objects
            .get(&object)
            .ok_or(MoverError::UnknownObject(object))?;
        let collider = self
            .colliders
            .get_mut(entry.handle)
            .ok_or(MoverError::UnknownObject(object))?;
        collider.set_position(pose * entry.anchor);
        self.refresh(&[entry.handle]);
        Ok(())
    }

    fn refresh(&mut self, modified: &[ColliderHandle]) {
        let mut events = Vec::new();
        self.broad_phase.update(
            &IntegrationParameters {
                dt: self.dt,
                ..IntegrationParameters::default()
            },
            &self.colliders,
            &self.bodies,
            modified,
            &[],
            &mut events,
        );
    }

    fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }

    /// Colliders whose layer is in `mask`, with their unpacked id and layer.
    fn visible(&self, mask: LayerMask) -> impl Iterator<Item = (&Collider, ObjectRef, Layer)> {
        self.colliders.iter().filter_map(move |(_, collider)| {
            let (id, layer) = unpack_user_data(collider.user_data);
            mask.has(layer).then_some((collider, id, layer))
        })
    }

    /// Earliest hit of `shape` moving by `motion` from `pose`, measured in multiples of `motion`.
    fn cast(
        &self,
        pose: &Iso,
        motion: &Vec3,
        shape: &dyn Shape,
        max_toi: f32,
        mask: LayerMask,
    ) -> Option<QueryHit> {
        let mut opts = ShapeCastOptions::with_max_time_of_impact(max_toi);
        opts.stop_at_penetration = true;

        self.visible(mask)
            .filter_map(|(collider, id, layer)| {
                let hit = query::cast_shapes(
                    pose,
                    motion,
                    shape,
                    collider.position(),
                    &Vector::zeros(),
                    collider.shape(),
                    opts,
                )
                .ok()
                .flatten()?;

                // normal1 points from the query shape into the obstacle.
                let mut normal = -hit.normal1.into_inner();
                if normal.dot(motion) > 0.0 {
                    normal = -normal;
                }
                let origin = pose.translation.vector + motion * hit.time_of_impact;
                Some((
                    hit.time_of_impact,
                    QueryHit {
                        point: origin + hit.witness1.coords,
                        normal,
                        distance: hit.time_of_impact,
                        object: id,
                        layer,
                        is_trigger: collider.is_sensor(),
                    },
                ))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, hit)| hit)
    }

    fn character_controller(req: &SweepRequest) -> KinematicCharacterController {
        let autostep = (req.step_offset > 0.0).then(|| CharacterAutostep {
            include_dynamic_bodies: false,
            max_height: CharacterLength::Absolute(req.step_offset),
            min_width: CharacterLength::Absolute(req.capsule.radius * 0.5),
        });
        KinematicCharacterController {
            autostep,
            offset: CharacterLength::Absolute(req.capsule.skin_width.max(DIST_EPS)),
            max_slope_climb_angle: req.slope_limit_deg.to_radians(),
            // Sliding down slopes is the mover's own business.
            min_slope_slide_angle: FRAC_PI_2,
            snap_to_ground: None,
            ..KinematicCharacterController::default()
        }
    }

    fn contact_hit(&self, collision: &CharacterCollision) -> Option<QueryHit> {
        let collider = self.colliders.get(collision.handle)?;
        let (object, layer) = unpack_user_data(collider.user_data);
        // `character_pos` is already the pose at the time of impact.
        let pose = &collision.character_pos;
        Some(QueryHit {
            point: (pose * collision.hit.witness1).coords,
            normal: pose.rotation * -collision.hit.normal1.into_inner(),
            distance: collision.translation_applied.norm(),
            object,
            layer,
            is_trigger: collider.is_sensor(),
        })
    }
}

impl CollisionQuery for QueryWorld {
    fn sweep_capsule(
        &self,
        from: Vec3,
        to: Vec3,
        radius: f32,
        height: f32,
        mask: LayerMask,
    ) -> Option<QueryHit> {
        let capsule = CapsuleSpec::new(radius, height, 0.0);
        let shape = Capsule::new_y(capsule.half_segment(), radius);
        let motion = to - from;
        let len = motion.norm();
        let center = capsule.center(from);
        let pose = Iso::translation(center.x, center.y, center.z);

        self.cast(&pose, &motion, &shape, 1.0, mask).map(|mut hit| {
            hit.distance *= len;
            hit
        })
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
        let pose = Iso::translation(origin.x, origin.y, origin.z);
        self.cast(&pose, &dir, &Ball::new(radius), max_distance.max(0.0), mask)
    }

    fn sweep_move(&self, req: &SweepRequest) -> SweepMove {
        let kcc = Self::character_controller(req);
        let groups = InteractionGroups::all().with_filter(mask_group(req.mask));
        let filter = QueryFilter::default().exclude_sensors().groups(groups);
        let pipeline = self.query_pipeline(filter);

        let shape = Capsule::new_y(req.capsule.half_segment(), req.capsule.radius);
        let center = req.capsule.center(req.feet);
        let pose = Iso::translation(center.x, center.y, center.z);

        let mut collisions = Vec::new();
        let movement = kcc.move_shape(
            req.dt.max(DIST_EPS),
            &pipeline,
            &shape,
            &pose,
            req.displacement,
            |collision| collisions.push(collision),
        );

        let walkable_cos = req.slope_limit_deg.to_radians().cos();
        let mut sides = ContactSides::default();
        let mut last_hit = None;
        for hit in collisions.iter().filter_map(|c| self.contact_hit(c)) {
            let side = if hit.normal.y >= walkable_cos {
                ContactSide::Below
            } else if hit.normal.y < CEILING_NORMAL_Y {
                ContactSide::Above
            } else {
                ContactSide::Sides
            };
            sides.add(side);
            last_hit = Some(hit);
        }
        if movement.grounded {
            sides.add(ContactSide::Below);
        }

        log::trace!(
            "sweep_move {:?} -> {:?} ({} contacts)",
            req.displacement,
            movement.translation,
            collisions.len()
        );
        SweepMove {
            position: req.capsule.feet_from_center(center + movement.translation),
            sides,
            last_hit,
        }
    }

    fn penetrates(&self, feet: Vec3, capsule: &CapsuleSpec, mask: LayerMask) -> bool {
        let shape = Capsule::new_y(capsule.half_segment(), capsule.radius);
        let center = capsule.center(feet);
        let pose = Iso::translation(center.x, center.y, center.z);
        self.visible(mask)
            .filter(|(collider, _, _)| !collider.is_sensor())
            .any(|(collider, _, _)| {
                query::intersection_test(&pose, &shape, collider.position(), collider.shape())
                    .unwrap_or(false)
            })
    }

    fn object_pose(&self, object: ObjectRef) -> Option<Iso> {
        let entry = self.objects.get(&object)?;
        let collider = self.colliders.get(entry.handle)?;
        Some(collider.position() * entry.anchor.inverse())
    }

    fn object_layer(&self, object: ObjectRef) -> Option<Layer> {
        let entry = self.objects.get(&object)?;
        let collider = self.colliders.get(entry.handle)?;
        Some(unpack_user_data(collider.user_data).1)
    }
}

/// Build a parentless collider for `def`, posed in world space.
///
/// Returns the collider and its anchor relative to the object pose.
fn collider_from_def(def: &WorldObjectDef) -> (Collider, Iso) {
    let (builder, anchor) = match &def.shape {
        ColliderShapeDef::Plane {
            offset_along_normal,
        } => (
            ColliderBuilder::halfspace(Vector::y_axis()),
            Iso::translation(0.0, *offset_along_normal, 0.0),
        ),
        ColliderShapeDef::Cuboid { half_extents } => (
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z),
            Iso::identity(),
        ),
        ColliderShapeDef::Sphere { radius } => (ColliderBuilder::ball(*radius), Iso::identity()),
        ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        } => (ColliderBuilder::capsule_y(*half_height, *radius), Iso::identity()),
        ColliderShapeDef::CylinderY {
            radius,
            half_height,
        } => (ColliderBuilder::cylinder(*half_height, *radius), Iso::identity()),
    };

    let mut collider = builder
        .sensor(def.is_sensor())
        .collision_groups(InteractionGroups::all().with_memberships(layer_group(def.layer)))
        .user_data(pack_user_data(def.id, def.layer))
        .build();
    collider.set_position(def.pose() * anchor);
    (collider, anchor)
}
