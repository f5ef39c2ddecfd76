//! Variable-rate render position.
//!
//! The authoritative position only moves on fixed ticks. Each render frame replays the last
//! tick's velocity from the render position with a sweep, then relaxes toward the
//! authoritative position. Nothing here writes to [`MoverState`].

use crate::query::CollisionQuery;
use crate::settings::{MIN_MOVE_SQ, MoverSettings, RENDER_SNAP_EPS};
use crate::state::MoverState;
use crate::types::{CapsuleSpec, SweepRequest, Vec3};
use crate::utils::nan_safe;

#[derive(Clone, Debug, PartialEq)]
pub struct RenderReconciler {
    position: Vec3,
    platform_epoch: u32,
}

impl RenderReconciler {
    pub fn new(position: Vec3, platform_epoch: u32) -> Self {
        Self {
            position,
            platform_epoch,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn snap(&mut self, state: &MoverState) {
        self.position = state.position;
        self.platform_epoch = state.platform_epoch;
    }

    /// Advance the render position by one frame of `frame_dt` seconds.
    ///
    /// `world` is `None` when collision is disabled; the replay then moves freely.
    pub fn step<Q: CollisionQuery>(
        &mut self,
        world: Option<&Q>,
        state: &MoverState,
        capsule: &CapsuleSpec,
        step_offset: f32,
        settings: &MoverSettings,
        frame_dt: f32,
    ) -> Vec3 {
        if self.platform_epoch != state.platform_epoch {
            log::trace!("platform binding changed, snapping render position");
            self.snap(state);
            return self.position;
        }

        let frame_dt = frame_dt.max(0.0);
        let mut velocity = state.move_direction;
        if let Some(binding) = state.platform.as_ref() {
            velocity += binding.velocity;
        }
        let displacement = nan_safe(velocity * frame_dt, Vec3::zeros());

        let replayed = match world {
            Some(world) if displacement.norm_squared() > MIN_MOVE_SQ => {
                world
                    .sweep_move(&SweepRequest {
                        feet: self.position,
                        displacement,
                        capsule: *capsule,
                        step_offset,
                        slope_limit_deg: settings.walkable_slope_limit,
                        mask: settings.collision_mask,
                        dt: frame_dt,
                    })
                    .position
            }
            _ => self.position + displacement,
        };
        self.position = nan_safe(replayed, self.position);

        if (self.position - state.position).norm() > capsule.radius {
            log::trace!("render position drifted past the radius, snapping");
            self.snap(state);
            return self.position;
        }

        let relax = (frame_dt * settings.render_relax_rate).clamp(0.0, 1.0);
        self.position = self.position.lerp(&state.position, relax);
        if (self.position - state.position).norm() < RENDER_SNAP_EPS {
            self.position = state.position;
        }
        self.position
    }
}
