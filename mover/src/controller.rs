//! The mover controller: fixed-tick simulation, render reconciliation and the host API.
//!
//! A fixed tick always runs in this order: scheduled actions, intent, ground sensor,
//! activities, forces and gravity, one sweep-move, deflection, platform binding, velocity
//! bookkeeping. Render frames only touch the render position.

use crate::activity::{Activity, ActivityGate, ActivityHooks, ActivitySet, ActivityTable};
use crate::deflect::{Deflection, deflect};
use crate::error::MoverError;
use crate::events::MoverEvent;
use crate::forces::{MotorInput, calculate_max_speed, update_jump};
use crate::gravity::{slope_factor, update_fall_speed, update_sliding};
use crate::ground;
use crate::intent::{IntentSource, MoveIntent};
use crate::motion::integrate;
use crate::platform;
use crate::query::CollisionQuery;
use crate::render::RenderReconciler;
use crate::schedule::{ScheduledAction, Scheduler};
use crate::settings::{MIN_MOVE_SQ, MoverSettings};
use crate::state::{GroundInfo, MoverState};
use crate::types::{CapsuleSpec, Iso, ObjectRef, Quat, Vec3};
use crate::utils::{nan_safe, nan_safe_f32};
use crate::volume::CollisionVolumeShape;

/// Ticks after a jump starts during which ground loss is not treated as a fall.
const JUMP_TAKEOFF_TICKS: u32 = 5;

#[derive(Clone, Debug, PartialEq)]
pub enum ControllerStatus {
    Active,
    Disabled(MoverError),
}

/// Controller state shared with the activity hooks.
pub(crate) struct Core<Q> {
    settings: MoverSettings,
    world: Option<Q>,
    volume: Box<dyn CollisionVolumeShape>,
    gate: Box<dyn ActivityGate>,
    state: MoverState,
    schedule: Scheduler<ScheduledAction>,
    events: Vec<MoverEvent>,
    tick: u64,
    status: ControllerStatus,
    render: RenderReconciler,
    intent: MoveIntent,
    /// A crouch exit was blocked; waiting for the scheduled retry.
    stand_blocked: bool,
}

impl<Q: CollisionQuery> Core<Q> {
    fn emit(&mut self, event: MoverEvent) {
        log::debug!("mover event {event:?}");
        self.gate.notify(&event);
        self.events.push(event);
    }

    /// Whether the standing capsule fits above the current (crouched) one.
    fn stand_clearance(&self) -> bool {
        let Some(world) = self.world.as_ref() else {
            return true;
        };
        if !self.volume.is_enabled() || !self.volume.is_crouched() {
            return true;
        }
        let current = self.volume.capsule();
        let standing = self.volume.standing();
        let reach = (standing.height - current.height).max(0.0) + current.skin_width;
        world
            .sphere_cast(
                current.top_sphere(self.state.position),
                Vec3::y(),
                current.radius,
                reach,
                self.settings.collision_mask,
            )
            .filter(|hit| !hit.is_trigger)
            .is_none()
    }

    fn resize_volume(&mut self, crouched: bool) -> bool {
        if crouched == self.volume.is_crouched() {
            return true;
        }
        if !crouched && !self.stand_clearance() {
            return false;
        }
        self.volume.refresh(crouched);
        log::debug!("collision volume resized to {:?}", self.volume.capsule());
        true
    }
}

fn jump_can_start<Q: CollisionQuery>(core: &Core<Q>) -> bool {
    let state = &core.state;
    state.ground.grounded
        && state.jump.released
        && !state.jump.blocked
        && state.ground.angle_deg <= core.settings.walkable_slope_limit
        && core.gate.permits(Activity::Jump)
        && !core.gate.is_locked()
}

fn jump_on_start<Q: CollisionQuery>(core: &mut Core<Q>) {
    let jump = &mut core.state.jump;
    jump.reset_accumulators();
    jump.released = false;
    jump.initiating_ticks = JUMP_TAKEOFF_TICKS;
    core.state.forces.motor_throttle.y = core.settings.jump_force;
}

fn crouch_can_start<Q: CollisionQuery>(core: &Core<Q>) -> bool {
    core.gate.permits(Activity::Crouch)
}

fn crouch_can_stop<Q: CollisionQuery>(core: &Core<Q>) -> bool {
    core.stand_clearance()
}

fn crouch_on_start<Q: CollisionQuery>(core: &mut Core<Q>) {
    core.resize_volume(true);
}

fn crouch_on_stop<Q: CollisionQuery>(core: &mut Core<Q>) {
    core.resize_volume(false);
}

fn run_can_start<Q: CollisionQuery>(core: &Core<Q>) -> bool {
    core.state.ground.grounded && core.gate.permits(Activity::Run)
}

fn out_of_control_can_start<Q: CollisionQuery>(core: &Core<Q>) -> bool {
    core.gate.permits(Activity::OutOfControl)
}

fn activity_table<Q: CollisionQuery>() -> ActivityTable<Core<Q>> {
    let mut table = ActivityTable::new();
    table.register(
        Activity::Jump,
        ActivityHooks {
            can_start: jump_can_start::<Q>,
            on_start: jump_on_start::<Q>,
            ..ActivityHooks::passive()
        },
    );
    table.register(
        Activity::Crouch,
        ActivityHooks {
            can_start: crouch_can_start::<Q>,
            can_stop: crouch_can_stop::<Q>,
            on_start: crouch_on_start::<Q>,
            on_stop: crouch_on_stop::<Q>,
        },
    );
    table.register(
        Activity::Run,
        ActivityHooks {
            can_start: run_can_start::<Q>,
            ..ActivityHooks::passive()
        },
    );
    table.register(
        Activity::OutOfControl,
        ActivityHooks {
            can_start: out_of_control_can_start::<Q>,
            ..ActivityHooks::passive()
        },
    );
    table
}

/// A single first-person mover running against a [`CollisionQuery`] world.
pub struct MoverController<Q> {
    core: Core<Q>,
    activities: ActivityTable<Core<Q>>,
    intent_source: Box<dyn IntentSource>,
}

impl<Q: CollisionQuery> MoverController<Q> {
    pub fn new(
        settings: MoverSettings,
        mut volume: Box<dyn CollisionVolumeShape>,
        intent_source: Box<dyn IntentSource>,
        gate: Box<dyn ActivityGate>,
    ) -> Result<Self, MoverError> {
        settings.validate()?;
        volume.init(settings.capsule());
        let state = MoverState::new(Vec3::zeros(), volume.capsule());
        let render = RenderReconciler::new(state.position, state.platform_epoch);

        Ok(Self {
            core: Core {
                settings,
                world: None,
                volume,
                gate,
                state,
                schedule: Scheduler::new(),
                events: Vec::new(),
                tick: 0,
                status: ControllerStatus::Active,
                render,
                intent: MoveIntent::default(),
                stand_blocked: false,
            },
            activities: activity_table(),
            intent_source,
        })
    }

    pub fn with_world(mut self, world: Q) -> Self {
        self.bind_world(world);
        self
    }

    /// Bind the collision provider. Re-activates a controller disabled for lack of one.
    pub fn bind_world(&mut self, world: Q) {
        self.core.world = Some(world);
        if self.core.status != ControllerStatus::Active {
            log::info!("collision provider bound, mover re-activated");
            self.core.status = ControllerStatus::Active;
        }
    }

    pub fn world(&self) -> Option<&Q> {
        self.core.world.as_ref()
    }

    pub fn world_mut(&mut self) -> Option<&mut Q> {
        self.core.world.as_mut()
    }

    /// Respawn at `position`: clears activities, pending actions and every force.
    pub fn spawn(&mut self, position: Vec3) -> Result<(), MoverError> {
        if self.core.world.is_none() {
            return Err(MoverError::MissingCollisionProvider);
        }
        for activity in Activity::ALL {
            self.force_stop_activity(*activity);
        }
        self.core.schedule.clear();
        self.core.stand_blocked = false;
        self.core.volume.refresh(false);
        self.core.state.reset(position);
        self.core.render.snap(&self.core.state);
        log::info!("mover spawned at {position:?}");
        Ok(())
    }

    /// Teleport. Forces are zeroed and the render position snaps along.
    pub fn set_position(&mut self, position: Vec3) {
        let position = nan_safe(position, self.core.state.position);
        self.core.state.reset(position);
        self.core.state.reset_horizontal_velocity = true;
        self.core.render.snap(&self.core.state);
    }

    /// Zero every motion source. Calling it twice leaves the same state as calling it once.
    pub fn stop(&mut self) {
        self.core.state.stop();
        self.core.emit(MoverEvent::Stop);
    }

    pub fn add_force(&mut self, force: Vec3) {
        self.core.state.forces.add_force(force);
    }

    /// Spread `force` over `frames` ticks (clamped to 1..=120).
    pub fn add_soft_force(&mut self, force: Vec3, frames: u32) {
        self.core.state.forces.add_soft_force(force, frames);
    }

    pub fn enable_collision(&mut self, enabled: bool) {
        self.core.volume.enable(enabled);
        log::debug!("collision {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Switch the collision volume between standing and crouched.
    ///
    /// Returns false when standing up is blocked by something overhead. The crouch activity
    /// goes through this too; direct calls bypass the activity table.
    pub fn resize_collision_volume(&mut self, crouched: bool) -> bool {
        self.core.resize_volume(crouched)
    }

    /// Run one authoritative simulation tick.
    pub fn fixed_tick(&mut self) {
        if !self.ensure_world() {
            return;
        }
        self.core.tick += 1;
        let tick = self.core.tick;
        for action in self.core.schedule.drain_due(tick) {
            self.run_scheduled(action);
        }

        self.read_intent(tick);
        self.core.state.prev_position = self.core.state.position;

        self.sense_ground();
        self.update_activities();
        self.update_forces();
        self.update_out_of_control();
        self.move_and_deflect();
        self.ride_platform();
        self.finish_tick();
    }

    /// Advance the render position by one frame and return it.
    pub fn render_frame(&mut self, frame_dt: f32) -> Vec3 {
        if self.core.status != ControllerStatus::Active {
            return self.core.render.position();
        }
        let core = &mut self.core;
        let capsule = core.volume.capsule();
        let step_offset = core.volume.step_offset();
        let world = core.world.as_ref().filter(|_| core.volume.is_enabled());
        core.render
            .step(world, &core.state, &capsule, step_offset, &core.settings, frame_dt)
    }

    fn ensure_world(&mut self) -> bool {
        if self.core.world.is_some() {
            return self.core.status == ControllerStatus::Active;
        }
        if self.core.status == ControllerStatus::Active {
            log::error!("mover has no collision query provider, disabling");
            self.core.status = ControllerStatus::Disabled(MoverError::MissingCollisionProvider);
        }
        false
    }

    fn run_scheduled(&mut self, action: ScheduledAction) {
        log::trace!("tick {}: {action:?}", self.core.tick);
        match action {
            ScheduledAction::AllowJump => self.core.state.jump.blocked = false,
            ScheduledAction::RetryStand => self.core.stand_blocked = false,
        }
    }

    fn read_intent(&mut self, tick: u64) {
        let mut intent = self.intent_source.intent(tick);
        if self.core.gate.is_locked() {
            intent = MoveIntent {
                yaw: intent.yaw,
                ..MoveIntent::default()
            };
        }
        if let Some(yaw) = intent.yaw {
            self.core.state.yaw = nan_safe_f32(yaw, self.core.state.yaw);
        }
        self.core.intent = intent;
    }

    fn sense_ground(&mut self) {
        let core = &mut self.core;
        let jump_initiating = core.state.jump.initiating_ticks > 0;
        let capsule = core.volume.capsule();
        match core.world.as_ref() {
            Some(world) if core.volume.is_enabled() => ground::sense_ground(
                world,
                &mut core.state,
                &capsule,
                &core.settings,
                jump_initiating,
            ),
            _ => ground::apply_ground(&mut core.state, GroundInfo::default(), jump_initiating),
        }
    }

    fn update_activities(&mut self) {
        let intent = self.core.intent;

        if !intent.jump {
            self.core.state.jump.released = true;
        }
        let landed = self.core.state.ground.grounded && self.core.state.jump.initiating_ticks == 0;
        if landed && self.activities.is_active(Activity::Jump) {
            self.stop_activity(Activity::Jump);
        }
        if intent.jump {
            self.start_activity(Activity::Jump);
        }

        if intent.crouch {
            self.start_activity(Activity::Crouch);
        } else if self.activities.is_active(Activity::Crouch)
            && !self.core.stand_blocked
            && !self.stop_activity(Activity::Crouch)
        {
            let delay = self.core.settings.stand_retry_ticks;
            self.core.stand_blocked = true;
            self.core
                .schedule
                .schedule_in(self.core.tick, delay, ScheduledAction::RetryStand);
            log::debug!("no headroom to stand, retrying in {delay} ticks");
        }

        let running = intent.run
            && intent.move_vector.y > 0.0
            && !self.activities.is_active(Activity::Crouch);
        if running {
            self.start_activity(Activity::Run);
        } else {
            self.stop_activity(Activity::Run);
        }
    }

    fn update_forces(&mut self) {
        let modifier = if self.activities.is_active(Activity::Crouch) {
            self.core.settings.crouch_acceleration_modifier
        } else if self.activities.is_active(Activity::Run) {
            self.core.settings.run_acceleration_modifier
        } else {
            1.0
        };
        let holding = self.activities.is_active(Activity::Jump) && self.core.intent.jump;

        let core = &mut self.core;
        let settings = &core.settings;
        let state = &mut core.state;

        let input = MotorInput {
            intent: core.intent.move_vector,
            yaw: state.yaw,
            grounded: state.ground.grounded,
            slope_factor: slope_factor(state, settings),
            acceleration_modifier: modifier,
        };
        state.forces.update_motor(&input, settings);
        update_jump(
            &mut state.forces,
            &mut state.jump,
            settings,
            holding,
            state.ground.grounded,
            state.velocity.y,
        );
        state
            .forces
            .update_forces(settings.force_damping, settings.time_scale);
        update_fall_speed(state, settings);
        update_sliding(state, settings);
    }

    fn update_out_of_control(&mut self) {
        let settings = &self.core.settings;
        let state = &self.core.state;
        let knocked = state.forces.external_force.norm() > settings.out_of_control_force
            || state.fall_speed < -settings.out_of_control_fall_speed
            || state.slide.fast;
        if knocked {
            self.start_activity(Activity::OutOfControl);
        } else {
            self.stop_activity(Activity::OutOfControl);
        }
    }

    fn move_and_deflect(&mut self) {
        let core = &mut self.core;
        let Some(world) = core.world.as_ref() else {
            return;
        };
        let capsule = core.volume.capsule();
        let collide = core.volume.is_enabled();

        let moved = integrate(
            world,
            &mut core.state,
            &capsule,
            core.volume.step_offset(),
            &core.settings,
            collide,
        );

        let mut raised = Vec::new();
        let deflection = if collide {
            deflect(world, &mut core.state, &capsule, &moved, &core.settings, &mut raised)
        } else {
            Deflection::default()
        };
        for event in raised {
            core.emit(event);
        }

        // Touchdown ends the jump on this tick unless it is still taking off.
        let touched_down = deflection.landed && self.core.state.jump.initiating_ticks == 0;
        if touched_down && self.activities.is_active(Activity::Jump) {
            self.stop_activity(Activity::Jump);
        }

        if deflection.head_impact {
            self.force_stop_activity(Activity::Jump);
            let delay = self.core.settings.jump_block_ticks;
            self.core.state.jump.blocked = true;
            self.core
                .schedule
                .schedule_in(self.core.tick, delay, ScheduledAction::AllowJump);
        }
    }

    fn ride_platform(&mut self) {
        let core = &mut self.core;
        let Some(world) = core.world.as_ref() else {
            return;
        };
        let momentum = platform::update_binding(world, &mut core.state, core.settings.fixed_dt);
        platform::impart(&mut core.state.forces, momentum);
    }

    fn finish_tick(&mut self) {
        let core = &mut self.core;
        let dt = core.settings.fixed_dt;
        let state = &mut core.state;

        state.prev_velocity = state.velocity;
        if std::mem::take(&mut state.reset_horizontal_velocity) {
            state.prev_velocity.x = 0.0;
            state.prev_velocity.z = 0.0;
        }
        state.velocity = nan_safe((state.position - state.prev_position) / dt, Vec3::zeros());

        let stale_fall = state.ground.grounded && state.fall_start_height.is_some();
        debug_assert!(!stale_fall, "fall tracked while grounded");
        if stale_fall {
            log::warn!("clearing fall tracked while grounded");
            state.fall_start_height = None;
        }
        state.last_capsule = core.volume.capsule();

        let moved = state.position - state.prev_position;
        log::trace!(
            "tick {}: pos {:?} vel {:?} grounded {}",
            core.tick,
            state.position,
            state.velocity,
            state.ground.grounded
        );
        if moved.norm_squared() > MIN_MOVE_SQ {
            core.emit(MoverEvent::Move(moved));
        }
    }

    fn start_activity(&mut self, activity: Activity) -> bool {
        let started = self.activities.try_start(&mut self.core, activity);
        if started {
            self.core.emit(MoverEvent::ActivityStarted(activity));
        }
        started
    }

    fn stop_activity(&mut self, activity: Activity) -> bool {
        let stopped = self.activities.try_stop(&mut self.core, activity);
        if stopped {
            self.core.emit(MoverEvent::ActivityStopped(activity));
        }
        stopped
    }

    fn force_stop_activity(&mut self, activity: Activity) {
        if self.activities.force_stop(&mut self.core, activity) {
            self.core.emit(MoverEvent::ActivityStopped(activity));
        }
    }

    pub fn position(&self) -> Vec3 {
        self.core.state.position
    }

    pub fn render_position(&self) -> Vec3 {
        self.core.render.position()
    }

    pub fn velocity(&self) -> Vec3 {
        self.core.state.velocity
    }

    pub fn yaw(&self) -> f32 {
        self.core.state.yaw
    }

    pub fn is_grounded(&self) -> bool {
        self.core.state.ground.grounded
    }

    /// Ground contact point oriented so its +Y is the ground normal.
    pub fn ground_transform(&self) -> Option<Iso> {
        let ground = &self.core.state.ground;
        if !ground.grounded {
            return None;
        }
        let rotation =
            Quat::rotation_between(&Vec3::y(), &ground.normal).unwrap_or_else(Quat::identity);
        Some(Iso::from_parts(ground.point.into(), rotation))
    }

    pub fn platform(&self) -> Option<ObjectRef> {
        self.core.state.platform.as_ref().map(|b| b.object)
    }

    /// Ground slope in degrees, 0 while airborne.
    pub fn slope_angle_deg(&self) -> f32 {
        let ground = &self.core.state.ground;
        if ground.grounded { ground.angle_deg } else { 0.0 }
    }

    pub fn fall_speed(&self) -> f32 {
        self.core.state.fall_speed
    }

    pub fn motor_throttle(&self) -> Vec3 {
        self.core.state.forces.motor_throttle
    }

    pub fn external_force(&self) -> Vec3 {
        self.core.state.forces.external_force
    }

    pub fn capsule(&self) -> CapsuleSpec {
        self.core.volume.capsule()
    }

    pub fn is_active(&self, activity: Activity) -> bool {
        self.activities.is_active(activity)
    }

    pub fn active_activities(&self) -> ActivitySet {
        self.activities.active()
    }

    pub fn status(&self) -> &ControllerStatus {
        &self.core.status
    }

    pub fn tick(&self) -> u64 {
        self.core.tick
    }

    pub fn settings(&self) -> &MoverSettings {
        &self.core.settings
    }

    pub fn state(&self) -> &MoverState {
        &self.core.state
    }

    /// Take every event raised since the last call.
    pub fn drain_events(&mut self) -> Vec<MoverEvent> {
        std::mem::take(&mut self.core.events)
    }

    /// Settled forward speed after `seconds` of full intent with these settings.
    pub fn calculate_max_speed(&self, seconds: f32) -> f32 {
        calculate_max_speed(&self.core.settings, seconds)
    }
}
