//! Headless mover harness.
//!
//! Builds a small scene, walks one mover through it with a scripted intent and logs what
//! happens. `RUST_LOG=debug` shows activity transitions, `trace` shows every sweep.

use std::f32::consts::{FRAC_PI_2, PI};

use mover::{
    Activity, CharacterCapsuleVolume, ColliderShapeDef, CollisionQuery, Iso, Layer,
    MoveIntent, MoverController, MoverError, MoverEvent, MoverSettings, ObjectRef, OpenGate, Quat,
    QueryWorld, Vec2, Vec3, WorldObjectDef,
};

const RENDER_DT: f32 = 1.0 / 144.0;
const RUN_SECONDS: f32 = 10.0;

const PLATFORM: ObjectRef = ObjectRef(5);
const PLATFORM_ORIGIN: Vec3 = Vec3::new(0.0, 0.125, 6.0);
const PLATFORM_SWING: f32 = 3.0;

fn scene() -> Vec<WorldObjectDef> {
    vec![
        WorldObjectDef::new(
            1,
            Vec3::zeros(),
            ColliderShapeDef::Plane {
                offset_along_normal: 0.0,
            },
        ),
        // Ramp up to the east.
        WorldObjectDef::new(
            2,
            Vec3::new(10.0, 0.0, 0.0),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(3.0, 0.2, 2.0),
            },
        )
        .rotated(Quat::from_axis_angle(&Vec3::z_axis(), 20f32.to_radians())),
        // Wall to the north.
        WorldObjectDef::new(
            3,
            Vec3::new(0.0, 1.5, -12.0),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(6.0, 1.5, 0.3),
            },
        ),
        // Low slab to the west, only passable crouched.
        WorldObjectDef::new(
            4,
            Vec3::new(-6.0, 1.4, 0.0),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(2.0, 0.2, 2.0),
            },
        ),
        WorldObjectDef::new(
            PLATFORM.0,
            PLATFORM_ORIGIN,
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(2.0, 0.125, 2.0),
            },
        )
        .on_layer(Layer::Platform),
        WorldObjectDef::new(
            6,
            Vec3::new(0.0, 1.0, -6.0),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(1.0, 1.0, 1.0),
            },
        )
        .on_layer(Layer::Trigger),
    ]
}

/// One scripted move per fixed tick: north to the wall, back onto the platform, ride it,
/// jump, then crouch under the slab.
fn script(tick: u64) -> MoveIntent {
    let walk = |yaw: f32| MoveIntent {
        move_vector: Vec2::new(0.0, 1.0),
        yaw: Some(yaw),
        ..MoveIntent::default()
    };
    match tick {
        0..120 => walk(0.0),
        120..240 => MoveIntent {
            run: true,
            ..walk(PI)
        },
        240..360 => MoveIntent::default(),
        360..372 => MoveIntent {
            jump: true,
            ..MoveIntent::default()
        },
        372..480 => MoveIntent {
            crouch: true,
            ..walk(FRAC_PI_2)
        },
        _ => MoveIntent::default(),
    }
}

fn platform_pose(seconds: f32) -> Iso {
    let x = PLATFORM_ORIGIN.x + PLATFORM_SWING * (seconds * 0.5).sin();
    Iso::translation(x, PLATFORM_ORIGIN.y, PLATFORM_ORIGIN.z)
}

fn main() -> Result<(), MoverError> {
    env_logger::init();

    let settings = MoverSettings::default();
    let fixed_dt = settings.fixed_dt;
    let volume = CharacterCapsuleVolume::new(settings.step_offset, settings.crouch_height_modifier);
    let world = QueryWorld::build(scene(), fixed_dt);

    let mut controller = MoverController::new(
        settings,
        Box::new(volume),
        Box::new(script),
        Box::new(OpenGate),
    )?
    .with_world(world);
    controller.spawn(Vec3::new(0.0, 0.02, 0.0))?;

    let mut accumulator = 0.0;
    let mut sim_seconds = 0.0;
    let mut render_seconds = 0.0;
    while render_seconds < RUN_SECONDS {
        render_seconds += RENDER_DT;
        accumulator += RENDER_DT;

        while accumulator >= fixed_dt {
            accumulator -= fixed_dt;
            sim_seconds += fixed_dt;

            if let Some(world) = controller.world_mut() {
                world.set_object_pose(PLATFORM, platform_pose(sim_seconds))?;
            }
            controller.fixed_tick();

            for event in controller.drain_events() {
                match event {
                    MoverEvent::Move(_) => {}
                    other => log::info!("tick {}: {:?}", controller.tick(), other),
                }
            }

            if controller.tick() % 60 == 0 {
                let active = controller.active_activities();
                let active: Vec<Activity> =
                    Activity::ALL.iter().copied().filter(|a| active.has(*a)).collect();
                log::info!(
                    "t={:.1}s pos={:.2?} vel={:.2?} grounded={} platform={:?} active={:?}",
                    sim_seconds,
                    controller.position(),
                    controller.velocity(),
                    controller.is_grounded(),
                    controller.platform(),
                    active,
                );
            }
        }

        let render = controller.render_frame(RENDER_DT);
        log::trace!("render {:.3?}", render);
    }

    let solid = controller.settings().collision_mask;
    if let Some(world) = controller.world() {
        let inside = world.penetrates(controller.position(), &controller.capsule(), solid);
        log::info!(
            "finished at {:.2?} after {} ticks, penetrating: {}",
            controller.position(),
            controller.tick(),
            inside
        );
    }
    Ok(())
}
