//! Collision volume strategies.
//!
//! The mover owns one boxed [`CollisionVolumeShape`] and never resizes its capsule any other
//! way. Resizing keeps the feet where they are, so a crouch never teleports the mover.

use crate::types::CapsuleSpec;

pub trait CollisionVolumeShape {
    /// Install the standing capsule. Called once when the controller is created.
    fn init(&mut self, standing: CapsuleSpec);

    /// Switch between the standing and crouched variants.
    fn refresh(&mut self, crouched: bool);

    fn enable(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Capsule currently in use.
    fn capsule(&self) -> CapsuleSpec;

    fn standing(&self) -> CapsuleSpec;

    fn is_crouched(&self) -> bool;

    /// Height of ledges the volume can climb without blocking.
    fn step_offset(&self) -> f32;
}

/// Shrink `standing` to the crouched height, keeping the radius inside the new height.
pub fn crouched_capsule(standing: CapsuleSpec, height_modifier: f32) -> CapsuleSpec {
    let height = standing.height * height_modifier;
    // NOTE: a capsule needs at least two radii of height.
    let radius = standing.radius.min(height * 0.5);
    CapsuleSpec::new(radius, height, standing.skin_width)
}

fn clamped(capsule: CapsuleSpec) -> CapsuleSpec {
    debug_assert!(
        capsule.radius < capsule.height,
        "capsule radius {} must be below its height {}",
        capsule.radius,
        capsule.height
    );
    if capsule.radius * 2.0 > capsule.height {
        log::warn!("clamping capsule radius {} to fit height {}", capsule.radius, capsule.height);
        return CapsuleSpec::new(capsule.height * 0.5, capsule.height, capsule.skin_width);
    }
    capsule
}

/// Plain capsule: no stepping.
#[derive(Clone, Debug)]
pub struct CapsuleVolume {
    standing: CapsuleSpec,
    current: CapsuleSpec,
    crouch_height_modifier: f32,
    crouched: bool,
    enabled: bool,
}

impl CapsuleVolume {
    pub fn new(crouch_height_modifier: f32) -> Self {
        let standing = CapsuleSpec::new(0.4, 1.8, 0.02);
        Self {
            standing,
            current: standing,
            crouch_height_modifier,
            crouched: false,
            enabled: true,
        }
    }
}

impl CollisionVolumeShape for CapsuleVolume {
    fn init(&mut self, standing: CapsuleSpec) {
        self.standing = clamped(standing);
        self.current = self.standing;
        self.crouched = false;
    }

    fn refresh(&mut self, crouched: bool) {
        self.crouched = crouched;
        self.current = if crouched {
            clamped(crouched_capsule(self.standing, self.crouch_height_modifier))
        } else {
            self.standing
        };
    }

    fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn capsule(&self) -> CapsuleSpec {
        self.current
    }

    fn standing(&self) -> CapsuleSpec {
        self.standing
    }

    fn is_crouched(&self) -> bool {
        self.crouched
    }

    fn step_offset(&self) -> f32 {
        0.0
    }
}

/// Character capsule: a capsule that also climbs small ledges.
#[derive(Clone, Debug)]
pub struct CharacterCapsuleVolume {
    inner: CapsuleVolume,
    step_offset: f32,
}

impl CharacterCapsuleVolume {
    pub fn new(step_offset: f32, crouch_height_modifier: f32) -> Self {
        Self {
            inner: CapsuleVolume::new(crouch_height_modifier),
            step_offset: step_offset.max(0.0),
        }
    }
}

impl CollisionVolumeShape for CharacterCapsuleVolume {
    fn init(&mut self, standing: CapsuleSpec) {
        self.inner.init(standing);
    }

    fn refresh(&mut self, crouched: bool) {
        self.inner.refresh(crouched);
    }

    fn enable(&mut self, enabled: bool) {
        self.inner.enable(enabled);
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    fn capsule(&self) -> CapsuleSpec {
        self.inner.capsule()
    }

    fn standing(&self) -> CapsuleSpec {
        self.inner.standing()
    }

    fn is_crouched(&self) -> bool {
        self.inner.is_crouched()
    }

    fn step_offset(&self) -> f32 {
        // A step can never be taller than the current capsule's lower hemisphere allows.
        self.step_offset.min(self.inner.capsule().height * 0.5)
    }
}
