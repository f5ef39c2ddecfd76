//! Enum-keyed activity table and the gate the host uses to veto or observe the mover.

use crate::bitmask_flags::BitmaskFlags;
use crate::define_bitmask_flags;
use crate::events::MoverEvent;

define_bitmask_flags!(Activity, u8, {
    Jump,
    Crouch,
    Run,
    /// Knocked around by external force, a hard fall or a fast slide.
    OutOfControl,
});

pub type ActivitySet = BitmaskFlags<u8>;

/// Guard and transition callbacks for one activity over a context `C`.
pub struct ActivityHooks<C> {
    pub can_start: fn(&C) -> bool,
    pub can_stop: fn(&C) -> bool,
    pub on_start: fn(&mut C),
    pub on_stop: fn(&mut C),
}

impl<C> ActivityHooks<C> {
    /// Hooks that always allow the transition and do nothing on it.
    pub fn passive() -> Self {
        Self {
            can_start: |_| true,
            can_stop: |_| true,
            on_start: |_| {},
            on_stop: |_| {},
        }
    }
}

impl<C> Clone for ActivityHooks<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ActivityHooks<C> {}

/// Registered activities and which of them are running.
pub struct ActivityTable<C> {
    hooks: [Option<ActivityHooks<C>>; Activity::ALL.len()],
    active: ActivitySet,
}

impl<C> Default for ActivityTable<C> {
    fn default() -> Self {
        Self {
            hooks: [None; Activity::ALL.len()],
            active: ActivitySet::default(),
        }
    }
}

impl<C> ActivityTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, activity: Activity, hooks: ActivityHooks<C>) {
        self.hooks[activity as usize] = Some(hooks);
    }

    pub fn is_active(&self, activity: Activity) -> bool {
        self.active.has(activity)
    }

    pub fn active(&self) -> ActivitySet {
        self.active
    }

    /// Start `activity` if it is registered, idle, and its guard passes.
    pub fn try_start(&mut self, ctx: &mut C, activity: Activity) -> bool {
        if self.is_active(activity) {
            return false;
        }
        let Some(hooks) = self.hooks[activity as usize] else {
            return false;
        };
        if !(hooks.can_start)(ctx) {
            return false;
        }
        self.active.add(activity);
        (hooks.on_start)(ctx);
        true
    }

    /// Stop `activity` if it is running and its guard passes.
    pub fn try_stop(&mut self, ctx: &mut C, activity: Activity) -> bool {
        if !self.is_active(activity) {
            return false;
        }
        let Some(hooks) = self.hooks[activity as usize] else {
            return false;
        };
        if !(hooks.can_stop)(ctx) {
            return false;
        }
        self.active.remove(activity);
        (hooks.on_stop)(ctx);
        true
    }

    /// Stop `activity` without consulting its guard.
    pub fn force_stop(&mut self, ctx: &mut C, activity: Activity) -> bool {
        if !self.is_active(activity) {
            return false;
        }
        self.active.remove(activity);
        if let Some(hooks) = self.hooks[activity as usize] {
            (hooks.on_stop)(ctx);
        }
        true
    }
}

/// Host-side veto and observer for the mover.
pub trait ActivityGate {
    fn permits(&self, _activity: Activity) -> bool {
        true
    }

    /// Motor and jump input are ignored while locked (dead, climbing).
    fn is_locked(&self) -> bool {
        false
    }

    fn notify(&mut self, _event: &MoverEvent) {}
}

/// Gate that allows everything and ignores events.
#[derive(Copy, Clone, Debug, Default)]
pub struct OpenGate;

impl ActivityGate for OpenGate {}
