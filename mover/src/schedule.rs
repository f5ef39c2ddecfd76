/// Deferred controller work, fired on a later fixed tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Lift the head-impact jump block.
    AllowJump,
    /// Try to stand up again after a crouch exit was blocked.
    RetryStand,
}

/// Tick-keyed queue. Actions due on the same tick come out in insertion order.
#[derive(Clone, Debug)]
pub struct Scheduler<A> {
    pending: Vec<(u64, u64, A)>,
    seq: u64,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            seq: 0,
        }
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `action` `ticks` after `now` (at least one tick later).
    pub fn schedule_in(&mut self, now: u64, ticks: u64, action: A) {
        let fire = now.saturating_add(ticks.max(1));
        self.pending.push((fire, self.seq, action));
        self.seq += 1;
    }

    /// Remove and return every action due at or before `tick`.
    pub fn drain_due(&mut self, tick: u64) -> Vec<A> {
        let (mut due, rest): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|(fire, _, _)| *fire <= tick);
        self.pending = rest;
        due.sort_by_key(|(fire, seq, _)| (*fire, *seq));
        due.into_iter().map(|(_, _, action)| action).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
impl<A: PartialEq> Scheduler<A> {
    pub(crate) fn contains(&self, action: &A) -> bool {
        self.pending.iter().any(|(_, _, a)| a == action)
    }
}
