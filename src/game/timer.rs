//! Cancellable delayed tasks on the simulation clock
//!
//! Tasks fire between physics steps, never during one. Every delayed effect
//! in a room (cooldowns, dash phases, powerup respawn, goal reset) goes
//! through a [`Scheduler`] so disposal can cancel all of them at once.

use std::time::Duration;

use crate::util::Vec2;

use super::PlayerId;

/// Handle to a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Delayed work a room can schedule
#[derive(Debug, Clone, PartialEq)]
pub enum RoomTask {
    ShootCooldownEnd(PlayerId),
    /// End of the dash burst: put back the velocity captured when it started
    DashRestore { player: PlayerId, velocity: Vec2 },
    DashCooldownEnd(PlayerId),
    PowerupSpawn,
    GoalReset,
}

impl RoomTask {
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            RoomTask::ShootCooldownEnd(id) | RoomTask::DashCooldownEnd(id) => Some(*id),
            RoomTask::DashRestore { player, .. } => Some(*player),
            RoomTask::PowerupSpawn | RoomTask::GoalReset => None,
        }
    }
}

#[derive(Debug)]
struct Scheduled<T> {
    id: TimerId,
    due: Duration,
    task: T,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    pending: Vec<Scheduled<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// Current simulation time
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn advance(&mut self, dt: Duration) {
        self.now += dt;
    }

    pub fn schedule(&mut self, delay: Duration, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(Scheduled {
            id,
            due: self.now + delay,
            task,
        });
        id
    }

    /// True if the task was still pending
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|s| s.id != id);
        self.pending.len() != before
    }

    /// Cancel every task matching `pred`, returning how many were dropped
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let before = self.pending.len();
        self.pending.retain(|s| !pred(&s.task));
        before - self.pending.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn count_where(&self, mut pred: impl FnMut(&T) -> bool) -> usize {
        self.pending.iter().filter(|s| pred(&s.task)).count()
    }

    /// Earliest task that is due, in scheduling order on ties
    pub fn pop_due(&mut self) -> Option<(TimerId, T)> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, s)| s.due <= self.now)
            .min_by_key(|(_, s)| (s.due, s.id))
            .map(|(i, _)| i)?;
        let scheduled = self.pending.remove(index);
        Some((scheduled.id, scheduled.task))
    }
}
