//! The single room powerup

use rand::Rng;
use tracing::debug;

use crate::game::profile::MapProfile;
use crate::game::timer::{RoomTask, Scheduler, TimerId};
use crate::game::tuning::Tuning;
use crate::util::Vec2;
use crate::ws::protocol::{PowerupKind, PowerupState};

#[derive(Debug)]
pub struct Powerup {
    pub position: Vec2,
    pub kind: Option<PowerupKind>,
    /// Must go out with the next update
    pub dirty: bool,
    parking: Vec2,
    spots: Vec<Vec2>,
    timer: Option<TimerId>,
}

impl Powerup {
    /// Parked off field; call [`Powerup::restart`] to arm the first spawn
    pub fn new(profile: &MapProfile, tuning: &Tuning) -> Self {
        let parking = Vec2::new(tuning.powerup_parking.0, tuning.powerup_parking.1);
        Self {
            position: parking,
            kind: None,
            dirty: true,
            parking,
            spots: spawn_spots(profile),
            timer: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.kind.is_some()
    }

    pub fn state(&self) -> PowerupState {
        PowerupState {
            position: self.position,
            kind: self.kind,
        }
    }

    /// Whether a circle of `radius` at `at` touches the powerup
    pub fn in_reach(&self, at: Vec2, radius: f32, tuning: &Tuning) -> bool {
        self.is_active() && at.distance(self.position) < tuning.powerup_radius + radius
    }

    /// Park off field and arm the next spawn
    pub fn restart(&mut self, scheduler: &mut Scheduler<RoomTask>, tuning: &Tuning) {
        if let Some(timer) = self.timer.take() {
            scheduler.cancel(timer);
        }
        self.park();
        self.timer = Some(scheduler.schedule(tuning.powerup_spawn_delay, RoomTask::PowerupSpawn));
    }

    /// Take the current powerup. Returns its kind and re-arms the spawn.
    pub fn consume(&mut self, scheduler: &mut Scheduler<RoomTask>, tuning: &Tuning) -> Option<PowerupKind> {
        let kind = self.kind.take()?;
        self.restart(scheduler, tuning);
        Some(kind)
    }

    /// Spawn timer fired
    pub fn activate(&mut self, rng: &mut impl Rng) {
        self.timer = None;
        if self.spots.is_empty() {
            return;
        }
        self.position = self.spots[rng.gen_range(0..self.spots.len())];
        self.kind = Some(PowerupKind::ALL[rng.gen_range(0..PowerupKind::ALL.len())]);
        self.dirty = true;
        debug!(kind = ?self.kind, x = self.position.x, y = self.position.y, "Powerup spawned");
    }

    pub fn cancel(&mut self, scheduler: &mut Scheduler<RoomTask>) {
        if let Some(timer) = self.timer.take() {
            scheduler.cancel(timer);
        }
    }

    fn park(&mut self) {
        self.position = self.parking;
        self.kind = None;
        self.dirty = true;
    }
}

fn spawn_spots(profile: &MapProfile) -> Vec<Vec2> {
    let (w, h) = (profile.width, profile.height);
    [
        (0.25, 0.25),
        (0.5, 0.2),
        (0.75, 0.25),
        (0.25, 0.75),
        (0.5, 0.8),
        (0.75, 0.75),
    ]
    .iter()
    .map(|(fx, fy)| Vec2::new(w * fx, h * fy))
    .collect()
}
