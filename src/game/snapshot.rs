//! Diff building for network transmission

use std::collections::HashMap;

use crate::ws::protocol::{DiffPayload, PlayerPosition, RoomSnapshot, ShootingChange};

use super::entity::{Ball, Player, Powerup};
use super::physics::World;
use super::PlayerId;

/// Tracks what clients already know and builds the next [`DiffPayload`]
#[derive(Debug)]
pub struct DiffTracker {
    /// Ticks since last payload
    ticks_since_send: u32,
    /// Payload interval in ticks
    send_interval: u32,
    moving_threshold: f32,
    added: Vec<PlayerId>,
    removed: Vec<PlayerId>,
    /// Shooting flag as last sent, per player
    last_shooting: HashMap<PlayerId, bool>,
}

impl DiffTracker {
    pub fn new(send_interval: u32, moving_threshold: f32) -> Self {
        Self {
            ticks_since_send: 0,
            send_interval: send_interval.max(1),
            moving_threshold,
            added: Vec::new(),
            removed: Vec::new(),
            last_shooting: HashMap::new(),
        }
    }

    /// Check if it's time to send a payload
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_send += 1;
        if self.ticks_since_send >= self.send_interval {
            self.ticks_since_send = 0;
            true
        } else {
            false
        }
    }

    /// Force a payload on next check
    pub fn force_next(&mut self) {
        self.ticks_since_send = self.send_interval;
    }

    /// A player entered the world since the last send
    pub fn note_added(&mut self, id: PlayerId) {
        self.last_shooting.insert(id, false);
        self.added.push(id);
    }

    /// A player left the world since the last send. Clients never hear of a
    /// player that came and went between two sends.
    pub fn note_removed(&mut self, id: PlayerId) {
        self.last_shooting.remove(&id);
        let before = self.added.len();
        self.added.retain(|a| *a != id);
        if self.added.len() == before {
            self.removed.push(id);
        }
    }

    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.last_shooting.clear();
    }

    /// Collect everything that changed. `None` when nothing did.
    pub fn build(
        &mut self,
        world: &World,
        players: &[Player],
        ball: &Ball,
        powerup: &mut Powerup,
    ) -> Option<DiffPayload> {
        let added_ids = std::mem::take(&mut self.added);
        let mut payload = DiffPayload {
            removed: std::mem::take(&mut self.removed),
            ..DiffPayload::default()
        };

        for player in players {
            if added_ids.contains(&player.id) {
                payload.added.push(player.descriptor(world));
            }

            let sent = self.last_shooting.entry(player.id).or_insert(false);
            if *sent != player.shooting {
                *sent = player.shooting;
                payload.shooting.push(ShootingChange {
                    id: player.id,
                    shooting: player.shooting,
                });
            }

            if added_ids.contains(&player.id) {
                continue;
            }
            if let Some(body) = world.body(player.body) {
                if body.velocity.exceeds_on_any_axis(self.moving_threshold) {
                    payload.moving.push(PlayerPosition {
                        id: player.id,
                        position: body.position,
                    });
                }
            }
        }

        if ball.is_moving(world, self.moving_threshold) {
            payload.ball = Some(ball.position(world));
        }

        if powerup.dirty {
            powerup.dirty = false;
            payload.powerup = Some(powerup.state());
        }

        (!payload.is_empty()).then_some(payload)
    }
}

/// Full state for a late joiner
pub fn full_snapshot(world: &World, players: &[Player], ball: &Ball, powerup: &Powerup) -> RoomSnapshot {
    RoomSnapshot {
        players: players.iter().map(|p| p.descriptor(world)).collect(),
        ball: ball.position(world),
        powerup: powerup.state(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::ContactMaterials;
    use crate::game::profile::{MapProfile, MapSize};
    use crate::game::tuning::Tuning;
    use crate::game::RoomUser;
    use crate::util::Vec2;
    use crate::ws::protocol::Team;

    struct Fixture {
        world: World,
        ball: Ball,
        powerup: Powerup,
        players: Vec<Player>,
        tracker: DiffTracker,
        tuning: Tuning,
    }

    fn fixture() -> Fixture {
        let tuning = Tuning::default();
        let profile = MapProfile::for_size(MapSize::Small);
        let mut world = World::new(ContactMaterials::pitch());
        let ball = Ball::spawn(&mut world, profile.center(), &tuning);
        let mut powerup = Powerup::new(&profile, &tuning);
        powerup.dirty = false;
        Fixture {
            world,
            ball,
            powerup,
            players: Vec::new(),
            tracker: DiffTracker::new(2, tuning.moving_threshold),
            tuning,
        }
    }

    impl Fixture {
        fn join(&mut self, nickname: &str) -> PlayerId {
            let user = RoomUser::new(nickname, Team::Left);
            let player = Player::spawn(&mut self.world, &user, Vec2::new(100.0, 100.0), &self.tuning);
            self.tracker.note_added(player.id);
            self.players.push(player);
            user.id
        }

        fn build(&mut self) -> Option<DiffPayload> {
            self.tracker
                .build(&self.world, &self.players, &self.ball, &mut self.powerup)
        }
    }

    #[test]
    fn idle_room_sends_nothing() {
        let mut f = fixture();
        assert!(f.build().is_none());
    }

    #[test]
    fn added_player_is_never_moving_in_same_payload() {
        let mut f = fixture();
        let id = f.join("ana");
        let body = f.players[0].body;
        f.world.body_mut(body).unwrap().velocity = Vec2::new(50.0, 0.0);

        let payload = f.build().unwrap();
        assert_eq!(payload.added.len(), 1);
        assert_eq!(payload.added[0].id, id);
        assert!(payload.moving.is_empty());

        let payload = f.build().unwrap();
        assert!(payload.added.is_empty());
        assert_eq!(payload.moving.len(), 1);
    }

    #[test]
    fn shooting_changes_are_reported_once() {
        let mut f = fixture();
        f.join("ana");
        f.build();

        f.players[0].shooting = true;
        let payload = f.build().unwrap();
        assert_eq!(payload.shooting.len(), 1);
        assert!(payload.shooting[0].shooting);
        assert!(f.build().is_none());
    }

    #[test]
    fn powerup_dirty_flag_clears_on_send() {
        let mut f = fixture();
        f.powerup.dirty = true;
        let payload = f.build().unwrap();
        assert!(payload.powerup.is_some());
        assert!(!f.powerup.dirty);
        assert!(f.build().is_none());
    }

    #[test]
    fn empty_fields_are_omitted_on_the_wire() {
        let mut f = fixture();
        let ball = f.ball.body;
        f.world.body_mut(ball).unwrap().velocity = Vec2::new(0.0, 3.0);
        let payload = f.build().unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["ball"]);
    }

    #[test]
    fn join_then_leave_between_sends_is_invisible() {
        let mut f = fixture();
        let id = f.join("ana");
        f.tracker.note_removed(id);
        let player = f.players.pop().unwrap();
        f.world.remove_body(player.body);
        assert!(f.build().is_none());
    }

    #[test]
    fn send_interval_counts_ticks() {
        let mut tracker = DiffTracker::new(3, 0.01);
        assert!(!tracker.should_send());
        assert!(!tracker.should_send());
        assert!(tracker.should_send());
        tracker.force_next();
        assert!(tracker.should_send());
    }
}
