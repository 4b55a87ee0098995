//! Per-room authoritative simulation
//!
//! Owns the physics world and every entity in it. The room runtime only talks
//! to it through the operations on [`Simulation`]; joins, leaves and key input
//! are queued and applied at step boundaries.

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::util::time::{StepClock, DEFAULT_MAX_STEPS_PER_RUN, DEFAULT_SEND_RATE, DEFAULT_TICK_RATE};
use crate::util::Vec2;
use crate::ws::protocol::{DiffPayload, GoalCredit, PlayerPosition, ResetPayload, RoomSnapshot, Team};

use super::entity::{Ball, Goal, PitchMap, Player, Powerup};
use super::geometry::{PitchGeometry, Side};
use super::input::{InputRouter, KeysDelta};
use super::physics::{ContactMaterials, ListenerId, World};
use super::profile::MapProfile;
use super::snapshot::{full_snapshot, DiffTracker};
use super::timer::{RoomTask, Scheduler, TimerId};
use super::tuning::Tuning;
use super::{GameError, PlayerId, RoomUser};

/// Outbound notifications from a simulation
///
/// Called synchronously from inside a step; implementations must not block.
pub trait RoomHooks: Send {
    fn on_time_stop(&mut self) {}

    fn on_time_resume(&mut self) {}

    /// A goal was scored by `team`. `scorer` is the last toucher, if still in the room.
    fn on_score_changed(&mut self, _team: Team, _scorer: Option<&GoalCredit>) {}

    fn on_update(&mut self, _payload: &DiffPayload) {}

    fn on_reset(&mut self, _payload: &ResetPayload) {}
}

/// Kickoff/goal state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the first step
    Kickoff,
    Active,
    /// Waiting for the delayed reset after `Team` scored
    GoalPause(Team),
    Disposed,
}

/// Rates and seed for one simulation
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub tuning: Tuning,
    pub tick_rate: u32,
    pub send_rate: u32,
    pub max_steps_per_run: u32,
    pub seed: u64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            tuning: Tuning::default(),
            tick_rate: DEFAULT_TICK_RATE,
            send_rate: DEFAULT_SEND_RATE,
            max_steps_per_run: DEFAULT_MAX_STEPS_PER_RUN,
            seed: 0,
        }
    }
}

pub struct Simulation {
    profile: MapProfile,
    tuning: Tuning,
    world: World,
    map: PitchMap,
    goals: [Goal; 2],
    ball: Ball,
    powerup: Powerup,
    players: Vec<Player>,
    input: InputRouter,
    timers: Scheduler<RoomTask>,
    diff: DiffTracker,
    clock: StepClock,
    hooks: Box<dyn RoomHooks>,
    rng: ChaCha8Rng,
    contacts: Option<ListenerId>,
    pending_adds: Vec<RoomUser>,
    pending_removes: Vec<PlayerId>,
    phase: Phase,
    reset_timer: Option<TimerId>,
    /// Looked up against live players on every read
    last_touch: Option<PlayerId>,
    /// Stopped for the initial kickoff; resumes on first ball movement
    clock_stopped: bool,
    shooting_modifier: f32,
    steps: u64,
}

impl Simulation {
    pub fn new(
        profile: MapProfile,
        users: Vec<RoomUser>,
        hooks: Box<dyn RoomHooks>,
        options: SimulationOptions,
    ) -> Result<Self, GameError> {
        profile.validate()?;
        let tuning = options.tuning;

        let mut world = World::new(ContactMaterials::pitch());
        let geometry = PitchGeometry::build(&profile);
        let goals = [
            Goal::spawn(&mut world, &geometry, &profile, Side::Left),
            Goal::spawn(&mut world, &geometry, &profile, Side::Right),
        ];
        let map = PitchMap::spawn(&mut world, geometry);
        let ball = Ball::spawn(&mut world, profile.center(), &tuning);
        let contacts = Some(world.subscribe_contacts());

        let mut timers = Scheduler::new();
        let mut powerup = Powerup::new(&profile, &tuning);
        powerup.restart(&mut timers, &tuning);

        let send_interval = (options.tick_rate / options.send_rate.max(1)).max(1);

        let mut sim = Self {
            shooting_modifier: profile.size.shooting_modifier(),
            profile,
            diff: DiffTracker::new(send_interval, tuning.moving_threshold),
            clock: StepClock::new(options.tick_rate, options.max_steps_per_run),
            tuning,
            world,
            map,
            goals,
            ball,
            powerup,
            players: Vec::new(),
            input: InputRouter::new(),
            timers,
            hooks,
            rng: ChaCha8Rng::seed_from_u64(options.seed),
            contacts,
            pending_adds: Vec::new(),
            pending_removes: Vec::new(),
            phase: Phase::Kickoff,
            reset_timer: None,
            last_touch: None,
            clock_stopped: false,
            steps: 0,
        };

        for user in users {
            sim.spawn_player(user);
        }
        Ok(sim)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_disposed(&self) -> bool {
        self.phase == Phase::Disposed
    }

    pub fn profile(&self) -> &MapProfile {
        &self.profile
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulated time since creation
    pub fn elapsed(&self) -> Duration {
        self.timers.now()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Last player to touch the ball, if they are still here
    pub fn last_touch(&self) -> Option<&Player> {
        self.last_touch.and_then(|id| self.player(id))
    }

    pub fn ball_position(&self) -> Vec2 {
        self.ball.position(&self.world)
    }

    pub fn ball_velocity(&self) -> Vec2 {
        self.ball.velocity(&self.world)
    }

    pub fn goal(&self, side: Side) -> &Goal {
        match side {
            Side::Left => &self.goals[0],
            Side::Right => &self.goals[1],
        }
    }

    pub fn lock_side(&self) -> Option<Side> {
        self.map.lock_side()
    }

    /// Whether the given half-lock body is currently in the world
    pub fn lock_in_world(&self) -> bool {
        self.map.lock_body().is_some_and(|h| self.world.contains(h))
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.world.listener_count()
    }

    /// Queue a join; applied at the next step or send
    pub fn add_player(&mut self, user: RoomUser) {
        if self.is_disposed() {
            return;
        }
        if !user.team.is_playing() {
            debug!(user_id = %user.id, "Spectator not added to simulation");
            return;
        }
        self.pending_removes.retain(|id| *id != user.id);
        self.pending_adds.push(user);
    }

    /// Queue a leave; applied at the next step or send
    pub fn remove_player(&mut self, id: PlayerId) {
        if self.is_disposed() {
            return;
        }
        let queued = self.pending_adds.len();
        self.pending_adds.retain(|u| u.id != id);
        if self.pending_adds.len() == queued {
            self.pending_removes.push(id);
        }
    }

    /// Buffer a key delta for the player's next movement pass
    pub fn queue_keys(&mut self, id: PlayerId, delta: KeysDelta) {
        if self.is_disposed() {
            return;
        }
        self.input.queue(id, delta);
    }

    /// Advance by the wall-clock time since the previous call. Returns the
    /// number of fixed steps taken.
    pub fn run(&mut self, now: Instant) -> u32 {
        if self.is_disposed() {
            return 0;
        }
        let steps = self.clock.steps_since_last(now);
        for _ in 0..steps {
            self.step_once();
        }
        steps
    }

    /// Advance by an explicit amount of time
    pub fn run_for(&mut self, elapsed: Duration) -> u32 {
        if self.is_disposed() {
            return 0;
        }
        let steps = self.clock.steps_for(elapsed);
        for _ in 0..steps {
            self.step_once();
        }
        steps
    }

    /// One runtime tick: advance, then send a diff if one is due
    pub fn tick(&mut self, now: Instant) {
        self.run(now);
        if self.diff.should_send() {
            self.inform();
        }
    }

    /// Emit the diff since the previous send. Returns true if one went out.
    pub fn inform(&mut self) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.drain_pending();
        match self
            .diff
            .build(&self.world, &self.players, &self.ball, &mut self.powerup)
        {
            Some(payload) => {
                self.hooks.on_update(&payload);
                true
            }
            None => false,
        }
    }

    /// Full state for a late joiner
    pub fn snapshot(&self) -> RoomSnapshot {
        full_snapshot(&self.world, &self.players, &self.ball, &self.powerup)
    }

    /// Tear everything down. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }
        self.phase = Phase::Disposed;

        for player in &mut self.players {
            player.cancel_timers(&mut self.timers);
        }
        self.powerup.cancel(&mut self.timers);
        if let Some(timer) = self.reset_timer.take() {
            self.timers.cancel(timer);
        }
        let leftover = self.timers.cancel_all();
        if leftover > 0 {
            debug!(leftover, "Cancelled untracked timers on dispose");
        }

        if let Some(listener) = self.contacts.take() {
            self.world.unsubscribe(listener);
        }
        for player in self.players.drain(..) {
            self.world.remove_body(player.body);
        }
        self.map.remove_lock(&mut self.world);
        self.pending_adds.clear();
        self.pending_removes.clear();
        self.input.clear();
        self.diff.clear();
        self.last_touch = None;

        info!(steps = self.steps, "Simulation disposed");
    }

    /// Advance exactly one fixed step
    pub fn step_once(&mut self) {
        if self.is_disposed() {
            return;
        }
        self.drain_pending();
        let dt = self.clock.step();
        self.timers.advance(dt);
        self.fire_due_timers();

        self.world.step(dt.as_secs_f32());
        self.collect_touches();
        self.logic();
        self.steps += 1;
    }

    fn drain_pending(&mut self) {
        for id in std::mem::take(&mut self.pending_removes) {
            self.despawn_player(id);
        }
        for user in std::mem::take(&mut self.pending_adds) {
            if self.player(user.id).is_some() {
                continue;
            }
            let id = user.id;
            self.spawn_player(user);
            self.diff.note_added(id);
        }
    }

    fn spawn_player(&mut self, user: RoomUser) {
        let teammates = self.players.iter().filter(|p| p.team == user.team).count();
        let at = self.formation_spot(user.team, teammates, teammates + 1);
        let player = Player::spawn(&mut self.world, &user, at, &self.tuning);
        info!(user_id = %user.id, nickname = %user.nickname, team = ?user.team, "Player joined simulation");
        self.players.push(player);
    }

    fn despawn_player(&mut self, id: PlayerId) {
        let Some(index) = self.players.iter().position(|p| p.id == id) else {
            return;
        };
        let mut player = self.players.remove(index);
        player.cancel_timers(&mut self.timers);
        self.world.remove_body(player.body);
        self.input.forget(id);
        self.diff.note_removed(id);
        info!(user_id = %id, "Player left simulation");
    }

    fn fire_due_timers(&mut self) {
        while let Some((_, task)) = self.timers.pop_due() {
            match task {
                RoomTask::ShootCooldownEnd(id) => {
                    if let Some(player) = self.players.iter_mut().find(|p| p.id == id) {
                        player.end_shoot_cooldown();
                    }
                }
                RoomTask::DashRestore { player: id, velocity } => {
                    if let Some(player) = self.players.iter_mut().find(|p| p.id == id) {
                        player.finish_dash(&mut self.world, &mut self.timers, velocity, &self.tuning);
                    }
                }
                RoomTask::DashCooldownEnd(id) => {
                    if let Some(player) = self.players.iter_mut().find(|p| p.id == id) {
                        player.end_dash_cooldown();
                    }
                }
                RoomTask::PowerupSpawn => self.powerup.activate(&mut self.rng),
                RoomTask::GoalReset => {
                    self.reset_timer = None;
                    self.goal_reset();
                }
            }
        }
    }

    /// Record who touched the ball last
    fn collect_touches(&mut self) {
        let Some(listener) = self.contacts else {
            return;
        };
        for contact in self.world.drain_contacts(listener) {
            let Some(other) = contact.other(self.ball.body) else {
                continue;
            };
            if let Some(player) = self.players.iter().find(|p| p.body == other) {
                self.last_touch = Some(player.id);
            }
        }
    }

    fn logic(&mut self) {
        for player in &mut self.players {
            if let Some(delta) = self.input.take(player.id) {
                player.keys.apply(&delta);
            }
            player.logic(&mut self.world, &mut self.timers, &self.tuning);

            let Some(at) = player.position(&self.world) else {
                continue;
            };
            if self.powerup.in_reach(at, player.radius, &self.tuning) {
                if let Some(kind) = self.powerup.consume(&mut self.timers, &self.tuning) {
                    debug!(user_id = %player.id, ?kind, "Powerup picked up");
                    player.power = Some(kind);
                }
            }
        }

        self.shoot();

        if self.phase == Phase::Active && self.ball.is_moving(&self.world, self.tuning.moving_threshold) {
            self.map.remove_lock(&mut self.world);
            if self.clock_stopped {
                self.clock_stopped = false;
                self.hooks.on_time_resume();
            }
        }

        if self.phase == Phase::Active {
            if let Some(team) = self.scoring_team() {
                self.score_goal(team);
            }
        }

        if self.phase == Phase::Kickoff {
            self.reset_positions();
            self.phase = Phase::Active;
            self.clock_stopped = true;
            self.hooks.on_time_stop();
            debug!("Kickoff");
        }
    }

    fn shoot(&mut self) {
        let ball_at = self.ball.position(&self.world);
        for player in &mut self.players {
            if !player.shooting || player.shooting_cooldown {
                continue;
            }
            let Some(body) = self.world.body(player.body) else {
                continue;
            };
            let (at, velocity) = (body.position, body.velocity);
            let gap = at.distance(ball_at) - player.radius - self.ball.radius;
            if gap >= self.tuning.shot_contact_tolerance {
                continue;
            }

            let strength = player.take_shot_strength(&self.tuning) * self.shooting_modifier;
            let impulse = velocity * 0.5 + (ball_at - at).normalize() * strength;
            self.ball.apply_impulse(&mut self.world, impulse);
            self.last_touch = Some(player.id);
            player.shoot(&mut self.timers, &self.tuning);
        }
    }

    /// Team credited if the ball is fully past a goal line
    fn scoring_team(&self) -> Option<Team> {
        let x = self.ball.position(&self.world).x;
        let r = self.ball.radius;
        if x < -r {
            Some(Team::Right)
        } else if x > self.profile.width + r {
            Some(Team::Left)
        } else {
            None
        }
    }

    fn score_goal(&mut self, team: Team) {
        self.phase = Phase::GoalPause(team);
        let credit = self.last_touch().map(|p| GoalCredit {
            id: p.id,
            nickname: p.nickname.clone(),
            team: p.team,
            own_goal: p.team != team,
        });
        info!(
            team = ?team,
            scorer = ?credit.as_ref().map(|c| &c.nickname),
            own_goal = credit.as_ref().is_some_and(|c| c.own_goal),
            "Goal"
        );

        self.clock_stopped = true;
        self.hooks.on_score_changed(team, credit.as_ref());
        self.hooks.on_time_stop();
        self.reset_timer = Some(
            self.timers
                .schedule(self.tuning.goal_reset_delay, RoomTask::GoalReset),
        );
    }

    fn goal_reset(&mut self) {
        let Phase::GoalPause(scorer) = self.phase else {
            return;
        };
        self.reset_positions();
        self.phase = Phase::Active;
        self.clock_stopped = false;
        self.hooks.on_time_resume();

        if let Some(side) = scorer.opponent().and_then(side_of) {
            self.map.insert_lock(&mut self.world, side);
        }
    }

    /// Ball to center, teams into formation from the live roster
    fn reset_positions(&mut self) {
        self.ball.reset(&mut self.world, self.profile.center());

        for team in [Team::Left, Team::Right] {
            let count = self.players.iter().filter(|p| p.team == team).count();
            let mut index = 0;
            for i in 0..self.players.len() {
                if self.players[i].team != team {
                    continue;
                }
                let at = self.formation_spot(team, index, count);
                self.players[i].reset(&mut self.world, &mut self.timers, at);
                index += 1;
            }
        }
        self.powerup.restart(&mut self.timers, &self.tuning);

        let payload = ResetPayload {
            players: self
                .players
                .iter()
                .map(|p| PlayerPosition {
                    id: p.id,
                    position: p.position(&self.world).unwrap_or_default(),
                })
                .collect(),
            ball: self.ball.position(&self.world),
        };
        self.hooks.on_reset(&payload);
        self.diff.force_next();
    }

    /// Kickoff spot `index` of `count`, spaced evenly along the team's line
    fn formation_spot(&self, team: Team, index: usize, count: usize) -> Vec2 {
        let center = self.profile.center();
        let offset = self.profile.width * self.tuning.kickoff_offset_ratio;
        let x = match team {
            Team::Left => center.x - offset,
            Team::Right => center.x + offset,
            Team::Spectator => center.x,
        };
        let y = (index + 1) as f32 * self.profile.height / (count + 1) as f32;
        Vec2::new(x, y)
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn side_of(team: Team) -> Option<Side> {
    match team {
        Team::Left => Some(Side::Left),
        Team::Right => Some(Side::Right),
        Team::Spectator => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::profile::MapSize;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        TimeStop,
        TimeResume,
        Score(Team, Option<PlayerId>),
        Update(DiffPayload),
        Reset(ResetPayload),
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Event>>>);

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.0.lock().clone()
        }

        fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
            self.0.lock().iter().filter(|e| pred(e)).count()
        }

        fn clear(&self) {
            self.0.lock().clear();
        }
    }

    impl RoomHooks for Recorder {
        fn on_time_stop(&mut self) {
            self.0.lock().push(Event::TimeStop);
        }

        fn on_time_resume(&mut self) {
            self.0.lock().push(Event::TimeResume);
        }

        fn on_score_changed(&mut self, team: Team, scorer: Option<&GoalCredit>) {
            self.0.lock().push(Event::Score(team, scorer.map(|c| c.id)));
        }

        fn on_update(&mut self, payload: &DiffPayload) {
            self.0.lock().push(Event::Update(payload.clone()));
        }

        fn on_reset(&mut self, payload: &ResetPayload) {
            self.0.lock().push(Event::Reset(payload.clone()));
        }
    }

    /// 50 steps per second, so every step is exactly 20ms
    const STEP: Duration = Duration::from_millis(20);

    fn options() -> SimulationOptions {
        SimulationOptions {
            tick_rate: 50,
            send_rate: 50,
            max_steps_per_run: 10_000,
            seed: 42,
            ..SimulationOptions::default()
        }
    }

    fn room(users: Vec<RoomUser>) -> (Simulation, Recorder) {
        let recorder = Recorder::default();
        let sim = Simulation::new(
            MapProfile::for_size(MapSize::Small),
            users,
            Box::new(recorder.clone()),
            options(),
        )
        .unwrap();
        (sim, recorder)
    }

    fn place(sim: &mut Simulation, id: PlayerId, at: Vec2) {
        let body = sim.player(id).unwrap().body;
        sim.world.body_mut(body).unwrap().reset_to(at);
    }

    fn place_ball(sim: &mut Simulation, at: Vec2, velocity: Vec2) {
        let body = sim.world.body_mut(sim.ball.body).unwrap();
        body.reset_to(at);
        body.velocity = velocity;
    }

    fn press(keys: &str) -> KeysDelta {
        serde_json::from_str(keys).unwrap()
    }

    #[test]
    fn invalid_profile_is_rejected() {
        let mut profile = MapProfile::for_size(MapSize::Small);
        profile.post_radius = -1.0;
        let result = Simulation::new(profile, Vec::new(), Box::new(Recorder::default()), options());
        assert!(matches!(result, Err(GameError::InvalidProfile(_))));
    }

    #[test]
    fn goals_are_static_and_in_world() {
        let (sim, _) = room(Vec::new());
        for side in [Side::Left, Side::Right] {
            let goal = sim.goal(side);
            assert_eq!(goal.side, side);
            for handle in goal.bodies() {
                assert!(sim.world.body(handle).is_some_and(|b| b.is_static()));
            }
        }
    }

    #[test]
    fn first_step_is_kickoff_exactly_once() {
        let a = RoomUser::new("a", Team::Left);
        let (mut sim, rec) = room(vec![a.clone()]);
        assert_eq!(sim.phase(), Phase::Kickoff);

        sim.run_for(STEP * 3);
        assert_eq!(sim.phase(), Phase::Active);
        assert_eq!(rec.count(|e| *e == Event::TimeStop), 1);
        assert_eq!(rec.count(|e| matches!(e, Event::Reset(_))), 1);
        assert_eq!(sim.lock_side(), None);
        assert_eq!(sim.ball_position(), sim.profile().center());
    }

    #[test]
    fn clock_resumes_on_first_ball_movement() {
        let (mut sim, rec) = room(vec![RoomUser::new("a", Team::Left)]);
        sim.step_once();
        let center = sim.profile().center();
        place_ball(&mut sim, center, Vec2::new(40.0, 0.0));
        sim.step_once();
        assert_eq!(rec.count(|e| *e == Event::TimeResume), 1);
        sim.run_for(STEP * 5);
        assert_eq!(rec.count(|e| *e == Event::TimeResume), 1);
    }

    #[test]
    fn spectators_get_no_body() {
        let (mut sim, _) = room(Vec::new());
        sim.add_player(RoomUser::new("watcher", Team::Spectator));
        sim.step_once();
        assert_eq!(sim.player_count(), 0);
    }

    #[test]
    fn shot_sends_ball_toward_opponent_goal() {
        let a = RoomUser::new("a", Team::Left);
        let b = RoomUser::new("b", Team::Right);
        let (mut sim, _) = room(vec![a.clone(), b.clone()]);
        sim.step_once();

        let center = sim.profile().center();
        place(&mut sim, a.id, center - Vec2::new(27.0, 0.0));
        sim.queue_keys(a.id, press(r#"{"shoot": true}"#));
        sim.step_once();

        let velocity = sim.ball_velocity();
        assert!(velocity.x > 0.0, "ball should head right, got {velocity:?}");
        assert!(velocity.y.abs() < 1e-3);
        assert_eq!(sim.last_touch().map(|p| p.id), Some(a.id));
        assert!(sim.player(a.id).unwrap().shooting_cooldown);
    }

    #[test]
    fn dash_shot_into_wall_keeps_ball_on_pitch() {
        for x in [300.0, 520.0, 700.0, 910.0, 1100.0] {
            let a = RoomUser::new("a", Team::Left);
            let mut sim = Simulation::new(
                MapProfile::for_size(MapSize::Big),
                vec![a.clone()],
                Box::new(Recorder::default()),
                SimulationOptions {
                    tick_rate: 60,
                    send_rate: 30,
                    max_steps_per_run: 10_000,
                    seed: 7,
                    ..SimulationOptions::default()
                },
            )
            .unwrap();
            sim.step_once();

            let reach = sim.tuning().player_radius + sim.tuning().ball_radius + 2.0;
            place_ball(&mut sim, Vec2::new(x, 200.0), Vec2::ZERO);
            place(&mut sim, a.id, Vec2::new(x, 200.0 + reach));
            let body = sim.player(a.id).unwrap().body;
            sim.world.body_mut(body).unwrap().velocity = Vec2::new(0.0, -450.0);
            sim.queue_keys(a.id, press(r#"{"shoot": true}"#));
            sim.step_once();
            assert_eq!(sim.last_touch().map(|p| p.id), Some(a.id));
            assert!(sim.ball_velocity().y < -600.0, "weak shot {:?}", sim.ball_velocity());

            let height = sim.profile().height;
            let mut bounced = false;
            for _ in 0..180 {
                sim.step_once();
                let at = sim.ball_position();
                bounced |= sim.ball_velocity().y > 0.0;
                assert!(at.y > 0.0 && at.y < height, "ball escaped to {at:?} from x={x}");
            }
            assert!(bounced);
        }
    }

    #[test]
    fn shoot_cooldown_lasts_exactly_its_window() {
        let a = RoomUser::new("a", Team::Left);
        let (mut sim, _) = room(vec![a.clone()]);
        sim.step_once();
        let center = sim.profile().center();
        place(&mut sim, a.id, center - Vec2::new(27.0, 0.0));
        sim.queue_keys(a.id, press(r#"{"shoot": true}"#));
        sim.step_once();
        sim.queue_keys(a.id, press(r#"{"shoot": false}"#));
        let shot_at = sim.elapsed();

        let window = sim.tuning().shoot_cooldown;
        let mut cleared_at = None;
        while cleared_at.is_none() && sim.elapsed() < shot_at + window * 2 {
            sim.step_once();
            if !sim.player(a.id).unwrap().shooting_cooldown {
                cleared_at = Some(sim.elapsed());
            }
        }
        assert_eq!(cleared_at, Some(shot_at + window));
    }

    #[test]
    fn dash_restores_velocity_once_per_cycle() {
        let a = RoomUser::new("a", Team::Left);
        let (mut sim, _) = room(vec![a.clone()]);
        sim.step_once();

        sim.queue_keys(a.id, press(r#"{"right": true, "dash": true}"#));
        sim.step_once();
        let dashing = sim.player(a.id).unwrap().dashing;
        assert!(dashing);
        let pending = sim.pending_timers();

        // holding dash keeps it idempotent
        sim.run_for(STEP * 3);
        assert_eq!(sim.pending_timers(), pending);

        let tuning = sim.tuning().clone();
        sim.run_for(tuning.dash_duration + tuning.dash_cooldown + STEP);
        let restores = sim
            .timers
            .count_where(|t| matches!(t, RoomTask::DashRestore { .. }));
        assert_eq!(restores, 1, "the held key starts a fresh cycle only after cooldown");
    }

    #[test]
    fn left_exit_pauses_for_right() {
        let (mut sim, rec) = room(vec![RoomUser::new("a", Team::Left)]);
        sim.step_once();
        let y = sim.profile().center().y;
        place_ball(&mut sim, Vec2::new(-15.0, y), Vec2::ZERO);
        sim.step_once();
        assert_eq!(sim.phase(), Phase::GoalPause(Team::Right));
        assert_eq!(rec.count(|e| matches!(e, Event::Score(Team::Right, _))), 1);
    }

    #[test]
    fn right_exit_scores_once_and_resets_with_lock() {
        let a = RoomUser::new("a", Team::Left);
        let b = RoomUser::new("b", Team::Right);
        let (mut sim, rec) = room(vec![a.clone(), b.clone()]);
        sim.step_once();
        sim.last_touch = Some(a.id);
        rec.clear();

        let (w, y) = (sim.profile().width, sim.profile().center().y);
        place_ball(&mut sim, Vec2::new(w + 15.0, y), Vec2::ZERO);
        sim.run_for(STEP * 5);

        assert_eq!(sim.phase(), Phase::GoalPause(Team::Left));
        assert_eq!(rec.count(|e| *e == Event::Score(Team::Left, Some(a.id))), 1);
        assert_eq!(rec.count(|e| *e == Event::TimeStop), 1);

        let delay = sim.tuning().goal_reset_delay;
        sim.run_for(delay);
        assert_eq!(sim.phase(), Phase::Active);
        assert_eq!(rec.count(|e| matches!(e, Event::Score(..))), 1);
        assert_eq!(sim.ball_position(), sim.profile().center());
        assert_eq!(sim.lock_side(), Some(Side::Right));
        assert!(sim.lock_in_world());

        let left_x = sim.formation_spot(Team::Left, 0, 1).x;
        let right_x = sim.formation_spot(Team::Right, 0, 1).x;
        let pa = sim.player(a.id).unwrap().position(&sim.world).unwrap();
        let pb = sim.player(b.id).unwrap().position(&sim.world).unwrap();
        assert!((pa.x - left_x).abs() < 1e-3);
        assert!((pb.x - right_x).abs() < 1e-3);

        sim.run_for(STEP * 10);
        assert!(sim.lock_in_world());

        let center = sim.profile().center();
        place_ball(&mut sim, center, Vec2::new(-30.0, 0.0));
        sim.step_once();
        assert!(!sim.lock_in_world());
        assert_eq!(sim.lock_side(), None);
    }

    #[test]
    fn formation_uses_live_roster() {
        let a = RoomUser::new("a", Team::Left);
        let (mut sim, rec) = room(vec![a.clone()]);
        sim.step_once();

        let (w, y) = (sim.profile().width, sim.profile().center().y);
        place_ball(&mut sim, Vec2::new(w + 15.0, y), Vec2::ZERO);
        sim.step_once();
        assert!(matches!(sim.phase(), Phase::GoalPause(_)));

        let late = RoomUser::new("late", Team::Left);
        sim.add_player(late.clone());
        rec.clear();
        let delay = sim.tuning().goal_reset_delay;
        sim.run_for(delay);

        let resets: Vec<ResetPayload> = rec
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Reset(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(resets.len(), 1);
        let mut ys: Vec<f32> = resets[0].players.iter().map(|p| p.position.y).collect();
        ys.sort_by(f32::total_cmp);
        let h = sim.profile().height;
        assert_eq!(ys.len(), 2);
        assert!((ys[0] - h / 3.0).abs() < 1e-3);
        assert!((ys[1] - 2.0 * h / 3.0).abs() < 1e-3);
    }

    #[test]
    fn powerup_pickup_is_exclusive() {
        let a = RoomUser::new("a", Team::Left);
        let b = RoomUser::new("b", Team::Right);
        let (mut sim, _) = room(vec![a.clone(), b.clone()]);
        sim.step_once();
        sim.powerup.cancel(&mut sim.timers);
        sim.powerup.activate(&mut sim.rng);
        let spot = sim.powerup.position;
        place(&mut sim, a.id, spot);
        place(&mut sim, b.id, spot + Vec2::new(0.0, 20.0));

        sim.step_once();
        let holders = [a.id, b.id]
            .iter()
            .filter(|id| sim.player(**id).unwrap().power.is_some())
            .count();
        assert_eq!(holders, 1);
        assert!(!sim.powerup.is_active());
        assert_eq!(sim.timers.count_where(|t| *t == RoomTask::PowerupSpawn), 1);
    }

    #[test]
    fn quiet_room_sends_no_update() {
        let (mut sim, rec) = room(vec![RoomUser::new("a", Team::Left)]);
        sim.step_once();
        sim.inform();
        rec.clear();
        sim.run_for(STEP * 2);
        assert!(!sim.inform());
        assert_eq!(rec.count(|e| matches!(e, Event::Update(_))), 0);
    }

    #[test]
    fn join_is_announced_without_moving() {
        let (mut sim, rec) = room(Vec::new());
        sim.step_once();
        sim.inform();
        rec.clear();

        let late = RoomUser::new("late", Team::Right);
        sim.add_player(late.clone());
        assert!(sim.inform());
        let events = rec.events();
        let Some(Event::Update(payload)) = events.last() else {
            panic!("expected an update, got {events:?}");
        };
        assert_eq!(payload.added.len(), 1);
        assert_eq!(payload.added[0].id, late.id);
        assert!(payload.moving.is_empty());
    }

    #[test]
    fn leaving_releases_body_and_timers() {
        let a = RoomUser::new("a", Team::Left);
        let (mut sim, _) = room(vec![a.clone()]);
        sim.step_once();
        let body = sim.player(a.id).unwrap().body;
        sim.queue_keys(a.id, press(r#"{"up": true, "dash": true}"#));
        sim.step_once();
        assert!(sim.player(a.id).unwrap().has_pending_timers());

        sim.remove_player(a.id);
        sim.remove_player(a.id);
        sim.step_once();
        assert!(sim.player(a.id).is_none());
        assert!(!sim.world.contains(body));
        assert_eq!(sim.timers.count_where(|t| t.player() == Some(a.id)), 0);
    }

    #[test]
    fn dispose_is_terminal_and_leak_free() {
        let a = RoomUser::new("a", Team::Left);
        let (mut sim, rec) = room(vec![a.clone()]);
        sim.step_once();
        sim.queue_keys(a.id, press(r#"{"up": true, "dash": true, "shoot": true}"#));
        sim.step_once();
        let (w, y) = (sim.profile().width, sim.profile().center().y);
        place_ball(&mut sim, Vec2::new(w + 15.0, y), Vec2::ZERO);
        sim.step_once();
        assert!(sim.pending_timers() > 0);

        sim.dispose();
        sim.dispose();
        assert!(sim.is_disposed());
        assert_eq!(sim.pending_timers(), 0);
        assert_eq!(sim.listener_count(), 0);
        assert_eq!(sim.player_count(), 0);

        rec.clear();
        sim.add_player(RoomUser::new("b", Team::Right));
        sim.queue_keys(a.id, press(r#"{"left": true}"#));
        assert_eq!(sim.run_for(Duration::from_secs(10)), 0);
        sim.step_once();
        assert!(!sim.inform());
        assert!(rec.events().is_empty());
        assert_eq!(sim.phase(), Phase::Disposed);
    }

    #[test]
    fn run_caps_catch_up_steps() {
        let mut sim = Simulation::new(
            MapProfile::for_size(MapSize::Small),
            Vec::new(),
            Box::new(Recorder::default()),
            SimulationOptions::default(),
        )
        .unwrap();
        let start = Instant::now();
        assert_eq!(sim.run(start), 0);
        let steps = sim.run(start + Duration::from_secs(5));
        assert_eq!(steps, DEFAULT_MAX_STEPS_PER_RUN);
    }
}
