//! Room runtime: one tokio task per simulation

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{DiffPayload, GoalCredit, ResetPayload, RoomSnapshot, ServerMsg, Team};

use super::input::KeysDelta;
use super::profile::{MapProfile, MapSize};
use super::simulation::{RoomHooks, Simulation, SimulationOptions};
use super::{GameError, PlayerId, RoomUser};

/// Requests from connections to a room task
#[derive(Debug)]
pub enum RoomCommand {
    /// Enter the room. The reply carries the state before the join.
    Join {
        user: RoomUser,
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Leave {
        id: PlayerId,
    },
    Keys {
        id: PlayerId,
        delta: KeysDelta,
    },
    /// Full state for a connection that fell behind the broadcast
    Resync {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Stop,
}

/// Score and match clock of one room
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    pub left: u32,
    pub right: u32,
    played: Duration,
    running_since: Option<Instant>,
}

impl ScoreBoard {
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn goal(&mut self, team: Team) {
        match team {
            Team::Left => self.left += 1,
            Team::Right => self.right += 1,
            Team::Spectator => {}
        }
    }

    pub fn stop(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.played += now.saturating_duration_since(since);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    /// Play time, excluding stoppages
    pub fn elapsed(&self, now: Instant) -> Duration {
        let current = self
            .running_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        self.played + current
    }
}

/// Forwards simulation events to every connection in the room
struct ChannelHooks {
    room_id: Uuid,
    score: Arc<Mutex<ScoreBoard>>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
}

impl ChannelHooks {
    fn send(&self, msg: ServerMsg) {
        // No receivers is fine
        let _ = self.broadcast_tx.send(msg);
    }

    fn clock_msg(&self, now: Instant) -> ServerMsg {
        let score = self.score.lock();
        ServerMsg::Clock {
            running: score.is_running(),
            elapsed_ms: score.elapsed(now).as_millis() as u64,
        }
    }
}

impl RoomHooks for ChannelHooks {
    fn on_time_stop(&mut self) {
        let now = Instant::now();
        self.score.lock().stop(now);
        self.send(self.clock_msg(now));
    }

    fn on_time_resume(&mut self) {
        let now = Instant::now();
        self.score.lock().resume(now);
        self.send(self.clock_msg(now));
    }

    fn on_score_changed(&mut self, team: Team, scorer: Option<&GoalCredit>) {
        let (left, right) = {
            let mut score = self.score.lock();
            score.goal(team);
            (score.left, score.right)
        };
        info!(room_id = %self.room_id, ?team, left, right, "Score changed");
        self.send(ServerMsg::Score {
            team,
            scorer: scorer.cloned(),
            left,
            right,
        });
    }

    fn on_update(&mut self, payload: &DiffPayload) {
        self.send(ServerMsg::Update(payload.clone()));
    }

    fn on_reset(&mut self, payload: &ResetPayload) {
        self.send(ServerMsg::Reset(payload.clone()));
    }
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub map_size: MapSize,
    pub command_tx: mpsc::Sender<RoomCommand>,
    pub broadcast_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
    pub score: Arc<Mutex<ScoreBoard>>,
}

/// Room listing entry
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: Uuid,
    pub map_size: MapSize,
    pub players: usize,
    pub left: u32,
    pub right: u32,
    pub clock_running: bool,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.broadcast_tx.subscribe()
    }

    pub fn summary(&self) -> RoomSummary {
        let score = self.score.lock();
        RoomSummary {
            id: self.id,
            map_size: self.map_size,
            players: self.player_count(),
            left: score.left,
            right: score.right,
            clock_running: score.is_running(),
        }
    }
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: Arc<DashMap<Uuid, RoomHandle>>,
    options: SimulationOptions,
    /// How long a room may sit without connections before it closes
    idle_timeout: Duration,
}

impl RoomRegistry {
    pub fn new(options: SimulationOptions, idle_timeout: Duration) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            options,
            idle_timeout,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        self.rooms.iter().map(|r| r.value().summary()).collect()
    }

    /// Start a room task. It leaves the registry when it ends.
    pub fn create(&self, size: MapSize) -> Result<RoomHandle, GameError> {
        let id = Uuid::new_v4();
        let mut options = self.options.clone();
        options.seed = rand::random();
        let (room, handle) = Room::new(id, MapProfile::for_size(size), options, self.idle_timeout)?;
        self.rooms.insert(id, handle.clone());

        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            room.run().await;
            rooms.remove(&id);
            info!(room_id = %id, "Room removed from registry");
        });

        Ok(handle)
    }
}

/// The authoritative room loop
pub struct Room {
    id: Uuid,
    sim: Simulation,
    command_rx: mpsc::Receiver<RoomCommand>,
    player_count: Arc<AtomicUsize>,
    /// Every connection in the room, spectators included
    members: HashSet<PlayerId>,
    tick_rate: u32,
    idle_timeout: Duration,
    /// Set while nobody is connected
    empty_since: Option<Instant>,
}

impl Room {
    pub fn new(
        id: Uuid,
        profile: MapProfile,
        options: SimulationOptions,
        idle_timeout: Duration,
    ) -> Result<(Self, RoomHandle), GameError> {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));
        let score = Arc::new(Mutex::new(ScoreBoard::default()));

        let map_size = profile.size;
        let tick_rate = options.tick_rate;
        let hooks = ChannelHooks {
            room_id: id,
            score: score.clone(),
            broadcast_tx: broadcast_tx.clone(),
        };
        let sim = Simulation::new(profile, Vec::new(), Box::new(hooks), options)?;

        let handle = RoomHandle {
            id,
            map_size,
            command_tx,
            broadcast_tx,
            player_count: player_count.clone(),
            score,
        };

        let room = Self {
            id,
            sim,
            command_rx,
            player_count,
            members: HashSet::new(),
            tick_rate,
            idle_timeout,
            empty_since: Some(Instant::now()),
        };

        Ok((room, handle))
    }

    /// Run the fixed-rate tick loop until the room empties, idles out or is stopped
    pub async fn run(mut self) {
        info!(room_id = %self.id, map_size = %self.sim.profile().size, "Room started");

        let tick_duration = Duration::from_nanos(1_000_000_000 / self.tick_rate.max(1) as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if !self.process_commands() {
                break;
            }

            let now = Instant::now();
            if self.idle_expired(now) {
                info!(room_id = %self.id, idle_secs = self.idle_timeout.as_secs(), "Room idle, closing");
                break;
            }

            self.sim.tick(now);
        }

        self.sim.dispose();
        info!(room_id = %self.id, steps = self.sim.steps(), "Room closed");
    }

    fn idle_expired(&self, now: Instant) -> bool {
        self.empty_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.idle_timeout)
    }

    /// Drain pending commands. Returns false once the room should close.
    fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(RoomCommand::Join { user, reply }) => {
                    if reply.send(self.sim.snapshot()).is_err() {
                        warn!(room_id = %self.id, user_id = %user.id, "Joining connection went away");
                        continue;
                    }
                    info!(
                        room_id = %self.id,
                        user_id = %user.id,
                        nickname = %user.nickname,
                        team = ?user.team,
                        "User joined room"
                    );
                    self.members.insert(user.id);
                    self.empty_since = None;
                    self.sim.add_player(user);
                    self.player_count.store(self.members.len(), Ordering::Relaxed);
                }
                Ok(RoomCommand::Leave { id }) => {
                    self.sim.remove_player(id);
                    self.members.remove(&id);
                    self.player_count.store(self.members.len(), Ordering::Relaxed);
                    info!(room_id = %self.id, user_id = %id, "User left room");
                    if self.members.is_empty() {
                        info!(room_id = %self.id, "Last connection left");
                        return false;
                    }
                }
                Ok(RoomCommand::Keys { id, delta }) => {
                    if self.members.contains(&id) {
                        self.sim.queue_keys(id, delta);
                    } else {
                        debug!(room_id = %self.id, user_id = %id, "Keys from unknown connection");
                    }
                }
                Ok(RoomCommand::Resync { reply }) => {
                    debug!(room_id = %self.id, "Resync requested");
                    let _ = reply.send(self.sim.snapshot());
                }
                Ok(RoomCommand::Stop) => {
                    info!(room_id = %self.id, "Room stop requested");
                    return false;
                }
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }
}
