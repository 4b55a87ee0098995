//! Game simulation modules

pub mod entity;
pub mod geometry;
pub mod input;
pub mod physics;
pub mod profile;
pub mod room;
pub mod simulation;
pub mod snapshot;
pub mod timer;
pub mod tuning;

pub use profile::{MapProfile, MapSize};
pub use room::{RoomCommand, RoomHandle, RoomRegistry};
pub use simulation::{Phase, RoomHooks, Simulation, SimulationOptions};

use uuid::Uuid;

use crate::ws::protocol::Team;

/// Stable connection id of a player
pub type PlayerId = Uuid;

/// A connected user as handed over by the room layer
#[derive(Debug, Clone, PartialEq)]
pub struct RoomUser {
    pub id: PlayerId,
    pub nickname: String,
    pub avatar: String,
    pub team: Team,
}

impl RoomUser {
    pub fn new(nickname: impl Into<String>, team: Team) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname: nickname.into(),
            avatar: String::new(),
            team,
        }
    }
}

/// Errors raised while setting up a room
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Invalid map profile: {0}")]
    InvalidProfile(String),

    #[error("Unknown map size: {0}")]
    UnknownMapSize(String),
}
