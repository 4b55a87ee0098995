//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::input::KeysDelta;
use crate::util::Vec2;

/// Side a player plays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Left,
    Right,
    /// Watches only; never gets a body
    Spectator,
}

impl Default for Team {
    fn default() -> Self {
        Self::Spectator
    }
}

impl Team {
    /// The other playing side. Spectators have no opponent.
    pub fn opponent(self) -> Option<Team> {
        match self {
            Team::Left => Some(Team::Right),
            Team::Right => Some(Team::Left),
            Team::Spectator => None,
        }
    }

    pub fn is_playing(self) -> bool {
        !matches!(self, Team::Spectator)
    }
}

/// Ability granted by a powerup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerupKind {
    /// Higher top speed until the next kickoff
    Speed,
    /// Stronger next shot
    Strength,
    /// Longer next dash
    Dash,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 3] = [PowerupKind::Speed, PowerupKind::Strength, PowerupKind::Dash];
}

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Keys that changed since the client's previous `keys` message
    Keys {
        #[serde(flatten)]
        keys: KeysDelta,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        room_id: Uuid,
        server_time: u64,
    },

    /// Full room state, sent once to a joining client
    Snapshot(RoomSnapshot),

    /// Changes since the previous update
    Update(DiffPayload),

    /// Everyone was put back in kickoff formation
    Reset(ResetPayload),

    /// A goal was scored
    Score {
        team: Team,
        scorer: Option<GoalCredit>,
        left: u32,
        right: u32,
    },

    /// Match clock stopped or resumed
    Clock {
        running: bool,
        elapsed_ms: u64,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Everything a client needs to draw a player it has not seen before
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerDescriptor {
    pub id: Uuid,
    pub nickname: String,
    pub avatar: String,
    pub team: Team,
    pub position: Vec2,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerupKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayerPosition {
    pub id: Uuid,
    pub position: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShootingChange {
    pub id: Uuid,
    pub shooting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerupState {
    pub position: Vec2,
    pub kind: Option<PowerupKind>,
}

/// Incremental update. Clients keep their last known value for anything
/// not listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffPayload {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<PlayerDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shooting: Vec<ShootingChange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub moving: Vec<PlayerPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ball: Option<Vec2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub powerup: Option<PowerupState>,
}

impl DiffPayload {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.shooting.is_empty()
            && self.moving.is_empty()
            && self.ball.is_none()
            && self.powerup.is_none()
    }
}

/// Kickoff formation after a reset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetPayload {
    pub players: Vec<PlayerPosition>,
    pub ball: Vec2,
}

/// Full state for late joiners
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub players: Vec<PlayerDescriptor>,
    pub ball: Vec2,
    pub powerup: PowerupState,
}

/// Who gets credit for a goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalCredit {
    pub id: Uuid,
    pub nickname: String,
    pub team: Team,
    /// The player put the ball in their own net
    pub own_goal: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff_fields_are_omitted() {
        let payload = DiffPayload {
            ball: Some(Vec2::new(1.0, 2.0)),
            ..DiffPayload::default()
        };
        let json = serde_json::to_value(ServerMsg::Update(payload)).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["ball"]["x"], 1.0);
        assert!(json.get("added").is_none());
        assert!(json.get("moving").is_none());
        assert!(json.get("powerup").is_none());
    }

    #[test]
    fn keys_message_parses_flat_delta() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"keys","up":true,"turbo":false}"#).unwrap();
        match msg {
            ClientMsg::Keys { keys } => {
                assert_eq!(keys.up, Some(true));
                assert_eq!(keys.down, None);
                assert!(keys.unknown.contains_key("turbo"));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn opponents() {
        assert_eq!(Team::Left.opponent(), Some(Team::Right));
        assert_eq!(Team::Spectator.opponent(), None);
        assert!(!Team::Spectator.is_playing());
    }
}
