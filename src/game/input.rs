//! Player key state and the per-room input router

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PlayerId;

/// Authoritative key state of one player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysMap {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub shoot: bool,
    pub dash: bool,
}

impl KeysMap {
    pub fn any_direction(&self) -> bool {
        self.up || self.down || self.left || self.right
    }

    /// Overwrite only the keys present in `delta`
    pub fn apply(&mut self, delta: &KeysDelta) {
        let pairs = [
            (&mut self.up, delta.up),
            (&mut self.down, delta.down),
            (&mut self.left, delta.left),
            (&mut self.right, delta.right),
            (&mut self.shoot, delta.shoot),
            (&mut self.dash, delta.dash),
        ];
        for (slot, value) in pairs {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

/// Changed subset of a player's keys, as sent by the client
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct KeysDelta {
    #[serde(default)]
    pub up: Option<bool>,
    #[serde(default)]
    pub down: Option<bool>,
    #[serde(default)]
    pub left: Option<bool>,
    #[serde(default)]
    pub right: Option<bool>,
    #[serde(default)]
    pub shoot: Option<bool>,
    #[serde(default)]
    pub dash: Option<bool>,
    /// Keys this server does not know; dropped on merge
    #[serde(flatten)]
    pub unknown: HashMap<String, serde_json::Value>,
}

impl KeysDelta {
    pub fn is_empty(&self) -> bool {
        self.up.is_none()
            && self.down.is_none()
            && self.left.is_none()
            && self.right.is_none()
            && self.shoot.is_none()
            && self.dash.is_none()
    }

    /// Fold a newer delta on top of this one, key by key
    pub fn merge(&mut self, newer: KeysDelta) {
        self.up = newer.up.or(self.up);
        self.down = newer.down.or(self.down);
        self.left = newer.left.or(self.left);
        self.right = newer.right.or(self.right);
        self.shoot = newer.shoot.or(self.shoot);
        self.dash = newer.dash.or(self.dash);
    }
}

/// Buffers key deltas between ticks so a tick never sees half-applied input
#[derive(Debug, Default)]
pub struct InputRouter {
    pending: HashMap<PlayerId, KeysDelta>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, player: PlayerId, mut delta: KeysDelta) {
        if !delta.unknown.is_empty() {
            debug!(
                user_id = %player,
                keys = ?delta.unknown.keys().collect::<Vec<_>>(),
                "Ignoring unknown input keys"
            );
            delta.unknown.clear();
        }
        if delta.is_empty() {
            return;
        }
        self.pending.entry(player).or_default().merge(delta);
    }

    /// Pending delta for a player, consumed
    pub fn take(&mut self, player: PlayerId) -> Option<KeysDelta> {
        self.pending.remove(&player)
    }

    pub fn forget(&mut self, player: PlayerId) {
        self.pending.remove(&player);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn has_pending(&self, player: PlayerId) -> bool {
        self.pending.contains_key(&player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_only_touches_sent_keys() {
        let mut keys = KeysMap {
            up: true,
            shoot: true,
            ..KeysMap::default()
        };
        let delta: KeysDelta = serde_json::from_str(r#"{"shoot": false, "left": true}"#).unwrap();
        keys.apply(&delta);
        assert!(keys.up);
        assert!(keys.left);
        assert!(!keys.shoot);
        assert!(keys.any_direction());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let delta: KeysDelta =
            serde_json::from_str(r#"{"jump": true, "dash": true}"#).unwrap();
        assert_eq!(delta.dash, Some(true));
        assert!(delta.unknown.contains_key("jump"));

        let mut router = InputRouter::new();
        let id = PlayerId::new_v4();
        router.queue(id, delta);
        let pending = router.take(id).unwrap();
        assert!(pending.unknown.is_empty());
        assert_eq!(pending.dash, Some(true));
    }

    #[test]
    fn only_unknown_keys_queue_nothing() {
        let delta: KeysDelta = serde_json::from_str(r#"{"jump": true}"#).unwrap();
        let mut router = InputRouter::new();
        let id = PlayerId::new_v4();
        router.queue(id, delta);
        assert!(!router.has_pending(id));
    }

    #[test]
    fn later_deltas_win_per_key() {
        let mut router = InputRouter::new();
        let id = PlayerId::new_v4();
        router.queue(
            id,
            KeysDelta {
                up: Some(true),
                shoot: Some(true),
                ..KeysDelta::default()
            },
        );
        router.queue(
            id,
            KeysDelta {
                up: Some(false),
                ..KeysDelta::default()
            },
        );
        let merged = router.take(id).unwrap();
        assert_eq!(merged.up, Some(false));
        assert_eq!(merged.shoot, Some(true));
        assert!(router.take(id).is_none());
    }
}
