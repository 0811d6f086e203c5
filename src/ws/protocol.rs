//! Channel protocol message definitions
//! These are the wire types shared by arena peers and the room relay

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque player identifier, stable for the life of a client profile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Movement direction (also the avatar's facing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Map a keyboard token to a direction
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" => Some(Self::Up),
            "ArrowRight" => Some(Self::Right),
            "ArrowDown" => Some(Self::Down),
            "ArrowLeft" => Some(Self::Left),
            _ => None,
        }
    }
}

/// Replicated input intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// Step the avatar one unit of movement
    Move { direction: Direction },
    /// Spawn a projectile
    Fire,
}

impl Intent {
    /// Key token reserved for firing
    pub const FIRE_KEY: &'static str = " ";

    /// Map a keyboard token to an intent, `None` for keys the arena ignores
    pub fn from_key(key: &str) -> Option<Self> {
        if key == Self::FIRE_KEY {
            return Some(Self::Fire);
        }
        Direction::from_key(key).map(|direction| Self::Move { direction })
    }
}

/// Score record attached to a full room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    pub rounds: u32,
    pub score_a: u32,
    pub score_b: u32,
}

/// Room descriptor produced by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Identifier of the side-A player (also the friendly match code)
    pub id: PlayerId,
    pub is_full: bool,
    pub player_a: PlayerId,
    pub player_b: Option<PlayerId>,
    #[serde(default)]
    pub friendly: bool,
    #[serde(rename = "match", default)]
    pub score: Option<MatchScore>,
}

/// Messages sent from a peer to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMsg {
    /// Ask for a room
    JoinRoom {
        player_id: PlayerId,
        /// Friendly match code to join, otherwise quick match
        #[serde(default)]
        match_id: Option<PlayerId>,
        /// Open a private room others join by code
        #[serde(default)]
        friendly: bool,
    },

    /// Held-key replication, repeated while the key is down
    KeyHeld { player_id: PlayerId, intent: Intent },

    /// Leave the current room
    LeaveRoom { player_id: PlayerId },
}

/// Messages sent from the relay to a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMsg {
    /// Room assignment, resent when the room fills
    MatchFound { room: Room },

    /// Opponent's held-key replication
    KeyHeld { player_id: PlayerId, intent: Intent },

    /// The other peer left or dropped
    OpponentDisconnected,

    /// Request rejected
    Error { code: String, message: String },
}

/// Wire encode/decode failures
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn encode<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

pub fn decode_server_msg(text: &str) -> Result<ServerMsg, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_client_msg(text: &str) -> Result<ClientMsg, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
