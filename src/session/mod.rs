//! Per-match orchestration: one `ArenaSession` per joined room

pub mod arena;
pub mod identity;
pub mod transport;

pub use arena::ArenaSession;
pub use identity::{
    generate_player_id, load_or_generate, FileIdentityStore, IdentityError, IdentityStore,
    MemoryIdentityStore,
};
pub use transport::Transport;

use std::time::Duration;

use crate::config::ConfigError;
use crate::game::physics::Rect;
use crate::game::{Match, PlayerSide};
use crate::ws::protocol::{Direction, PlayerId};

/// Raw input from the host (keyboard or equivalent)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Key identifier, e.g. "ArrowUp" or " "
    KeyDown(String),
    KeyUp(String),
    /// Player asked to leave the match
    Leave,
}

/// What the session tells the host to render
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Room opened, waiting for the second player. `room_id` is the code a
    /// friend joins with.
    WaitingForOpponent { room_id: PlayerId, friendly: bool },
    MatchFound { side: PlayerSide, room_id: PlayerId },
    RoundStarted { round_number: u32 },
    AvatarMoved {
        side: PlayerSide,
        position: Rect,
        facing: Direction,
    },
    ProjectileFired {
        side: PlayerSide,
        position: Rect,
        facing: Direction,
    },
    HealthChanged { side: PlayerSide, health: u32 },
    RoundOver {
        winner: PlayerSide,
        you_won: bool,
        score: Match,
    },
    MatchOver { winner: PlayerSide, you_won: bool },
    OpponentDisconnected,
    ReturnToLobby,
}

/// How a session finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    MatchOver { winner: PlayerSide },
    OpponentLeft,
    SelfLeft,
}

/// Matchmaking request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinRequest {
    /// Join a friendly room by its code
    pub match_id: Option<PlayerId>,
    /// Open a private room instead of quick matching
    pub friendly: bool,
}

impl JoinRequest {
    pub fn quick() -> Self {
        Self::default()
    }

    pub fn host_friendly() -> Self {
        Self {
            match_id: None,
            friendly: true,
        }
    }

    pub fn join_code(code: PlayerId) -> Self {
        Self {
            match_id: Some(code),
            friendly: true,
        }
    }
}

/// Session errors. All are local to one session; the host may retry.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no opponent joined within {0:?}")]
    JoinTimeout(Duration),

    #[error("relay rejected join: {message} ({code})")]
    Rejected { code: String, message: String },

    #[error("relay channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
