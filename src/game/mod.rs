//! Peer-side match engine: avatars, hit detection, input replication, round flow

pub mod avatar;
pub mod combat;
pub mod feed;
pub mod input;
pub mod r#match;
pub mod physics;

pub use avatar::{Avatar, AvatarPair, Projectile, ProjectileFrame, ProjectileSpawned};
pub use combat::{CollisionResolver, CombatEvent, HitResult};
pub use input::InputReplicator;
pub use r#match::{Match, MatchPhase, MatchStateMachine, RoundFollowUp, RoundOutcome};

use serde::{Deserialize, Serialize};

use crate::ws::protocol::{Direction, Intent};

/// Which of the two match slots a peer occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSide {
    A,
    B,
}

impl PlayerSide {
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Command applied to an avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Fire,
}

impl From<Intent> for Command {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Move { direction } => Self::Move(direction),
            Intent::Fire => Self::Fire,
        }
    }
}
