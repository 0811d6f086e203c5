//! Matchmaking collaborator: room assignment and peer relay

pub mod rooms;
pub mod service;

pub use rooms::{JoinOutcome, RoomBook, RoomError};
pub use service::{PeerLink, RoomService};
