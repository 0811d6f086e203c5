//! Duel Arena - two-player real-time dueling arena
//!
//! - `game`: the peer-side engine (avatars, hit detection, held-key replication, rounds)
//! - `session`: the per-match orchestrator that wires the engine to a channel
//! - `matchmaking`, `ws`, `http`: the room relay that pairs peers and forwards their input

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod session;
pub mod util;
pub mod ws;
