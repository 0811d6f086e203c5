//! Application state shared across routes

use std::sync::Arc;

use crate::config::{ArenaConfig, Config};
use crate::matchmaking::RoomService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: Arc<ArenaConfig>,
    pub rooms: Arc<RoomService>,
}

impl AppState {
    pub fn new(config: Config, arena: ArenaConfig) -> Self {
        Self {
            config: Arc::new(config),
            rooms: Arc::new(RoomService::with_rounds(arena.rounds_target)),
            arena: Arc::new(arena),
        }
    }
}
