//! Room relay service - assigns rooms and relays held-key messages between peers

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ws::protocol::{ClientMsg, Intent, PlayerId, ServerMsg};

use super::rooms::{JoinOutcome, RoomBook};

/// Outbound half of one connected peer
#[derive(Clone, Debug)]
pub struct PeerLink {
    pub conn_id: Uuid,
    pub tx: mpsc::Sender<ServerMsg>,
    /// Bound on the connection's first JOIN_ROOM
    pub player_id: Option<PlayerId>,
}

impl PeerLink {
    pub fn new(tx: mpsc::Sender<ServerMsg>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            tx,
            player_id: None,
        }
    }
}

/// Matchmaking and relay. Never simulates the game.
pub struct RoomService {
    book: Mutex<RoomBook>,
    /// Connected players and their outbound channel
    peers: DashMap<PlayerId, PeerLink>,
}

impl RoomService {
    pub fn new() -> Self {
        Self::with_book(RoomBook::new())
    }

    /// Relay whose full rooms advertise `rounds_target` rounds
    pub fn with_rounds(rounds_target: u32) -> Self {
        Self::with_book(RoomBook::with_rounds(rounds_target))
    }

    fn with_book(book: RoomBook) -> Self {
        Self {
            book: Mutex::new(book),
            peers: DashMap::new(),
        }
    }

    /// Handle one message from a connection
    pub fn handle(&self, link: &mut PeerLink, msg: ClientMsg) {
        match msg {
            ClientMsg::JoinRoom {
                player_id,
                match_id,
                friendly,
            } => self.join(link, player_id, match_id, friendly),
            ClientMsg::KeyHeld { player_id, intent } => self.relay(link, player_id, intent),
            ClientMsg::LeaveRoom { player_id } => {
                if link.player_id.as_ref() == Some(&player_id) {
                    self.leave(&player_id);
                } else {
                    warn!(conn_id = %link.conn_id, player_id = %player_id, "Leave for foreign player ignored");
                }
            }
        }
    }

    fn join(
        &self,
        link: &mut PeerLink,
        player_id: PlayerId,
        match_id: Option<PlayerId>,
        friendly: bool,
    ) {
        // A connection re-joining (or switching identity) gives up its old room first
        if let Some(previous) = link.player_id.take() {
            self.leave(&previous);
            self.peers.remove(&previous);
        }
        // Same id from a fresh connection: its stale room is closed
        self.leave(&player_id);
        link.player_id = Some(player_id.clone());
        self.peers.insert(player_id.clone(), link.clone());

        let outcome = {
            let mut book = self.book.lock();
            let outcome = book.join(player_id.clone(), match_id, friendly);
            let waited = book.room_of(&player_id).map(|room| room.age());
            outcome.map(|o| (o, waited))
        };

        match outcome {
            Ok((JoinOutcome::Opened(room), _)) => {
                info!(player_id = %player_id, room_id = %room.id, friendly, "Room opened");
                self.send_to(&player_id, ServerMsg::MatchFound { room });
            }
            Ok((JoinOutcome::Filled(room), waited)) => {
                info!(
                    player_id = %player_id,
                    room_id = %room.id,
                    waited_ms = waited.map(|w| w.as_millis() as u64).unwrap_or(0),
                    "Room filled"
                );
                self.send_to(&room.player_a, ServerMsg::MatchFound { room: room.clone() });
                self.send_to(&player_id, ServerMsg::MatchFound { room });
            }
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "Join rejected");
                self.send_to(
                    &player_id,
                    ServerMsg::Error {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    fn relay(&self, link: &PeerLink, player_id: PlayerId, intent: Intent) {
        if link.player_id.as_ref() != Some(&player_id) {
            warn!(conn_id = %link.conn_id, player_id = %player_id, "Spoofed key message dropped");
            return;
        }
        let opponent = self.book.lock().opponent_of(&player_id).cloned();
        if let Some(opponent) = opponent {
            self.send_to(&opponent, ServerMsg::KeyHeld { player_id, intent });
        }
    }

    /// Close the player's room and tell the opponent
    pub fn leave(&self, player_id: &PlayerId) {
        let departure = self.book.lock().leave(player_id);
        if let Some(departure) = departure {
            info!(player_id = %player_id, room_id = %departure.room_id, "Player left room");
            if let Some(opponent) = departure.opponent {
                self.send_to(&opponent, ServerMsg::OpponentDisconnected);
            }
        }
    }

    /// Connection closed; only acts if this connection still owns the player
    pub fn disconnect(&self, link: &PeerLink) {
        let Some(player_id) = &link.player_id else {
            return;
        };
        let owned = self
            .peers
            .remove_if(player_id, |_, current| current.conn_id == link.conn_id)
            .is_some();
        if owned {
            self.leave(player_id);
        }
    }

    fn send_to(&self, player_id: &PlayerId, msg: ServerMsg) {
        let Some(peer) = self.peers.get(player_id).map(|p| p.tx.clone()) else {
            return;
        };
        if let Err(e) = peer.try_send(msg) {
            warn!(player_id = %player_id, error = %e, "Failed to queue message for peer");
        }
    }

    pub fn room_count(&self) -> usize {
        self.book.lock().room_count()
    }

    pub fn player_count(&self) -> usize {
        self.peers.len()
    }
}

impl Default for RoomService {
    fn default() -> Self {
        Self::new()
    }
}
