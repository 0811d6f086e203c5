//! Room assignment: quick-match pairing and friendly rooms joined by code

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::game::r#match::ROUNDS_TARGET;
use crate::ws::protocol::{MatchScore, PlayerId, Room};

/// A room that has been opened by its side-A player
#[derive(Debug, Clone)]
pub struct OpenRoom {
    pub player_a: PlayerId,
    pub player_b: Option<PlayerId>,
    pub friendly: bool,
    pub opened_at: Instant,
}

impl OpenRoom {
    fn new(player_a: PlayerId, friendly: bool) -> Self {
        Self {
            player_a,
            player_b: None,
            friendly,
            opened_at: Instant::now(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.player_b.is_some()
    }

    /// How long the room has existed
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    pub fn descriptor(&self, rounds_target: u32) -> Room {
        Room {
            id: self.player_a.clone(),
            is_full: self.is_full(),
            player_a: self.player_a.clone(),
            player_b: self.player_b.clone(),
            friendly: self.friendly,
            score: self.is_full().then_some(MatchScore {
                rounds: rounds_target,
                score_a: 0,
                score_b: 0,
            }),
        }
    }
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// New room, waiting for an opponent
    Opened(Room),
    /// Room now has both players
    Filled(Room),
}

/// A player's exit from a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: PlayerId,
    /// The player left behind, if the room had one
    pub opponent: Option<PlayerId>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("no room with code {0}")]
    RoomNotFound(PlayerId),

    #[error("room {0} already has two players")]
    RoomFull(PlayerId),

    #[error("player {0} is already in a room")]
    AlreadyInRoom(PlayerId),
}

impl RoomError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "room_not_found",
            Self::RoomFull(_) => "room_full",
            Self::AlreadyInRoom(_) => "already_in_room",
        }
    }
}

/// Every open room, keyed by its side-A player id
#[derive(Debug)]
pub struct RoomBook {
    /// Match length advertised in every full room
    rounds_target: u32,
    rooms: HashMap<PlayerId, OpenRoom>,
    /// player -> room id
    membership: HashMap<PlayerId, PlayerId>,
    /// Public rooms waiting for a second player, oldest first
    waiting: VecDeque<PlayerId>,
}

impl RoomBook {
    pub fn new() -> Self {
        Self::with_rounds(ROUNDS_TARGET)
    }

    pub fn with_rounds(rounds_target: u32) -> Self {
        Self {
            rounds_target,
            rooms: HashMap::new(),
            membership: HashMap::new(),
            waiting: VecDeque::new(),
        }
    }

    /// Place a player: by code when `match_id` is set, a private room when
    /// `friendly`, otherwise the oldest waiting public room or a new one.
    pub fn join(
        &mut self,
        player: PlayerId,
        match_id: Option<PlayerId>,
        friendly: bool,
    ) -> Result<JoinOutcome, RoomError> {
        if self.membership.contains_key(&player) {
            return Err(RoomError::AlreadyInRoom(player));
        }

        if let Some(code) = match_id {
            return self.fill(code, player);
        }

        if !friendly {
            while let Some(room_id) = self.waiting.pop_front() {
                let open = self
                    .rooms
                    .get(&room_id)
                    .map(|room| !room.is_full())
                    .unwrap_or(false);
                if open {
                    return self.fill(room_id, player);
                }
            }
            self.waiting.push_back(player.clone());
        }

        let room = OpenRoom::new(player.clone(), friendly);
        let descriptor = room.descriptor(self.rounds_target);
        self.membership.insert(player.clone(), player.clone());
        self.rooms.insert(player, room);
        Ok(JoinOutcome::Opened(descriptor))
    }

    fn fill(&mut self, room_id: PlayerId, player: PlayerId) -> Result<JoinOutcome, RoomError> {
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
        if room.is_full() {
            return Err(RoomError::RoomFull(room_id));
        }
        room.player_b = Some(player.clone());
        let descriptor = room.descriptor(self.rounds_target);
        self.waiting.retain(|id| *id != room_id);
        self.membership.insert(player, room_id);
        Ok(JoinOutcome::Filled(descriptor))
    }

    /// Close the player's room. The opponent, if any, is released too.
    pub fn leave(&mut self, player: &PlayerId) -> Option<Departure> {
        let room_id = self.membership.remove(player)?;
        let room = self.rooms.remove(&room_id)?;
        self.waiting.retain(|id| *id != room_id);

        let opponent = if room.player_a == *player {
            room.player_b
        } else {
            Some(room.player_a)
        };
        if let Some(other) = &opponent {
            self.membership.remove(other);
        }
        Some(Departure { room_id, opponent })
    }

    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        let room = self.rooms.get(self.membership.get(player)?)?;
        if room.player_a == *player {
            room.player_b.as_ref()
        } else {
            Some(&room.player_a)
        }
    }

    pub fn room_of(&self, player: &PlayerId) -> Option<&OpenRoom> {
        self.rooms.get(self.membership.get(player)?)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn player_count(&self) -> usize {
        self.membership.len()
    }
}

impl Default for RoomBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> PlayerId {
        PlayerId::new(s)
    }

    #[test]
    fn quick_match_pairs_in_arrival_order() {
        let mut book = RoomBook::new();
        let first = book.join(id("p1"), None, false).unwrap();
        assert!(matches!(first, JoinOutcome::Opened(ref room) if !room.is_full && room.id == id("p1")));

        match book.join(id("p2"), None, false).unwrap() {
            JoinOutcome::Filled(room) => {
                assert_eq!(room.id, id("p1"));
                assert_eq!(room.player_b, Some(id("p2")));
                assert!(room.is_full);
                assert_eq!(room.score.map(|s| s.rounds), Some(6));
            }
            other => panic!("unexpected {other:?}"),
        }

        // Third player opens a fresh room
        assert!(matches!(book.join(id("p3"), None, false).unwrap(), JoinOutcome::Opened(_)));
        assert_eq!(book.opponent_of(&id("p2")), Some(&id("p1")));
        assert_eq!(book.opponent_of(&id("p3")), None);
        assert_eq!(book.room_count(), 2);
        assert_eq!(book.player_count(), 3);
    }

    #[test]
    fn friendly_rooms_are_joined_by_code_only() {
        let mut book = RoomBook::new();
        book.join(id("host"), None, true).unwrap();

        // Quick match does not land in the private room
        assert!(matches!(book.join(id("stranger"), None, false).unwrap(), JoinOutcome::Opened(_)));

        let joined = book.join(id("friend"), Some(id("host")), false).unwrap();
        assert!(matches!(joined, JoinOutcome::Filled(ref room) if room.friendly));

        assert_eq!(
            book.join(id("late"), Some(id("host")), false),
            Err(RoomError::RoomFull(id("host")))
        );
        assert_eq!(
            book.join(id("lost"), Some(id("nobody")), false),
            Err(RoomError::RoomNotFound(id("nobody")))
        );
    }

    #[test]
    fn leaving_releases_both_players() {
        let mut book = RoomBook::new();
        book.join(id("p1"), None, false).unwrap();
        book.join(id("p2"), None, false).unwrap();

        let departure = book.leave(&id("p2")).unwrap();
        assert_eq!(departure.room_id, id("p1"));
        assert_eq!(departure.opponent, Some(id("p1")));
        assert_eq!(book.room_count(), 0);
        assert_eq!(book.player_count(), 0);
        assert!(book.leave(&id("p1")).is_none());

        // Both can queue again
        assert!(book.join(id("p1"), None, false).is_ok());
    }

    #[test]
    fn abandoned_waiting_room_is_skipped() {
        let mut book = RoomBook::new();
        book.join(id("p1"), None, false).unwrap();
        let departure = book.leave(&id("p1")).unwrap();
        assert_eq!(departure.opponent, None);

        assert!(matches!(book.join(id("p2"), None, false).unwrap(), JoinOutcome::Opened(_)));
        assert_eq!(
            book.join(id("p2"), None, false),
            Err(RoomError::AlreadyInRoom(id("p2")))
        );
    }

    #[test]
    fn full_rooms_advertise_the_configured_match_length() {
        let mut book = RoomBook::with_rounds(4);
        book.join(id("p1"), None, false).unwrap();
        match book.join(id("p2"), None, false).unwrap() {
            JoinOutcome::Filled(room) => assert_eq!(room.score.map(|s| s.rounds), Some(4)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
