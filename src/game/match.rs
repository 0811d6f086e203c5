//! Round and match progression

use tracing::{info, warn};

use crate::ws::protocol::{PlayerId, Room};

use super::PlayerSide;

/// Rounds in a match
pub const ROUNDS_TARGET: u32 = 6;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Waiting for the room to fill
    Joining,
    /// Round in progress
    Playing,
    /// Round decided, outcome on display
    RoundEnd,
    /// Match decided
    MatchEnd,
    /// Opponent left
    Disconnected,
}

/// Score bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub rounds_target: u32,
    pub score_a: u32,
    pub score_b: u32,
    pub round_number: u32,
}

impl Match {
    pub fn new(rounds_target: u32) -> Self {
        Self {
            rounds_target,
            score_a: 0,
            score_b: 0,
            round_number: 1,
        }
    }

    pub fn score(&self, side: PlayerSide) -> u32 {
        match side {
            PlayerSide::A => self.score_a,
            PlayerSide::B => self.score_b,
        }
    }

    /// Smallest score strictly above half the rounds (4 of 6)
    pub fn majority(&self) -> u32 {
        self.rounds_target / 2 + 1
    }

    /// Side whose score has reached the majority, if any
    pub fn winner(&self) -> Option<PlayerSide> {
        let majority = self.majority();
        if self.score_a >= majority {
            Some(PlayerSide::A)
        } else if self.score_b >= majority {
            Some(PlayerSide::B)
        } else {
            None
        }
    }
}

/// What a round win resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round_winner: PlayerSide,
    pub match_winner: Option<PlayerSide>,
    pub score: Match,
}

/// What happens once the round-end window closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundFollowUp {
    /// Reinitialize both avatars and keep playing
    NextRound,
    /// Tear the session down
    MatchOver { winner: PlayerSide },
}

/// Local round/match state. Both peers run one and feed it the same round wins.
#[derive(Debug)]
pub struct MatchStateMachine {
    phase: MatchPhase,
    local_side: Option<PlayerSide>,
    score: Match,
    match_winner: Option<PlayerSide>,
}

impl MatchStateMachine {
    pub fn new(rounds_target: u32) -> Self {
        Self {
            phase: MatchPhase::Joining,
            local_side: None,
            score: Match::new(rounds_target),
            match_winner: None,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn score(&self) -> Match {
        self.score
    }

    pub fn local_side(&self) -> Option<PlayerSide> {
        self.local_side
    }

    /// Commands reach avatars only while a round is live
    pub fn accepts_commands(&self) -> bool {
        self.phase == MatchPhase::Playing
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, MatchPhase::MatchEnd | MatchPhase::Disconnected)
    }

    /// Assign our side from the room: the room is keyed by side A's player id
    pub fn on_room(&mut self, room: &Room, local_id: &PlayerId) -> PlayerSide {
        let side = if room.id == *local_id {
            PlayerSide::A
        } else {
            PlayerSide::B
        };
        self.local_side = Some(side);
        self.score = Match::new(self.score.rounds_target);
        info!(room_id = %room.id, side = ?side, "Side assigned");
        side
    }

    /// Leave `Joining` once the match-found delay has elapsed
    pub fn start(&mut self) -> bool {
        if self.phase != MatchPhase::Joining {
            return false;
        }
        self.phase = MatchPhase::Playing;
        true
    }

    /// Record a round win. Ignored outside `Playing`.
    pub fn round_won(&mut self, winner: PlayerSide) -> Option<RoundOutcome> {
        if self.phase != MatchPhase::Playing {
            warn!(winner = ?winner, phase = ?self.phase, "Round win outside play ignored");
            return None;
        }

        match winner {
            PlayerSide::A => self.score.score_a += 1,
            PlayerSide::B => self.score.score_b += 1,
        }
        self.score.round_number += 1;
        self.phase = MatchPhase::RoundEnd;
        self.match_winner = self.score.winner();

        info!(
            winner = ?winner,
            score_a = self.score.score_a,
            score_b = self.score.score_b,
            round = self.score.round_number,
            match_decided = self.match_winner.is_some(),
            "Round won"
        );

        Some(RoundOutcome {
            round_winner: winner,
            match_winner: self.match_winner,
            score: self.score,
        })
    }

    /// Close the round-end window
    pub fn finish_round(&mut self) -> Option<RoundFollowUp> {
        if self.phase != MatchPhase::RoundEnd {
            return None;
        }
        match self.match_winner {
            Some(winner) => {
                self.phase = MatchPhase::MatchEnd;
                Some(RoundFollowUp::MatchOver { winner })
            }
            None => {
                self.phase = MatchPhase::Playing;
                Some(RoundFollowUp::NextRound)
            }
        }
    }

    pub fn opponent_left(&mut self) {
        if self.phase != MatchPhase::MatchEnd {
            self.phase = MatchPhase::Disconnected;
        }
    }
}
