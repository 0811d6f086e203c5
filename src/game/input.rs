//! Held-key replication: edge-triggered key events in, periodic intents out

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::ws::protocol::{ClientMsg, Intent, PlayerId};

use super::Command;

/// Default re-emission period while a key is held
pub const HELD_KEY_PERIOD: Duration = Duration::from_millis(20);

/// Shortest period accepted; smaller values are raised to this
pub const MIN_HELD_KEY_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
struct HeldKey {
    intent: Intent,
    next_due: Instant,
}

/// Turns key-down/key-up edges into a level-triggered stream of intents.
///
/// Only one key drives emission at a time (the first one pressed). The
/// first emission happens one period after key-down, never at key-down.
/// Emissions falling due exactly at the key-up instant are still produced.
#[derive(Debug)]
pub struct InputReplicator {
    local_id: PlayerId,
    period: Duration,
    held: Option<HeldKey>,
}

impl InputReplicator {
    pub fn new(local_id: PlayerId, period: Duration) -> Self {
        Self {
            local_id,
            period: period.max(MIN_HELD_KEY_PERIOD),
            held: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn held(&self) -> Option<Intent> {
        self.held.map(|h| h.intent)
    }

    /// When the next emission falls due, if a key is held
    pub fn next_due(&self) -> Option<Instant> {
        self.held.map(|h| h.next_due)
    }

    /// Start holding `intent`. Ignored while another key is held.
    pub fn key_down(&mut self, intent: Intent, now: Instant) -> bool {
        if let Some(held) = self.held {
            if held.intent != intent {
                trace!(held = ?held.intent, ignored = ?intent, "Second key ignored while holding");
            }
            return false;
        }
        self.held = Some(HeldKey {
            intent,
            next_due: now + self.period,
        });
        true
    }

    /// Release `intent`. Emissions due up to and including `now` are returned first.
    pub fn key_up(&mut self, intent: Intent, now: Instant) -> Vec<Intent> {
        match self.held {
            Some(held) if held.intent == intent => {
                let due = self.poll(now);
                self.held = None;
                due
            }
            _ => Vec::new(),
        }
    }

    /// Collect every emission due at or before `now`
    pub fn poll(&mut self, now: Instant) -> Vec<Intent> {
        let mut due = Vec::new();
        if let Some(held) = self.held.as_mut() {
            while held.next_due <= now {
                due.push(held.intent);
                held.next_due += self.period;
            }
        }
        due
    }

    /// Stop any pending emission
    pub fn cancel(&mut self) {
        self.held = None;
    }

    /// Outbound replication message for an emitted intent
    pub fn replicate(&self, intent: Intent) -> ClientMsg {
        ClientMsg::KeyHeld {
            player_id: self.local_id.clone(),
            intent,
        }
    }

    /// Command for the opposing avatar, or `None` for our own echoed messages
    pub fn route_inbound(&self, player_id: &PlayerId, intent: Intent) -> Option<Command> {
        if *player_id == self.local_id {
            return None;
        }
        Some(Command::from(intent))
    }
}
