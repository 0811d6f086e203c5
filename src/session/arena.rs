//! Session orchestrator: joins a room, runs the match loop, tears down

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::ArenaConfig;
use crate::game::avatar::{AvatarPair, ProjectileSpawned};
use crate::game::feed::drain;
use crate::game::physics::Rect;
use crate::game::{
    CollisionResolver, CombatEvent, Command, InputReplicator, MatchStateMachine, PlayerSide,
    RoundFollowUp, RoundOutcome,
};
use crate::ws::protocol::{decode_server_msg, ClientMsg, Direction, Intent, PlayerId, Room, ServerMsg};

use super::identity::{load_or_generate, IdentityStore};
use super::transport::Transport;
use super::{HostEvent, JoinRequest, SessionEnd, SessionError, SessionEvent};

/// Host-facing event buffer
const EVENT_CAPACITY: usize = 256;

/// Timed transition waiting on the phase deadline
#[derive(Debug, Clone, Copy)]
enum Pending {
    StartPlaying,
    FinishRound,
    Teardown(SessionEnd),
}

/// Whichever source woke the loop
enum Step {
    Inbound(Option<String>),
    Host(Option<HostEvent>),
    HeldDue,
    Frame,
    Deadline,
}

/// Position and spawn feeds of one avatar, rendered as host events
struct AvatarWatch {
    side: PlayerSide,
    positions: UnboundedReceiver<Rect>,
    spawns: UnboundedReceiver<ProjectileSpawned>,
    facing: Direction,
}

impl AvatarWatch {
    fn attach(avatars: &mut AvatarPair, side: PlayerSide) -> Self {
        let avatar = avatars.get_mut(side);
        Self {
            side,
            positions: avatar.subscribe_positions(),
            spawns: avatar.subscribe_spawns(),
            facing: avatar.facing(),
        }
    }
}

/// Game state for one match. Synchronous; the session feeds it time and input.
pub(crate) struct Arena {
    local_side: PlayerSide,
    machine: MatchStateMachine,
    avatars: AvatarPair,
    resolver: CollisionResolver,
    replicator: InputReplicator,
    watches: [AvatarWatch; 2],
    events: broadcast::Sender<SessionEvent>,
}

impl Arena {
    pub(crate) fn new(
        config: &ArenaConfig,
        machine: MatchStateMachine,
        local_side: PlayerSide,
        local_id: PlayerId,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let mut avatars = AvatarPair::new(config.arena);
        let resolver = CollisionResolver::attach(&mut avatars);
        let watches = [
            AvatarWatch::attach(&mut avatars, PlayerSide::A),
            AvatarWatch::attach(&mut avatars, PlayerSide::B),
        ];
        Self {
            local_side,
            machine,
            avatars,
            resolver,
            replicator: InputReplicator::new(local_id, config.held_key_period),
            watches,
            events,
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn start(&mut self) {
        if self.machine.start() {
            self.emit(SessionEvent::RoundStarted {
                round_number: self.machine.score().round_number,
            });
        }
    }

    fn next_held_due(&self) -> Option<Instant> {
        self.replicator.next_due()
    }

    fn key_down(&mut self, key: &str, now: Instant) {
        if self.machine.is_terminal() {
            return;
        }
        match Intent::from_key(key) {
            Some(intent) => {
                self.replicator.key_down(intent, now);
            }
            None => trace!(key, "Unmapped key"),
        }
    }

    fn key_up(&mut self, key: &str, now: Instant) -> Vec<ClientMsg> {
        let Some(intent) = Intent::from_key(key) else {
            return Vec::new();
        };
        let due = self.replicator.key_up(intent, now);
        self.emit_local(due)
    }

    fn poll_held(&mut self, now: Instant) -> Vec<ClientMsg> {
        let due = self.replicator.poll(now);
        self.emit_local(due)
    }

    /// Apply each intent to the local avatar, then queue it for replication
    fn emit_local(&mut self, intents: Vec<Intent>) -> Vec<ClientMsg> {
        let mut outbound = Vec::with_capacity(intents.len());
        for intent in intents {
            if !self.machine.accepts_commands() {
                continue;
            }
            if self
                .avatars
                .get_mut(self.local_side)
                .apply_command(Command::from(intent))
            {
                outbound.push(self.replicator.replicate(intent));
            }
        }
        self.flush_watches();
        outbound
    }

    /// Drive the opposing avatar from a relayed intent
    fn remote_intent(&mut self, player_id: &PlayerId, intent: Intent) -> bool {
        let Some(command) = self.replicator.route_inbound(player_id, intent) else {
            return false;
        };
        if !self.machine.accepts_commands() {
            return false;
        }
        let applied = self
            .avatars
            .get_mut(self.local_side.opponent())
            .apply_command(command);
        self.flush_watches();
        applied
    }

    /// Handle one relay frame; true when it means the opponent is gone
    fn on_frame(&mut self, text: &str) -> bool {
        match decode_server_msg(text) {
            Ok(ServerMsg::KeyHeld { player_id, intent }) => {
                self.remote_intent(&player_id, intent);
                false
            }
            Ok(ServerMsg::OpponentDisconnected) => self.opponent_left(),
            Ok(ServerMsg::MatchFound { room }) => {
                debug!(room_id = %room.id, "Room update during match ignored");
                false
            }
            Ok(ServerMsg::Error { code, message }) => {
                warn!(%code, %message, "Relay reported an error");
                false
            }
            Err(e) => {
                debug!(error = %e, "Dropping malformed frame");
                false
            }
        }
    }

    fn opponent_left(&mut self) -> bool {
        // A decided match plays out its result even if the opponent leaves first
        if self.machine.is_terminal() || self.machine.score().winner().is_some() {
            return false;
        }
        self.machine.opponent_left();
        self.replicator.cancel();
        self.avatars.set_controls(false);
        self.emit(SessionEvent::OpponentDisconnected);
        true
    }

    /// One animation frame; returns the outcome if it decided a round
    fn frame(&mut self) -> Option<RoundOutcome> {
        self.avatars.advance(1);
        let mut decided = None;
        for event in self.resolver.pump(&mut self.avatars) {
            match event {
                CombatEvent::Hit(hit) => self.emit(SessionEvent::HealthChanged {
                    side: hit.target,
                    health: hit.remaining_health,
                }),
                CombatEvent::RoundWon { winner } => {
                    if let Some(outcome) = self.machine.round_won(winner) {
                        self.round_over(outcome);
                        decided = Some(outcome);
                    }
                }
            }
        }
        self.flush_watches();
        decided
    }

    fn round_over(&mut self, outcome: RoundOutcome) {
        self.avatars.set_controls(false);
        self.emit(SessionEvent::RoundOver {
            winner: outcome.round_winner,
            you_won: outcome.round_winner == self.local_side,
            score: outcome.score,
        });
        if let Some(winner) = outcome.match_winner {
            self.emit(SessionEvent::MatchOver {
                winner,
                you_won: winner == self.local_side,
            });
        }
    }

    fn finish_round(&mut self) -> Option<RoundFollowUp> {
        let follow_up = self.machine.finish_round()?;
        if follow_up == RoundFollowUp::NextRound {
            self.avatars.reinitialize();
            self.flush_watches();
            self.emit(SessionEvent::RoundStarted {
                round_number: self.machine.score().round_number,
            });
        }
        Some(follow_up)
    }

    /// Forward everything the avatars published to the host
    fn flush_watches(&mut self) {
        for watch in self.watches.iter_mut() {
            let avatar = self.avatars.get(watch.side);
            let facing = avatar.facing();
            let moved = drain(&mut watch.positions);
            if moved.is_empty() && facing != watch.facing {
                let _ = self.events.send(SessionEvent::AvatarMoved {
                    side: watch.side,
                    position: avatar.position(),
                    facing,
                });
            }
            for position in moved {
                let _ = self.events.send(SessionEvent::AvatarMoved {
                    side: watch.side,
                    position,
                    facing,
                });
            }
            watch.facing = facing;

            for spawn in drain(&mut watch.spawns) {
                let _ = self.events.send(SessionEvent::ProjectileFired {
                    side: spawn.owner,
                    position: spawn.position,
                    facing: spawn.facing,
                });
            }
        }
    }

    fn shutdown(&mut self) {
        self.replicator.cancel();
        self.avatars.close_feeds();
    }
}

/// One peer's side of one match
pub struct ArenaSession {
    config: ArenaConfig,
    player_id: PlayerId,
    transport: Transport,
    host: mpsc::Receiver<HostEvent>,
    events: broadcast::Sender<SessionEvent>,
}

impl ArenaSession {
    pub fn new(
        config: ArenaConfig,
        identity: &dyn IdentityStore,
        transport: Transport,
        host: mpsc::Receiver<HostEvent>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let player_id = load_or_generate(identity)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            config,
            player_id,
            transport,
            host,
            events,
        })
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// Host-facing event stream
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Join a room and play the match out
    pub async fn run(mut self, request: JoinRequest) -> Result<SessionEnd, SessionError> {
        info!(
            player_id = %self.player_id,
            friendly = request.friendly,
            code = ?request.match_id,
            "Joining room"
        );

        let room = match self.join(request).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                self.teardown().await;
                return Ok(SessionEnd::SelfLeft);
            }
            Err(e) => {
                warn!(player_id = %self.player_id, error = %e, "Join failed");
                self.leave_room().await;
                return Err(e);
            }
        };

        // The relay's advertised match length wins so both peers agree
        let rounds_target = room
            .score
            .map(|score| score.rounds)
            .filter(|rounds| *rounds > 0)
            .unwrap_or(self.config.rounds_target);
        let mut machine = MatchStateMachine::new(rounds_target);
        let side = machine.on_room(&room, &self.player_id);
        let _ = self.events.send(SessionEvent::MatchFound {
            side,
            room_id: room.id.clone(),
        });

        let mut arena = Arena::new(
            &self.config,
            machine,
            side,
            self.player_id.clone(),
            self.events.clone(),
        );
        let result = self.drive(&mut arena).await;
        arena.shutdown();
        self.teardown().await;

        info!(player_id = %self.player_id, room_id = %room.id, result = ?result, "Session finished");
        result
    }

    async fn join(&mut self, request: JoinRequest) -> Result<Option<Room>, SessionError> {
        self.send(ClientMsg::JoinRoom {
            player_id: self.player_id.clone(),
            match_id: request.match_id,
            friendly: request.friendly,
        })
        .await?;

        let limit = self.config.join_timeout;
        match timeout(limit, self.await_full_room()).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::JoinTimeout(limit)),
        }
    }

    /// Wait for a full room. `None` when the host gave up first.
    async fn await_full_room(&mut self) -> Result<Option<Room>, SessionError> {
        loop {
            let step = tokio::select! {
                frame = self.transport.inbound.recv() => Step::Inbound(frame),
                event = self.host.recv() => Step::Host(event),
            };

            match step {
                Step::Inbound(Some(text)) => match decode_server_msg(&text) {
                    Ok(ServerMsg::MatchFound { room }) if room.is_full => return Ok(Some(room)),
                    Ok(ServerMsg::MatchFound { room }) => {
                        info!(room_id = %room.id, friendly = room.friendly, "Waiting for opponent");
                        let _ = self.events.send(SessionEvent::WaitingForOpponent {
                            room_id: room.id,
                            friendly: room.friendly,
                        });
                    }
                    Ok(ServerMsg::Error { code, message }) => {
                        return Err(SessionError::Rejected { code, message })
                    }
                    Ok(other) => debug!(msg = ?other, "Ignoring message while joining"),
                    Err(e) => debug!(error = %e, "Dropping malformed frame"),
                },
                Step::Inbound(None) => return Err(SessionError::ChannelClosed),
                Step::Host(Some(HostEvent::Leave)) | Step::Host(None) => return Ok(None),
                Step::Host(Some(_)) => {}
                Step::HeldDue | Step::Frame | Step::Deadline => {}
            }
        }
    }

    /// The match loop. Owns every state change until teardown.
    async fn drive(&mut self, arena: &mut Arena) -> Result<SessionEnd, SessionError> {
        let mut frames = interval(self.config.frame_period);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut pending = Some((
            Instant::now() + self.config.match_found_delay,
            Pending::StartPlaying,
        ));

        loop {
            let held_due = arena.next_held_due();
            let deadline = pending.map(|(at, _)| at);

            let step = tokio::select! {
                frame = self.transport.inbound.recv() => Step::Inbound(frame),
                event = self.host.recv() => Step::Host(event),
                _ = sleep_until_opt(held_due) => Step::HeldDue,
                _ = frames.tick() => Step::Frame,
                _ = sleep_until_opt(deadline) => Step::Deadline,
            };
            let now = Instant::now();

            match step {
                Step::Inbound(Some(text)) => {
                    if arena.on_frame(&text) {
                        pending = Some((
                            now + self.config.disconnect_delay,
                            Pending::Teardown(SessionEnd::OpponentLeft),
                        ));
                    }
                }
                Step::Inbound(None) => return Err(SessionError::ChannelClosed),
                Step::Host(Some(HostEvent::KeyDown(key))) => arena.key_down(&key, now),
                Step::Host(Some(HostEvent::KeyUp(key))) => {
                    let outbound = arena.key_up(&key, now);
                    self.send_all(outbound).await?;
                }
                Step::Host(Some(HostEvent::Leave)) | Step::Host(None) => {
                    return Ok(SessionEnd::SelfLeft)
                }
                Step::HeldDue => {
                    let outbound = arena.poll_held(now);
                    self.send_all(outbound).await?;
                }
                Step::Frame => {
                    if arena.frame().is_some() {
                        pending = Some((now + self.config.round_end_delay, Pending::FinishRound));
                    }
                }
                Step::Deadline => match pending.take() {
                    Some((_, Pending::StartPlaying)) => arena.start(),
                    Some((_, Pending::FinishRound)) => {
                        if let Some(RoundFollowUp::MatchOver { winner }) = arena.finish_round() {
                            return Ok(SessionEnd::MatchOver { winner });
                        }
                    }
                    Some((_, Pending::Teardown(end))) => return Ok(end),
                    None => {}
                },
            }
        }
    }

    async fn send(&self, msg: ClientMsg) -> Result<(), SessionError> {
        self.transport
            .outbound
            .send(msg)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    async fn send_all(&self, msgs: Vec<ClientMsg>) -> Result<(), SessionError> {
        for msg in msgs {
            self.send(msg).await?;
        }
        Ok(())
    }

    async fn leave_room(&self) {
        let leave = ClientMsg::LeaveRoom {
            player_id: self.player_id.clone(),
        };
        if self.send(leave).await.is_err() {
            debug!(player_id = %self.player_id, "Channel already closed on leave");
        }
    }

    async fn teardown(&self) {
        self.leave_room().await;
        let _ = self.events.send(SessionEvent::ReturnToLobby);
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
