//! Hit detection between projectiles and the opposing avatar

use std::collections::HashSet;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use super::avatar::{AvatarPair, ProjectileFrame, ProjectileId};
use super::feed::drain;
use super::physics::Rect;
use super::PlayerSide;

/// Damage dealt by one projectile
pub const PROJECTILE_DAMAGE: u32 = 1;

/// Hit result from combat resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub projectile_id: ProjectileId,
    pub shooter: PlayerSide,
    pub target: PlayerSide,
    pub remaining_health: u32,
    pub position: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatEvent {
    Hit(HitResult),
    /// The opposing avatar's health just reached zero
    RoundWon { winner: PlayerSide },
}

/// Watches both avatars' feeds and turns projectile frames into damage.
///
/// Each avatar's last published position is cached; projectile frames are
/// tested against the cached rectangle of the side that did not fire them.
pub struct CollisionResolver {
    positions_a: UnboundedReceiver<Rect>,
    positions_b: UnboundedReceiver<Rect>,
    frames_a: UnboundedReceiver<ProjectileFrame>,
    frames_b: UnboundedReceiver<ProjectileFrame>,
    last_seen_a: Rect,
    last_seen_b: Rect,
    spent: HashSet<(PlayerSide, ProjectileId)>,
}

impl CollisionResolver {
    /// Subscribe to both avatars
    pub fn attach(avatars: &mut AvatarPair) -> Self {
        let last_seen_a = avatars.get(PlayerSide::A).position();
        let last_seen_b = avatars.get(PlayerSide::B).position();
        let a = avatars.get_mut(PlayerSide::A);
        let positions_a = a.subscribe_positions();
        let frames_a = a.subscribe_frames();
        let b = avatars.get_mut(PlayerSide::B);
        let positions_b = b.subscribe_positions();
        let frames_b = b.subscribe_frames();

        Self {
            positions_a,
            positions_b,
            frames_a,
            frames_b,
            last_seen_a,
            last_seen_b,
            spent: HashSet::new(),
        }
    }

    pub fn last_seen(&self, side: PlayerSide) -> Rect {
        match side {
            PlayerSide::A => self.last_seen_a,
            PlayerSide::B => self.last_seen_b,
        }
    }

    /// Process everything the avatars published since the last call
    pub fn pump(&mut self, avatars: &mut AvatarPair) -> Vec<CombatEvent> {
        if let Some(latest) = drain(&mut self.positions_a).pop() {
            self.last_seen_a = latest;
        }
        if let Some(latest) = drain(&mut self.positions_b).pop() {
            self.last_seen_b = latest;
        }

        let mut frames = drain(&mut self.frames_a);
        frames.extend(drain(&mut self.frames_b));

        let mut events = Vec::new();
        for frame in frames {
            if let Some(hit) = self.check_frame(&frame, avatars) {
                events.push(CombatEvent::Hit(hit));
                if hit.remaining_health == 0 {
                    events.push(CombatEvent::RoundWon {
                        winner: hit.shooter,
                    });
                }
            }
        }

        // Stale frames of a spent projectile all arrive in the batch that spent
        // it; once the owner no longer has it in flight the id can go
        self.spent.retain(|(owner, id)| {
            avatars
                .get(*owner)
                .in_flight()
                .iter()
                .any(|projectile| projectile.id == *id)
        });
        events
    }

    fn check_frame(&mut self, frame: &ProjectileFrame, avatars: &mut AvatarPair) -> Option<HitResult> {
        let target = frame.owner.opponent();
        if !frame.position.overlaps(&self.last_seen(target)) {
            return None;
        }
        // A projectile scores once, even if later frames still overlap
        if !self.spent.insert((frame.owner, frame.id)) {
            return None;
        }
        avatars.get_mut(frame.owner).remove_projectile(frame.id);

        let victim = avatars.get_mut(target);
        let before = victim.health();
        if before == 0 {
            // Already down this round; no second round win
            return None;
        }
        let remaining_health = victim.take_hit(PROJECTILE_DAMAGE);

        debug!(
            shooter = ?frame.owner,
            target = ?target,
            projectile_id = frame.id,
            remaining_health,
            "Projectile hit"
        );

        Some(HitResult {
            projectile_id: frame.id,
            shooter: frame.owner,
            target,
            remaining_health,
            position: frame.position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::avatar::MAX_HEALTH;
    use crate::game::physics::{ArenaBounds, AVATAR_SIZE};
    use crate::game::Command;
    use crate::ws::protocol::Direction;

    fn setup() -> (AvatarPair, CollisionResolver) {
        let mut avatars = AvatarPair::new(ArenaBounds::new(1000.0, 600.0));
        let resolver = CollisionResolver::attach(&mut avatars);
        (avatars, resolver)
    }

    #[test]
    fn projectile_hits_once_and_despawns() {
        let (mut avatars, mut resolver) = setup();

        // A turns right and fires; B waits 500 units down the lane
        let a = avatars.get_mut(PlayerSide::A);
        a.place_at(Rect::square(10.0, 280.0, AVATAR_SIZE));
        a.apply_command(Command::Move(Direction::Right));
        a.apply_command(Command::Fire);
        let muzzle = a.in_flight()[0].position;
        avatars
            .get_mut(PlayerSide::B)
            .place_at(Rect::square(muzzle.right + 480.0, 280.0, AVATAR_SIZE));

        let mut hits = Vec::new();
        for _ in 0..50 {
            avatars.advance(1);
            hits.extend(resolver.pump(&mut avatars));
        }

        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0], CombatEvent::Hit(HitResult { target: PlayerSide::B, remaining_health: 99, .. })));
        assert_eq!(avatars.get(PlayerSide::B).health(), MAX_HEALTH - 1);
        assert!(avatars.get(PlayerSide::A).in_flight().is_empty());
    }

    #[test]
    fn stale_frames_of_a_spent_projectile_do_not_score() {
        let (mut avatars, mut resolver) = setup();
        let a = avatars.get_mut(PlayerSide::A);
        a.place_at(Rect::square(100.0, 280.0, AVATAR_SIZE));
        a.apply_command(Command::Move(Direction::Right));
        a.apply_command(Command::Fire);
        // Target wide enough to overlap several consecutive frames
        avatars
            .get_mut(PlayerSide::B)
            .place_at(Rect::new(200.0, 200.0, 300.0, 200.0));

        // Several frames queued before the resolver runs
        avatars.advance(10);
        let events = resolver.pump(&mut avatars);

        assert_eq!(events.len(), 1);
        assert_eq!(avatars.get(PlayerSide::B).health(), 99);
    }

    #[test]
    fn touching_edges_do_not_hit() {
        let (mut avatars, mut resolver) = setup();
        let b = avatars.get_mut(PlayerSide::B);
        b.apply_command(Command::Fire);
        let shot = b.in_flight()[0].position;
        // 2 travel == 20 units; park A so its left edge meets the first frame's right edge
        avatars
            .get_mut(PlayerSide::A)
            .place_at(Rect::square(shot.right + 20.0, shot.top, AVATAR_SIZE));

        avatars.advance(1);
        assert!(resolver.pump(&mut avatars).is_empty());
        assert_eq!(avatars.get(PlayerSide::A).health(), MAX_HEALTH);
    }

    #[test]
    fn round_won_fires_exactly_once() {
        let (mut avatars, mut resolver) = setup();
        avatars.get_mut(PlayerSide::B).take_hit(MAX_HEALTH - 2);
        let lane = Rect::square(500.0, 280.0, AVATAR_SIZE);
        avatars.get_mut(PlayerSide::B).place_at(lane);

        let mut round_wins = 0;
        let mut health_trace = Vec::new();
        for _ in 0..4 {
            let a = avatars.get_mut(PlayerSide::A);
            a.place_at(Rect::square(lane.right + 40.0, 280.0, AVATAR_SIZE));
            a.apply_command(Command::Fire);
            for _ in 0..10 {
                avatars.advance(1);
                for event in resolver.pump(&mut avatars) {
                    match event {
                        CombatEvent::Hit(hit) => health_trace.push(hit.remaining_health),
                        CombatEvent::RoundWon { winner } => {
                            assert_eq!(winner, PlayerSide::A);
                            round_wins += 1;
                        }
                    }
                }
            }
        }

        assert_eq!(health_trace, vec![1, 0]);
        assert_eq!(round_wins, 1);
        assert_eq!(avatars.get(PlayerSide::B).health(), 0);
    }

    #[test]
    fn hits_use_last_published_position() {
        let (mut avatars, mut resolver) = setup();
        let spawn_b = avatars.get(PlayerSide::B).position();
        avatars.get_mut(PlayerSide::B).apply_command(Command::Move(Direction::Down));
        resolver.pump(&mut avatars);
        assert_eq!(resolver.last_seen(PlayerSide::B), spawn_b.translate(0.0, 10.0));
        assert_eq!(resolver.last_seen(PlayerSide::A), avatars.get(PlayerSide::A).position());
    }

    #[test]
    fn spent_ids_do_not_accumulate() {
        let (mut avatars, mut resolver) = setup();
        let lane = Rect::square(500.0, 280.0, AVATAR_SIZE);
        avatars.get_mut(PlayerSide::B).place_at(lane);

        for _ in 0..20 {
            let a = avatars.get_mut(PlayerSide::A);
            a.place_at(Rect::square(lane.right + 40.0, 280.0, AVATAR_SIZE));
            a.apply_command(Command::Fire);
            // Several overlapping frames land in one batch
            avatars.advance(10);
            let hits = resolver.pump(&mut avatars);
            assert_eq!(hits.len(), 1);
            assert!(resolver.spent.is_empty());
        }
        assert_eq!(avatars.get(PlayerSide::B).health(), MAX_HEALTH - 20);
    }
}
