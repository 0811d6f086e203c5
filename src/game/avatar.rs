//! Avatar state: movement, facing, firing and in-flight projectiles

use crate::ws::protocol::Direction;

use super::feed::Feed;
use super::physics::{ArenaBounds, PhysicsSystem, Rect, AVATAR_SIZE, PROJECTILE_RANGE, PROJECTILE_STEP};
use super::{Command, PlayerSide};

/// Health at the start of every round
pub const MAX_HEALTH: u32 = 100;

pub type ProjectileId = u64;

/// A projectile in flight, owned by the avatar that fired it
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: ProjectileId,
    pub owner: PlayerSide,
    pub facing: Direction,
    pub position: Rect,
    /// Step counter in `0..=PROJECTILE_RANGE`
    pub travel: u32,
    origin: Rect,
}

impl Projectile {
    fn new(id: ProjectileId, owner: PlayerSide, facing: Direction, origin: Rect) -> Self {
        Self {
            id,
            owner,
            facing,
            position: origin,
            travel: 0,
            origin,
        }
    }

    /// Move one animation frame; returns false once the projectile is spent
    fn update(&mut self, bounds: &ArenaBounds) -> bool {
        self.travel = (self.travel + PROJECTILE_STEP).min(PROJECTILE_RANGE);
        self.position = PhysicsSystem::projectile_at(self.origin, self.facing, self.travel, bounds);
        self.travel < PROJECTILE_RANGE
    }
}

/// Published once per fire command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileSpawned {
    pub id: ProjectileId,
    pub owner: PlayerSide,
    pub facing: Direction,
    pub position: Rect,
}

/// Published for every frame a projectile advances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileFrame {
    pub id: ProjectileId,
    pub owner: PlayerSide,
    pub position: Rect,
    pub travel: u32,
}

/// One combatant. Knows nothing about the opponent or the score.
#[derive(Debug)]
pub struct Avatar {
    side: PlayerSide,
    health: u32,
    facing: Direction,
    position: Rect,
    controls_enabled: bool,
    bounds: ArenaBounds,
    projectiles: Vec<Projectile>,
    next_projectile_id: ProjectileId,
    positions: Feed<Rect>,
    spawns: Feed<ProjectileSpawned>,
    frames: Feed<ProjectileFrame>,
}

impl Avatar {
    pub fn new(side: PlayerSide, bounds: ArenaBounds) -> Self {
        let (position, facing) = Self::spawn_point(side, &bounds);
        Self {
            side,
            health: MAX_HEALTH,
            facing,
            position,
            controls_enabled: true,
            bounds,
            projectiles: Vec::new(),
            next_projectile_id: 1,
            positions: Feed::new(),
            spawns: Feed::new(),
            frames: Feed::new(),
        }
    }

    /// Canonical spawn: side A at the right edge facing left, side B at the left edge facing right
    pub fn spawn_point(side: PlayerSide, bounds: &ArenaBounds) -> (Rect, Direction) {
        let top = bounds.height / 2.0 - AVATAR_SIZE / 2.0;
        match side {
            PlayerSide::A => (
                Rect::square(bounds.width - 70.0, top, AVATAR_SIZE),
                Direction::Left,
            ),
            PlayerSide::B => (Rect::square(10.0, top, AVATAR_SIZE), Direction::Right),
        }
    }

    pub fn side(&self) -> PlayerSide {
        self.side
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn position(&self) -> Rect {
        self.position
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn set_controls(&mut self, enabled: bool) {
        self.controls_enabled = enabled;
    }

    pub fn in_flight(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn subscribe_positions(&mut self) -> tokio::sync::mpsc::UnboundedReceiver<Rect> {
        self.positions.subscribe()
    }

    pub fn subscribe_spawns(&mut self) -> tokio::sync::mpsc::UnboundedReceiver<ProjectileSpawned> {
        self.spawns.subscribe()
    }

    pub fn subscribe_frames(&mut self) -> tokio::sync::mpsc::UnboundedReceiver<ProjectileFrame> {
        self.frames.subscribe()
    }

    /// Apply a movement or fire command; returns false when controls are disabled
    pub fn apply_command(&mut self, command: Command) -> bool {
        if !self.controls_enabled {
            return false;
        }
        match command {
            Command::Move(direction) => self.step(direction),
            Command::Fire => self.fire(),
        }
        true
    }

    fn step(&mut self, direction: Direction) {
        self.facing = direction;
        let next = PhysicsSystem::step_avatar(self.position, direction, &self.bounds);
        if next != self.position {
            self.position = next;
            self.positions.publish(next);
        }
    }

    fn fire(&mut self) {
        let id = self.next_projectile_id;
        self.next_projectile_id += 1;

        let origin = PhysicsSystem::projectile_origin(self.position, self.facing);
        let projectile = Projectile::new(id, self.side, self.facing, origin);
        self.spawns.publish(ProjectileSpawned {
            id,
            owner: self.side,
            facing: self.facing,
            position: origin,
        });
        self.projectiles.push(projectile);
    }

    /// Advance every in-flight projectile by `steps` frames
    pub fn advance(&mut self, steps: u32) {
        for _ in 0..steps {
            if self.projectiles.is_empty() {
                return;
            }
            let bounds = self.bounds;
            let frames = &mut self.frames;
            self.projectiles.retain_mut(|projectile| {
                let in_play = projectile.update(&bounds);
                frames.publish(ProjectileFrame {
                    id: projectile.id,
                    owner: projectile.owner,
                    position: projectile.position,
                    travel: projectile.travel,
                });
                in_play
            });
        }
    }

    /// Despawn a projectile after a hit; false if it already left play
    pub fn remove_projectile(&mut self, id: ProjectileId) -> bool {
        let before = self.projectiles.len();
        self.projectiles.retain(|p| p.id != id);
        self.projectiles.len() != before
    }

    /// Apply damage, saturating at zero; returns the remaining health
    pub fn take_hit(&mut self, damage: u32) -> u32 {
        self.health = self.health.saturating_sub(damage);
        self.health
    }

    /// Restore the round-start state. In-flight projectiles keep travelling.
    pub fn reinitialize(&mut self) {
        let (position, facing) = Self::spawn_point(self.side, &self.bounds);
        self.health = MAX_HEALTH;
        self.facing = facing;
        self.position = position;
        self.controls_enabled = true;
        self.positions.publish(position);
    }

    /// End every feed subscription
    pub fn close_feeds(&mut self) {
        self.positions.close();
        self.spawns.close();
        self.frames.close();
    }

    #[cfg(test)]
    pub(crate) fn place_at(&mut self, position: Rect) {
        self.position = position;
        self.positions.publish(position);
    }
}

/// Both combatants, addressed by side
#[derive(Debug)]
pub struct AvatarPair {
    a: Avatar,
    b: Avatar,
}

impl AvatarPair {
    pub fn new(bounds: ArenaBounds) -> Self {
        Self {
            a: Avatar::new(PlayerSide::A, bounds),
            b: Avatar::new(PlayerSide::B, bounds),
        }
    }

    pub fn get(&self, side: PlayerSide) -> &Avatar {
        match side {
            PlayerSide::A => &self.a,
            PlayerSide::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, side: PlayerSide) -> &mut Avatar {
        match side {
            PlayerSide::A => &mut self.a,
            PlayerSide::B => &mut self.b,
        }
    }

    pub fn advance(&mut self, steps: u32) {
        self.a.advance(steps);
        self.b.advance(steps);
    }

    pub fn reinitialize(&mut self) {
        self.a.reinitialize();
        self.b.reinitialize();
    }

    pub fn set_controls(&mut self, enabled: bool) {
        self.a.set_controls(enabled);
        self.b.set_controls(enabled);
    }

    pub fn close_feeds(&mut self) {
        self.a.close_feeds();
        self.b.close_feeds();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::feed::drain;
    use crate::game::physics::{EDGE_MARGIN, PROJECTILE_SIZE};

    fn bounds() -> ArenaBounds {
        ArenaBounds::new(1000.0, 600.0)
    }

    #[test]
    fn spawns_face_each_other() {
        let pair = AvatarPair::new(bounds());
        let a = pair.get(PlayerSide::A);
        let b = pair.get(PlayerSide::B);
        assert_eq!(a.facing(), Direction::Left);
        assert_eq!(b.facing(), Direction::Right);
        assert_eq!(a.position().left, 930.0);
        assert_eq!(b.position().left, 10.0);
        assert_eq!(a.position().top, 280.0);
        assert_eq!(a.health(), MAX_HEALTH);
    }

    #[test]
    fn move_publishes_only_when_position_changes() {
        let mut avatar = Avatar::new(PlayerSide::B, bounds());
        let mut positions = avatar.subscribe_positions();

        // B spawns against the left margin
        assert!(avatar.apply_command(Command::Move(Direction::Left)));
        assert_eq!(avatar.facing(), Direction::Left);
        assert_eq!(avatar.position().left, EDGE_MARGIN);
        assert!(drain(&mut positions).is_empty());

        avatar.apply_command(Command::Move(Direction::Down));
        assert_eq!(avatar.facing(), Direction::Down);
        let published = drain(&mut positions);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].top, 290.0);
    }

    #[test]
    fn fire_leaves_position_and_facing_alone() {
        let mut avatar = Avatar::new(PlayerSide::A, bounds());
        let mut spawns = avatar.subscribe_spawns();
        let mut positions = avatar.subscribe_positions();
        let before = (avatar.position(), avatar.facing());

        avatar.apply_command(Command::Fire);
        avatar.apply_command(Command::Fire);

        assert_eq!((avatar.position(), avatar.facing()), before);
        assert!(drain(&mut positions).is_empty());
        let spawned = drain(&mut spawns);
        assert_eq!(spawned.len(), 2);
        assert_ne!(spawned[0].id, spawned[1].id);
        assert_eq!(spawned[0].position.left, 920.0);
        assert_eq!(spawned[0].position.width(), PROJECTILE_SIZE);
        assert_eq!(avatar.in_flight().len(), 2);
    }

    #[test]
    fn disabled_controls_ignore_commands() {
        let mut avatar = Avatar::new(PlayerSide::A, bounds());
        avatar.set_controls(false);
        let before = avatar.position();
        assert!(!avatar.apply_command(Command::Move(Direction::Up)));
        assert!(!avatar.apply_command(Command::Fire));
        assert_eq!(avatar.position(), before);
        assert_eq!(avatar.facing(), Direction::Left);
        assert!(avatar.in_flight().is_empty());
    }

    #[test]
    fn projectile_despawns_after_full_travel() {
        let mut avatar = Avatar::new(PlayerSide::B, bounds());
        let mut frames = avatar.subscribe_frames();
        avatar.apply_command(Command::Fire);

        avatar.advance(49);
        assert_eq!(avatar.in_flight().len(), 1);
        assert_eq!(avatar.in_flight()[0].travel, 98);

        avatar.advance(1);
        assert!(avatar.in_flight().is_empty());

        let published = drain(&mut frames);
        assert_eq!(published.len(), 50);
        assert_eq!(published[0].travel, 2);
        assert_eq!(published[49].travel, 100);

        avatar.advance(10);
        assert!(drain(&mut frames).is_empty());
    }

    #[test]
    fn reinitialize_restores_spawn_but_keeps_projectiles() {
        let mut avatar = Avatar::new(PlayerSide::A, bounds());
        let mut positions = avatar.subscribe_positions();
        avatar.apply_command(Command::Move(Direction::Up));
        avatar.apply_command(Command::Fire);
        avatar.take_hit(30);
        avatar.set_controls(false);

        avatar.reinitialize();

        let (spawn, facing) = Avatar::spawn_point(PlayerSide::A, &bounds());
        assert_eq!(avatar.health(), MAX_HEALTH);
        assert_eq!(avatar.position(), spawn);
        assert_eq!(avatar.facing(), facing);
        assert!(avatar.controls_enabled());
        assert_eq!(avatar.in_flight().len(), 1);
        assert_eq!(drain(&mut positions).last(), Some(&spawn));
    }

    #[test]
    fn damage_saturates_at_zero() {
        let mut avatar = Avatar::new(PlayerSide::B, bounds());
        assert_eq!(avatar.take_hit(1), 99);
        assert_eq!(avatar.take_hit(500), 0);
        assert_eq!(avatar.take_hit(1), 0);
    }
}
