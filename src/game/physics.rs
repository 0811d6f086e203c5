//! Arena geometry, avatar movement constraints and hit tests

use serde::{Deserialize, Serialize};

use crate::ws::protocol::Direction;

/// Avatar footprint (square)
pub const AVATAR_SIZE: f32 = 40.0;
/// Distance covered by one movement command
pub const MOVE_STEP: f32 = 10.0;
/// Minimum gap between an avatar and the arena edge
pub const EDGE_MARGIN: f32 = 10.0;
/// Projectile footprint (square)
pub const PROJECTILE_SIZE: f32 = 5.0;
/// Travel gained per animation frame
pub const PROJECTILE_STEP: u32 = 2;
/// Travel at which a projectile leaves play
pub const PROJECTILE_RANGE: u32 = 100;

/// Axis-aligned rectangle in arena coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            right: left + width,
            bottom: top + height,
        }
    }

    pub fn square(left: f32, top: f32, size: f32) -> Self {
        Self::new(left, top, size, size)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }

    /// Strict AABB overlap; rectangles touching along an edge do not overlap
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

/// Arena extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub width: f32,
    pub height: f32,
}

impl ArenaBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn min_left(&self) -> f32 {
        EDGE_MARGIN
    }

    pub fn max_left(&self) -> f32 {
        self.width - AVATAR_SIZE - EDGE_MARGIN
    }

    pub fn min_top(&self) -> f32 {
        EDGE_MARGIN
    }

    pub fn max_top(&self) -> f32 {
        self.height - AVATAR_SIZE - EDGE_MARGIN
    }
}

/// Geometry rules for avatars and projectiles
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Step an avatar footprint one move in `direction`, clamped to the arena margins
    pub fn step_avatar(rect: Rect, direction: Direction, bounds: &ArenaBounds) -> Rect {
        let (dx, dy) = match direction {
            Direction::Up => (0.0, Self::clamped_delta(rect.top, -MOVE_STEP, bounds.min_top(), bounds.max_top())),
            Direction::Down => (0.0, Self::clamped_delta(rect.top, MOVE_STEP, bounds.min_top(), bounds.max_top())),
            Direction::Left => (Self::clamped_delta(rect.left, -MOVE_STEP, bounds.min_left(), bounds.max_left()), 0.0),
            Direction::Right => (Self::clamped_delta(rect.left, MOVE_STEP, bounds.min_left(), bounds.max_left()), 0.0),
        };
        rect.translate(dx, dy)
    }

    /// Delta that moves `edge` by `step` without leaving `[min, max]`.
    /// An edge already past a limit is never pushed further toward it.
    fn clamped_delta(edge: f32, step: f32, min: f32, max: f32) -> f32 {
        if step < 0.0 {
            if edge <= min {
                return 0.0;
            }
            (edge + step).max(min) - edge
        } else {
            if edge >= max {
                return 0.0;
            }
            (edge + step).min(max) - edge
        }
    }

    /// Muzzle rectangle for a projectile fired from `avatar` facing `facing`
    pub fn projectile_origin(avatar: Rect, facing: Direction) -> Rect {
        let (left, top) = match facing {
            Direction::Up => (avatar.left + 24.0, avatar.top - 10.0),
            Direction::Down => (avatar.left + 11.0, avatar.top + 44.0),
            Direction::Right => (avatar.left + 44.0, avatar.top + 24.0),
            Direction::Left => (avatar.left - 10.0, avatar.top + 11.0),
        };
        Rect::square(left, top, PROJECTILE_SIZE)
    }

    /// Projectile rectangle after `travel` percent of the arena extent along `facing`
    pub fn projectile_at(origin: Rect, facing: Direction, travel: u32, bounds: &ArenaBounds) -> Rect {
        let along = |extent: f32| extent * travel as f32 / PROJECTILE_RANGE as f32;
        match facing {
            Direction::Up => origin.translate(0.0, -along(bounds.height)),
            Direction::Down => origin.translate(0.0, along(bounds.height)),
            Direction::Left => origin.translate(-along(bounds.width), 0.0),
            Direction::Right => origin.translate(along(bounds.width), 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> ArenaBounds {
        ArenaBounds::new(1000.0, 600.0)
    }

    #[test]
    fn overlap_is_symmetric_and_edge_exclusive() {
        let a = Rect::square(0.0, 0.0, 10.0);
        let touching = Rect::square(10.0, 0.0, 10.0);
        let inside = Rect::square(5.0, 5.0, 2.0);
        let corner = Rect::square(10.0, 10.0, 5.0);
        let apart = Rect::square(50.0, 50.0, 5.0);

        for (p, q) in [(a, touching), (a, inside), (a, corner), (a, apart), (inside, corner)] {
            assert_eq!(p.overlaps(&q), q.overlaps(&p));
        }
        assert!(!a.overlaps(&touching));
        assert!(!a.overlaps(&corner));
        assert!(a.overlaps(&inside));
        assert!(!a.overlaps(&apart));
    }

    #[test]
    fn movement_stays_inside_margins() {
        let bounds = bounds();
        let mut rect = Rect::square(500.0, 300.0, AVATAR_SIZE);
        let pattern = [
            Direction::Left,
            Direction::Up,
            Direction::Left,
            Direction::Right,
            Direction::Down,
            Direction::Down,
        ];
        for i in 0..2000 {
            let dir = pattern[(i * 7 + i / 13) % pattern.len()];
            rect = PhysicsSystem::step_avatar(rect, dir, &bounds);
            assert!(rect.left >= bounds.min_left() && rect.left <= bounds.max_left());
            assert!(rect.top >= bounds.min_top() && rect.top <= bounds.max_top());
        }

        for _ in 0..200 {
            rect = PhysicsSystem::step_avatar(rect, Direction::Right, &bounds);
        }
        assert_eq!(rect.left, bounds.max_left());
        assert_eq!(rect.width(), AVATAR_SIZE);

        for _ in 0..200 {
            rect = PhysicsSystem::step_avatar(rect, Direction::Up, &bounds);
        }
        assert_eq!(rect.top, bounds.min_top());
    }

    #[test]
    fn partial_step_stops_at_margin() {
        let bounds = bounds();
        let rect = Rect::square(14.0, 300.0, AVATAR_SIZE);
        let moved = PhysicsSystem::step_avatar(rect, Direction::Left, &bounds);
        assert_eq!(moved.left, EDGE_MARGIN);
        let again = PhysicsSystem::step_avatar(moved, Direction::Left, &bounds);
        assert_eq!(again, moved);
    }

    #[test]
    fn projectile_travels_along_facing_axis() {
        let bounds = bounds();
        let origin = PhysicsSystem::projectile_origin(Rect::square(10.0, 280.0, AVATAR_SIZE), Direction::Right);
        assert_eq!(origin.left, 54.0);
        assert_eq!(origin.top, 304.0);

        let half = PhysicsSystem::projectile_at(origin, Direction::Right, 50, &bounds);
        assert_eq!(half.left, 554.0);
        assert_eq!(half.top, origin.top);

        let up = PhysicsSystem::projectile_at(origin, Direction::Up, 10, &bounds);
        assert_eq!(up.top, origin.top - 60.0);
        assert_eq!(up.left, origin.left);
    }
}
