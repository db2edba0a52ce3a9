//! Combat geometry: attack-zone construction, bounding boxes and the
//! knockback displacement. Pure functions so hit detection stays
//! deterministic and unit-testable.

use crate::protocol::{Direction, ATTACK_RANGE, ENTITY_SIZE, MAX_X, MAX_Y, MIN_X, MIN_Y};

pub const ATTACK_WIDTH: i32 = 30;
pub const KNOCKBACK_DISTANCE: i32 = 80;

/// Axis-aligned rectangle in world units. Signed coordinates so attack
/// zones may extend past the world edge without wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Strict overlap; touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// The fixed-size bounding box of an entity at (x, y).
pub fn entity_bounds(x: u16, y: u16) -> Rect {
    Rect::new(i32::from(x), i32::from(y), i32::from(ENTITY_SIZE), i32::from(ENTITY_SIZE))
}

/// The transient hit-test rectangle for one attack, anchored at the
/// attacker's center and extended [`ATTACK_RANGE`] units in the facing
/// direction with [`ATTACK_WIDTH`] units of perpendicular reach.
pub fn attack_zone(center_x: i32, center_y: i32, direction: Direction) -> Rect {
    match direction {
        Direction::Up => Rect::new(
            center_x - ATTACK_WIDTH / 2,
            center_y - ATTACK_RANGE,
            ATTACK_WIDTH,
            ATTACK_RANGE,
        ),
        Direction::Down => Rect::new(center_x - ATTACK_WIDTH / 2, center_y, ATTACK_WIDTH, ATTACK_RANGE),
        Direction::Left => Rect::new(
            center_x - ATTACK_RANGE,
            center_y - ATTACK_WIDTH / 2,
            ATTACK_RANGE,
            ATTACK_WIDTH,
        ),
        Direction::Right => Rect::new(center_x, center_y - ATTACK_WIDTH / 2, ATTACK_RANGE, ATTACK_WIDTH),
    }
}

/// Knockback destination for a hit target: a fixed displacement in the
/// attacker's facing direction, clamped to the world rectangle.
pub fn knockback(target_x: u16, target_y: u16, direction: Direction) -> (u16, u16) {
    let mut x = i32::from(target_x);
    let mut y = i32::from(target_y);
    match direction {
        Direction::Up => y -= KNOCKBACK_DISTANCE,
        Direction::Down => y += KNOCKBACK_DISTANCE,
        Direction::Left => x -= KNOCKBACK_DISTANCE,
        Direction::Right => x += KNOCKBACK_DISTANCE,
    }
    let x = x.clamp(i32::from(MIN_X), i32::from(MAX_X)) as u16;
    let y = y.clamp(i32::from(MIN_Y), i32::from(MAX_Y)) as u16;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_extends_in_facing_direction() {
        let zone = attack_zone(124, 124, Direction::Right);
        assert_eq!(zone, Rect::new(124, 109, ATTACK_RANGE, ATTACK_WIDTH));

        let zone = attack_zone(124, 124, Direction::Left);
        assert_eq!(zone, Rect::new(66, 109, ATTACK_RANGE, ATTACK_WIDTH));

        let zone = attack_zone(124, 124, Direction::Up);
        assert_eq!(zone, Rect::new(109, 66, ATTACK_WIDTH, ATTACK_RANGE));

        let zone = attack_zone(124, 124, Direction::Down);
        assert_eq!(zone, Rect::new(109, 124, ATTACK_WIDTH, ATTACK_RANGE));
    }

    #[test]
    fn hit_detection_is_deterministic() {
        // Attacker at (100, 100) facing right; target box at (148, 88).
        let zone = attack_zone(124, 124, Direction::Right);
        let target = entity_bounds(148, 88);
        for _ in 0..10 {
            assert!(zone.intersects(&target));
        }
        // A target just out of reach never intersects.
        let far = entity_bounds(300, 88);
        assert!(!zone.intersects(&far));
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0, 0, 48, 48);
        let b = Rect::new(48, 0, 48, 48);
        assert!(!a.intersects(&b));
        let c = Rect::new(47, 0, 48, 48);
        assert!(a.intersects(&c));
    }

    #[test]
    fn knockback_displaces_and_clamps() {
        assert_eq!(knockback(100, 100, Direction::Right), (180, 100));
        assert_eq!(knockback(100, 100, Direction::Up), (100, 20));
        // Clamped at the world edges.
        assert_eq!(knockback(30, 100, Direction::Left), (MIN_X, 100));
        assert_eq!(knockback(MAX_X - 10, 100, Direction::Right), (MAX_X, 100));
        assert_eq!(knockback(100, MAX_Y - 5, Direction::Down), (100, MAX_Y));
    }
}
