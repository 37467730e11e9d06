//! Static level table.
//!
//! Levels are immutable geometry looked up by index. The field is 800x600
//! pixels; every level has a full-width ground strip.

use crate::math::{Rect, Vec2};

pub const FIELD_WIDTH: f32 = 800.0;
pub const FIELD_HEIGHT: f32 = 600.0;

/// Score awarded for finishing a level.
pub const LEVEL_COMPLETE_BONUS: i64 = 100;

/// Geometry of one level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub start: Vec2,
    pub platforms: &'static [Rect],
    /// Touching this advances to the next level.
    pub portal: Option<Rect>,
}

const GROUND: Rect = Rect::new(0.0, FIELD_HEIGHT - 50.0, FIELD_WIDTH, 50.0);

static LEVELS: [Level; 3] = [
    Level {
        start: Vec2::new(50.0, FIELD_HEIGHT - 100.0),
        platforms: &[
            GROUND,
            Rect::new(100.0, 400.0, 200.0, 20.0),
            Rect::new(400.0, 300.0, 200.0, 20.0),
            Rect::new(250.0, 200.0, 150.0, 20.0),
            // Steps up to the first two ledges.
            Rect::new(350.0, 470.0, 100.0, 20.0),
            Rect::new(650.0, 380.0, 100.0, 20.0),
        ],
        portal: Some(Rect::new(300.0, 150.0, 40.0, 50.0)),
    },
    Level {
        start: Vec2::new(50.0, FIELD_HEIGHT - 100.0),
        platforms: &[
            GROUND,
            Rect::new(150.0, 450.0, 120.0, 20.0),
            Rect::new(350.0, 350.0, 120.0, 20.0),
            Rect::new(550.0, 250.0, 120.0, 20.0),
        ],
        portal: Some(Rect::new(600.0, 200.0, 40.0, 50.0)),
    },
    Level {
        start: Vec2::new(700.0, FIELD_HEIGHT - 100.0),
        platforms: &[
            GROUND,
            Rect::new(600.0, 450.0, 150.0, 20.0),
            Rect::new(350.0, 350.0, 150.0, 20.0),
            Rect::new(100.0, 250.0, 150.0, 20.0),
            Rect::new(300.0, 150.0, 100.0, 20.0),
        ],
        portal: Some(Rect::new(330.0, 100.0, 40.0, 50.0)),
    },
];

/// The built-in level table.
pub fn levels() -> &'static [Level] {
    &LEVELS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Body, MoveIntent, BODY_SIZE};
    use std::collections::{HashSet, VecDeque};

    /// Breadth-first search over every walk/jump choice, one frame at a time.
    fn portal_reachable(level: &Level, portal: Rect) -> bool {
        let key = |b: &Body| (b.rect.x as i32, b.rect.y as i32, b.velocity.y as i32, b.grounded);
        let mut intents = Vec::new();
        for (left, right) in [(true, false), (false, true), (false, false)] {
            for jump in [false, true] {
                intents.push(MoveIntent { left, right, jump });
            }
        }

        let start = Body::at(level.start);
        let mut seen = HashSet::from([key(&start)]);
        let mut queue = VecDeque::from([start]);
        while let Some(body) = queue.pop_front() {
            for intent in &intents {
                let mut next = body;
                next.apply_intent(*intent);
                next.step(level.platforms);
                if next.rect.intersects(&portal) {
                    return true;
                }
                let on_field = next.rect.x > -100.0
                    && next.rect.x < FIELD_WIDTH + 100.0
                    && next.rect.y > -200.0
                    && next.rect.y < FIELD_HEIGHT + 100.0;
                if on_field && seen.insert(key(&next)) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    #[test]
    fn first_level_is_the_classic_layout() {
        let first = &levels()[0];
        assert_eq!(
            first.platforms[..4],
            [
                GROUND,
                Rect::new(100.0, 400.0, 200.0, 20.0),
                Rect::new(400.0, 300.0, 200.0, 20.0),
                Rect::new(250.0, 200.0, 150.0, 20.0),
            ]
        );
        assert_eq!(first.start, Vec2::new(50.0, 500.0));
    }

    #[test]
    fn starts_do_not_overlap_geometry() {
        for (i, level) in levels().iter().enumerate() {
            let body = Rect::new(level.start.x, level.start.y, BODY_SIZE, BODY_SIZE);
            for p in level.platforms {
                assert!(!body.intersects(p), "level {i} start overlaps {p:?}");
            }
            if let Some(portal) = level.portal {
                assert!(!body.intersects(&portal), "level {i} starts inside its portal");
            }
        }
    }

    #[test]
    fn portals_sit_on_a_platform() {
        for (i, level) in levels().iter().enumerate() {
            let Some(portal) = level.portal else { continue };
            let supported = level.platforms.iter().any(|p| {
                p.top() == portal.bottom() && portal.left() >= p.left() && portal.right() <= p.right()
            });
            assert!(supported, "level {i} portal floats");
        }
    }

    #[test]
    fn every_portal_is_reachable_through_play() {
        for (i, level) in levels().iter().enumerate() {
            let Some(portal) = level.portal else { continue };
            assert!(portal_reachable(level, portal), "level {i} portal cannot be reached");
        }
    }
}
