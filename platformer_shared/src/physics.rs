//! Platformer physics.
//!
//! Fixed per-frame integration: units are pixels per frame, not per second,
//! so the simulation must be stepped at the frame pacer's rate.

use crate::math::{Rect, Vec2};

/// Side length of a player body.
pub const BODY_SIZE: f32 = 50.0;
pub const MOVE_SPEED: f32 = 5.0;
pub const JUMP_SPEED: f32 = 15.0;
pub const GRAVITY: f32 = 1.0;
pub const MAX_FALL_SPEED: f32 = 10.0;

/// Movement intent for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveIntent {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

/// A player-sized body with velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub rect: Rect,
    pub velocity: Vec2,
    pub grounded: bool,
}

impl Body {
    pub fn at(position: Vec2) -> Self {
        Self {
            rect: Rect::new(position.x, position.y, BODY_SIZE, BODY_SIZE),
            velocity: Vec2::ZERO,
            grounded: false,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.rect.origin()
    }

    /// Places the body at `position` at rest.
    pub fn reset_to(&mut self, position: Vec2) {
        *self = Self::at(position);
    }

    /// Turns intent into velocity. Jumping only works from the ground.
    pub fn apply_intent(&mut self, intent: MoveIntent) {
        self.velocity.x = 0.0;
        if intent.left {
            self.velocity.x = -MOVE_SPEED;
        }
        if intent.right {
            self.velocity.x = MOVE_SPEED;
        }
        if intent.jump && self.grounded {
            self.velocity.y = -JUMP_SPEED;
            self.grounded = false;
        }
    }

    /// Advances one frame: gravity, then x and y moves resolved separately
    /// against `platforms`.
    pub fn step(&mut self, platforms: &[Rect]) {
        self.velocity.y = (self.velocity.y + GRAVITY).min(MAX_FALL_SPEED);

        self.rect.x += self.velocity.x;
        for plat in platforms {
            if self.rect.intersects(plat) {
                if self.velocity.x > 0.0 {
                    self.rect.x = plat.left() - self.rect.w;
                } else if self.velocity.x < 0.0 {
                    self.rect.x = plat.right();
                }
                self.velocity.x = 0.0;
            }
        }

        self.rect.y += self.velocity.y;
        self.grounded = false;
        for plat in platforms {
            if self.rect.intersects(plat) {
                if self.velocity.y > 0.0 {
                    self.rect.y = plat.top() - self.rect.h;
                    self.velocity.y = 0.0;
                    self.grounded = true;
                } else if self.velocity.y < 0.0 {
                    self.rect.y = plat.bottom();
                    self.velocity.y = 0.0;
                }
            }
        }
    }
}
