//! Local player state.

use platformer_shared::{
    math::Vec2,
    net::PlayerUpdate,
    physics::Body,
};

/// Longest username published to peers, in characters.
pub const MAX_USERNAME_LEN: usize = 16;

/// The player simulated on this machine.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub body: Body,
    username: String,
    pub score: i64,
}

impl LocalPlayer {
    pub fn new(start: Vec2, username: &str) -> Self {
        let mut player = Self {
            body: Body::at(start),
            username: String::new(),
            score: 0,
        };
        if player.set_username(username).is_err() {
            player.username = "Player".to_string();
        }
        player
    }

    pub fn position(&self) -> Vec2 {
        self.body.position()
    }

    pub fn velocity(&self) -> Vec2 {
        self.body.velocity
    }

    pub fn grounded(&self) -> bool {
        self.body.grounded
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Trims and truncates `name`; rejects blank names.
    pub fn set_username(&mut self, name: &str) -> anyhow::Result<()> {
        let name = name.trim();
        anyhow::ensure!(!name.is_empty(), "username must not be blank");
        self.username = name.chars().take(MAX_USERNAME_LEN).collect();
        Ok(())
    }

    /// Payload for an outbound `player_update`.
    pub fn to_update(&self) -> PlayerUpdate {
        let pos = self.position();
        PlayerUpdate {
            x: pos.x,
            y: pos.y,
            username: self.username.clone(),
            score: self.score,
        }
    }
}
