//! `platformer_shared`
//!
//! Shared libraries used by the platformer client and its test harness.
//!
//! Design goals:
//! - Deterministic and modular where practical.
//! - Clear separation of concerns (net, math, physics, levels, config).
//! - Traits for abstraction and dependency injection.
//! - No `unsafe`.

pub mod config;
pub mod leaderboard;
pub mod level;
pub mod math;
pub mod net;
pub mod physics;
pub mod render;
