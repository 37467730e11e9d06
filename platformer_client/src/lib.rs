//! `platformer_client`
//!
//! Client-side systems:
//! - Transport session (TCP, reconnect, heartbeat) and inbound dispatch
//! - Remote player store and interpolation
//! - Local player, publish throttling and level coordination
//! - The paced frame loop tying them together

pub mod client;
pub mod coordinator;
pub mod handlers;
pub mod input;
pub mod interp;
pub mod pacer;
pub mod player;
pub mod session;
pub mod store;
pub mod throttle;
pub mod transport;

pub use client::GameClient;
