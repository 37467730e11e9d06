//! Configuration system.
//!
//! Loads client configuration from JSON strings/files. Every field has a
//! default so a partial file only overrides what it names.

use std::{path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Root client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Game server address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Name published to peers with every position update.
    pub player_name: String,
    /// Whether to connect at all. Singleplayer uses the null transport.
    pub multiplayer: bool,
    /// Render/simulation frame rate target.
    pub frame_hz: u32,
    /// Minimum spacing between outbound `player_update` messages.
    pub publish_interval_ms: u64,
    /// Fraction of remaining positional error closed per frame.
    pub interp_blend: f32,
    /// When set, `interp_blend` is treated as the per-frame factor at this
    /// rate and rescaled by the real elapsed frame time.
    pub interp_reference_hz: Option<u32>,
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay_ms: u64,
    /// Upper bound on a single TCP connect attempt.
    pub connect_timeout_ms: u64,
    /// Heartbeat ping cadence.
    pub heartbeat_interval_ms: u64,
    /// Silence longer than this drops the connection.
    pub heartbeat_timeout_ms: u64,
    /// Untargeted remote advances this soon after a local advance are
    /// treated as its echo.
    pub advance_echo_window_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            player_name: "Player".to_string(),
            multiplayer: true,
            frame_hz: 60,
            publish_interval_ms: 50,
            interp_blend: 0.1,
            interp_reference_hz: None,
            reconnect_delay_ms: 1_000,
            connect_timeout_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            advance_echo_window_ms: 1_000,
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_json_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.frame_hz > 0, "frame_hz must be positive");
        anyhow::ensure!(
            self.interp_blend > 0.0 && self.interp_blend <= 1.0,
            "interp_blend must be in (0, 1], got {}",
            self.interp_blend
        );
        if let Some(hz) = self.interp_reference_hz {
            anyhow::ensure!(hz > 0, "interp_reference_hz must be positive");
        }
        anyhow::ensure!(
            self.heartbeat_interval_ms > 0,
            "heartbeat_interval_ms must be positive"
        );
        anyhow::ensure!(
            self.heartbeat_timeout_ms >= self.heartbeat_interval_ms.saturating_mul(2),
            "heartbeat_timeout_ms ({}) must be at least twice heartbeat_interval_ms ({})",
            self.heartbeat_timeout_ms,
            self.heartbeat_interval_ms
        );
        anyhow::ensure!(
            self.publish_interval_ms > 0,
            "publish_interval_ms must be positive"
        );
        // A zero delay would spin against a dead endpoint.
        anyhow::ensure!(
            self.reconnect_delay_ms > 0,
            "reconnect_delay_ms must be positive"
        );
        anyhow::ensure!(
            self.connect_timeout_ms > 0,
            "connect_timeout_ms must be positive"
        );
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_hz.max(1) as f64)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn advance_echo_window(&self) -> Duration {
        Duration::from_millis(self.advance_echo_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_cadence() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.publish_interval(), Duration::from_millis(50));
        assert_eq!(cfg.frame_hz, 60);
        assert_eq!(cfg.interp_blend, 0.1);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = ClientConfig::from_json_str(r#"{"server_addr":"10.0.0.2:9000"}"#).unwrap();
        assert_eq!(cfg.server_addr, "10.0.0.2:9000");
        assert_eq!(cfg.player_name, "Player");
        assert_eq!(cfg.heartbeat_timeout_ms, 90_000);
    }

    #[test]
    fn heartbeat_timeout_must_cover_two_intervals() {
        let mut cfg = ClientConfig {
            heartbeat_interval_ms: 1_000,
            heartbeat_timeout_ms: 1_000,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        cfg.heartbeat_timeout_ms = 1_500;
        assert!(cfg.validate().is_err());

        cfg.heartbeat_timeout_ms = 2_000;
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_rates_rejected() {
        for cfg in [
            ClientConfig {
                reconnect_delay_ms: 0,
                ..Default::default()
            },
            ClientConfig {
                publish_interval_ms: 0,
                ..Default::default()
            },
            ClientConfig {
                connect_timeout_ms: 0,
                ..Default::default()
            },
            ClientConfig {
                frame_hz: 0,
                ..Default::default()
            },
        ] {
            assert!(cfg.validate().is_err(), "{cfg:?} accepted");
        }
    }

    #[test]
    fn blend_outside_unit_interval_rejected() {
        let cfg = ClientConfig {
            interp_blend: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ClientConfig {
            interp_blend: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
