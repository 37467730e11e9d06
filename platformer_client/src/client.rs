//! Client implementation.
//!
//! The game client owns:
//! - The transport (network or null) and the session state it writes
//! - The local player and its physics
//! - The level coordinator
//! - The publish throttle and interpolation policy
//!
//! Everything here runs on the render thread. Network handlers only touch
//! [`SessionState`]; remote level advances reach this thread through a queue
//! drained once per frame.

use std::{sync::Arc, time::Instant};

use platformer_shared::{
    config::ClientConfig,
    leaderboard::LeaderboardSnapshot,
    level::{levels, Level},
    math::Rect,
    net::events,
    physics::BODY_SIZE,
    render::{Color, RenderBackend},
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    coordinator::{LevelCoordinator, LevelPhase, TransitionOutcome},
    input::{InputSource, InputState},
    interp::Interpolator,
    pacer::FramePacer,
    player::LocalPlayer,
    session::{ConnectionState, RemoteAdvance, SessionState},
    store::RemoteEntity,
    throttle::PublishThrottle,
    transport::{NetworkTransport, NullTransport, SessionTimings, Transport},
};

/// Frames between periodic status log lines.
const STATUS_LOG_EVERY: u64 = 600;

/// What a frame left the game in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Running,
    /// Every level is done; the loop should end.
    Complete,
}

/// Why the run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Quit,
    Completed,
}

/// High-level game client.
pub struct GameClient {
    cfg: ClientConfig,
    session: Arc<SessionState>,
    transport: Box<dyn Transport>,
    advances: mpsc::UnboundedReceiver<RemoteAdvance>,

    player: LocalPlayer,
    levels: LevelCoordinator,
    throttle: PublishThrottle,
    interp: Interpolator,

    last_frame: Option<Instant>,
    frame: u64,
}

impl GameClient {
    /// Builds a client with the transport `cfg.multiplayer` asks for.
    pub fn new(cfg: ClientConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let (session, advances) = SessionState::new();
        let transport: Box<dyn Transport> = if cfg.multiplayer {
            Box::new(NetworkTransport::new(
                SessionTimings::from_config(&cfg),
                session.clone(),
            ))
        } else {
            Box::new(NullTransport)
        };
        Self::with_transport(cfg, session, advances, transport)
    }

    /// Builds a client around an existing transport and the session it writes.
    pub fn with_transport(
        cfg: ClientConfig,
        session: Arc<SessionState>,
        advances: mpsc::UnboundedReceiver<RemoteAdvance>,
        transport: Box<dyn Transport>,
    ) -> anyhow::Result<Self> {
        let levels = LevelCoordinator::new(levels(), cfg.advance_echo_window())?;
        let start = levels
            .current_level()
            .map(|l| l.start)
            .unwrap_or_default();

        Ok(Self {
            player: LocalPlayer::new(start, &cfg.player_name),
            throttle: PublishThrottle::new(cfg.publish_interval()),
            interp: Interpolator::from_config(&cfg),
            levels,
            session,
            transport,
            advances,
            cfg,
            last_frame: None,
            frame: 0,
        })
    }

    /// Starts the transport. Returns immediately.
    pub fn start(&mut self) -> anyhow::Result<()> {
        let mode = if self.is_multiplayer() { "multiplayer" } else { "singleplayer" };
        info!(mode, server = %self.cfg.server_addr, player = %self.player.username(), "Starting client");
        self.transport.connect(&self.cfg.server_addr)
    }

    /// Runs one frame: remote advances, local physics, portal check,
    /// publishing, then interpolation of remote players.
    pub fn frame(&mut self, input: InputState, now: Instant) -> FrameOutcome {
        if self.levels.is_complete() {
            return FrameOutcome::Complete;
        }

        while let Ok(advance) = self.advances.try_recv() {
            self.trigger_remote_advance(advance.target, now);
        }

        if let Some(level) = self.levels.current_level() {
            self.player.body.apply_intent(input.intent());
            self.player.body.step(level.platforms);
            if self.levels.portal_touched(&self.player) {
                self.trigger_local_advance(now);
            }
        }

        if self.is_multiplayer() && self.throttle.poll(now) {
            match serde_json::to_value(self.player.to_update()) {
                Ok(payload) => self.transport.send(events::PLAYER_UPDATE, payload),
                Err(e) => debug!(error = %e, "Could not encode player_update"),
            }
        }

        let elapsed = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_else(|| self.cfg.frame_interval());
        self.session.store.interpolate(self.interp.factor(elapsed));
        self.last_frame = Some(now);
        self.frame += 1;

        if self.frame % STATUS_LOG_EVERY == 0 {
            info!(
                frame = self.frame,
                connection = ?self.connection_state(),
                level = ?self.levels.phase(),
                remote_players = self.session.store.len(),
                "Status"
            );
        }

        if self.levels.is_complete() {
            FrameOutcome::Complete
        } else {
            FrameOutcome::Running
        }
    }

    /// The local player reached the active portal.
    pub fn trigger_local_advance(&mut self, now: Instant) -> TransitionOutcome {
        self.levels
            .trigger_local_advance(&mut self.player, self.transport.as_ref(), now)
    }

    /// A remote `advance_level` arrived.
    pub fn trigger_remote_advance(&mut self, target: Option<usize>, now: Instant) -> TransitionOutcome {
        self.levels
            .trigger_remote_advance(target, &mut self.player, now)
    }

    /// Draws the level, remote players and the local player.
    pub fn draw(&self, renderer: &mut dyn RenderBackend) {
        renderer.begin_frame(Color::WHITE);
        if let Some(level) = self.levels.current_level() {
            for plat in level.platforms {
                renderer.draw_rect(*plat, Color::BLACK);
            }
            if let Some(portal) = level.portal {
                renderer.draw_rect(portal, Color::GOLD);
            }
        }
        if self.is_multiplayer() {
            for remote in self.session.store.snapshot_for_render() {
                let rect = Rect::new(remote.current.x, remote.current.y, BODY_SIZE, BODY_SIZE);
                renderer.draw_rect(rect, Color::RED);
            }
        }
        renderer.draw_rect(self.player.body.rect, Color::BLUE);
        renderer.end_frame();
    }

    /// Paced loop until the input source quits or the last level is done.
    /// Always disconnects on the way out.
    pub fn run(&mut self, input: &mut dyn InputSource, renderer: &mut dyn RenderBackend) -> RunEnd {
        let mut pacer = FramePacer::from_hz(self.cfg.frame_hz);
        let end = loop {
            let now = pacer.wait();
            let Some(state) = input.poll() else {
                break RunEnd::Quit;
            };
            let outcome = self.frame(state, now);
            self.draw(renderer);
            if outcome == FrameOutcome::Complete {
                break RunEnd::Completed;
            }
        };
        info!(?end, score = self.player.score, "Run loop finished");
        self.shutdown();
        end
    }

    /// Tears the transport down. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.transport.disconnect();
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn is_multiplayer(&self) -> bool {
        self.transport.is_multiplayer()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.connection_state()
    }

    pub fn remote_entities(&self) -> Vec<RemoteEntity> {
        self.session.store.snapshot_for_render()
    }

    pub fn leaderboard(&self) -> Arc<LeaderboardSnapshot> {
        self.session.leaderboard()
    }

    pub fn local_id(&self) -> Option<String> {
        self.session.local_id()
    }

    pub fn level_phase(&self) -> LevelPhase {
        self.levels.phase()
    }

    pub fn current_level_index(&self) -> Option<usize> {
        self.levels.current_index()
    }

    pub fn current_level(&self) -> Option<&'static Level> {
        self.levels.current_level()
    }

    pub fn player(&self) -> &LocalPlayer {
        &self.player
    }

    pub fn set_username(&mut self, name: &str) -> anyhow::Result<()> {
        self.player.set_username(name)
    }

    pub fn add_score(&mut self, points: i64) {
        self.player.score += points;
    }
}
