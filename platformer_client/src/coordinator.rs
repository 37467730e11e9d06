//! Level coordination.
//!
//! Local portal touches and remote `advance_level` messages both end up in
//! [`LevelCoordinator::apply_transition`]. Both entry points run on the render
//! thread, so no locking is involved.
//!
//! A local advance followed by the server echoing it (or a peer reaching the
//! same portal in the same moment) must move the level once. Two guards do
//! that:
//! - remote advances that name a level this client already reached are
//!   ignored, and one naming the level of the last local advance counts as
//!   its echo;
//! - remote advances that name no level, arriving within the echo window
//!   after a local advance, are taken to be that advance's echo.

use std::time::{Duration, Instant};

use platformer_shared::{
    level::{Level, LEVEL_COMPLETE_BONUS},
    net::{events, AdvanceLevel},
};
use tracing::{debug, info};

use crate::{player::LocalPlayer, transport::Transport};

/// Where the run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelPhase {
    Active(usize),
    /// Only observable inside a transition.
    Transitioning { from: usize, to: usize },
    /// The last level was finished.
    Complete,
}

/// Why an advance request changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    AlreadyComplete,
    AlreadyAtTarget,
    EchoOfLocalAdvance,
}

/// Result of an advance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Advanced { from: usize, to: usize },
    Completed { from: usize },
    Ignored(IgnoreReason),
}

/// Owns the active level index.
#[derive(Debug, Clone)]
pub struct LevelCoordinator {
    levels: &'static [Level],
    phase: LevelPhase,
    echo_window: Duration,
    /// When the last local advance happened and the level it targeted.
    last_local_advance: Option<(Instant, usize)>,
}

impl LevelCoordinator {
    pub fn new(levels: &'static [Level], echo_window: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!levels.is_empty(), "level table is empty");
        Ok(Self {
            levels,
            phase: LevelPhase::Active(0),
            echo_window,
            last_local_advance: None,
        })
    }

    pub fn phase(&self) -> LevelPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == LevelPhase::Complete
    }

    /// Index of the level being played, `None` once complete.
    pub fn current_index(&self) -> Option<usize> {
        match self.phase {
            LevelPhase::Active(i) => Some(i),
            _ => None,
        }
    }

    pub fn current_level(&self) -> Option<&'static Level> {
        self.current_index().and_then(|i| self.levels.get(i))
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// True when the player's body overlaps the active portal.
    pub fn portal_touched(&self, player: &LocalPlayer) -> bool {
        self.current_level()
            .and_then(|level| level.portal)
            .is_some_and(|portal| player.body.rect.intersects(&portal))
    }

    /// The local player reached the portal.
    ///
    /// Peers are told first, so they hear about it even if this process dies
    /// before the transition lands.
    pub fn trigger_local_advance(
        &mut self,
        player: &mut LocalPlayer,
        transport: &dyn Transport,
        now: Instant,
    ) -> TransitionOutcome {
        let Some(from) = self.current_index() else {
            return TransitionOutcome::Ignored(IgnoreReason::AlreadyComplete);
        };
        let to = from + 1;

        if transport.is_multiplayer() {
            let payload = AdvanceLevel { level: Some(to) };
            match serde_json::to_value(payload) {
                Ok(data) => transport.send(events::ADVANCE_LEVEL, data),
                Err(e) => debug!(error = %e, "Could not encode advance_level"),
            }
        }
        self.last_local_advance = Some((now, to));
        self.apply_transition(to, player)
    }

    /// A peer or the server advanced the shared level. Never re-published.
    pub fn trigger_remote_advance(
        &mut self,
        target: Option<usize>,
        player: &mut LocalPlayer,
        now: Instant,
    ) -> TransitionOutcome {
        let Some(current) = self.current_index() else {
            return TransitionOutcome::Ignored(IgnoreReason::AlreadyComplete);
        };

        let to = match target {
            Some(t) if t <= current => {
                // A targeted echo of our own advance uses up its echo slot.
                if self.last_local_advance.is_some_and(|(_, local)| local == t) {
                    self.last_local_advance = None;
                }
                debug!(target = t, current, "Remote advance already applied");
                return TransitionOutcome::Ignored(IgnoreReason::AlreadyAtTarget);
            }
            Some(t) => t,
            None => {
                let is_echo = self
                    .last_local_advance
                    .is_some_and(|(at, _)| now.saturating_duration_since(at) <= self.echo_window);
                if is_echo {
                    // One echo per local advance.
                    self.last_local_advance = None;
                    debug!(current, "Remote advance treated as echo of local advance");
                    return TransitionOutcome::Ignored(IgnoreReason::EchoOfLocalAdvance);
                }
                current + 1
            }
        };
        self.apply_transition(to, player)
    }

    /// Moves to level `to`: player back to its start, score bonus, new
    /// geometry. Running past the table completes the run instead.
    fn apply_transition(&mut self, to: usize, player: &mut LocalPlayer) -> TransitionOutcome {
        let LevelPhase::Active(from) = self.phase else {
            return TransitionOutcome::Ignored(IgnoreReason::AlreadyComplete);
        };
        self.phase = LevelPhase::Transitioning { from, to };

        // Stage the new player state, then commit it together with the phase.
        let mut staged = player.clone();
        staged.score += LEVEL_COMPLETE_BONUS;

        match self.levels.get(to) {
            Some(next) => {
                staged.body.reset_to(next.start);
                *player = staged;
                self.phase = LevelPhase::Active(to);
                info!(from, to, score = player.score, "Level advanced");
                TransitionOutcome::Advanced { from, to }
            }
            None => {
                *player = staged;
                self.phase = LevelPhase::Complete;
                info!(from, score = player.score, "All levels complete");
                TransitionOutcome::Completed { from }
            }
        }
    }
}
