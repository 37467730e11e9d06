//! Inbound message dispatch.
//!
//! Handlers are registered by event name in a table owned by the transport.
//! Each one receives the session state by reference and the raw payload; a
//! failing handler is logged and the message dropped.

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use platformer_shared::{
    leaderboard::LeaderboardSnapshot,
    net::{events, parse_advance, parse_snapshot, Envelope},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::session::{RemoteAdvance, SessionState};

/// Handler signature.
pub type Handler = Arc<dyn Fn(&SessionState, &Value) -> anyhow::Result<()> + Send + Sync>;

/// Event name -> handler.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table every multiplayer session starts with.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.on(events::YOUR_ID, on_your_id);
        table.on(events::PLAYER_UPDATE, on_player_update);
        table.on(events::ADVANCE_LEVEL, on_advance_level);
        table.on(events::LEADERBOARD_UPDATE, on_leaderboard_update);
        table
    }

    /// Registers `handler` for `event`, replacing any previous one.
    pub fn on<F>(&mut self, event: &str, handler: F)
    where
        F: Fn(&SessionState, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(event.to_string(), Arc::new(handler));
    }

    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Runs the handler for `msg`. Returns whether one was registered.
    pub fn dispatch(&self, state: &SessionState, msg: &Envelope) -> bool {
        let Some(handler) = self.handlers.get(&msg.event) else {
            debug!(event = %msg.event, "Unhandled event");
            return false;
        };
        if let Err(e) = handler(state, &msg.data) {
            warn!(event = %msg.event, error = %e, "Handler rejected message");
        }
        true
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut events: Vec<_> = self.handlers.keys().collect();
        events.sort();
        f.debug_struct("HandlerTable").field("events", &events).finish()
    }
}

fn on_your_id(state: &SessionState, data: &Value) -> anyhow::Result<()> {
    let id = match data {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => anyhow::bail!("your_id payload is not an identity: {other}"),
    };
    anyhow::ensure!(!id.is_empty(), "your_id payload is empty");
    state.set_local_id(id);
    Ok(())
}

fn on_player_update(state: &SessionState, data: &Value) -> anyhow::Result<()> {
    let snapshot = parse_snapshot(data).context("player_update")?;
    let local_id = state.local_id();
    let stats = state.store.apply_snapshot(&snapshot, local_id.as_deref());
    debug!(
        inserted = stats.inserted,
        updated = stats.updated,
        removed = stats.removed,
        skipped = stats.skipped,
        "Applied player snapshot"
    );
    Ok(())
}

fn on_advance_level(state: &SessionState, data: &Value) -> anyhow::Result<()> {
    state.push_remote_advance(RemoteAdvance {
        target: parse_advance(data),
    });
    Ok(())
}

fn on_leaderboard_update(state: &SessionState, data: &Value) -> anyhow::Result<()> {
    let board = LeaderboardSnapshot::from_wire(data).context("leaderboard_update")?;
    state.replace_leaderboard(board);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConnectionState;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn defaults_cover_the_server_events() {
        let table = HandlerTable::with_defaults();
        for event in [
            events::YOUR_ID,
            events::PLAYER_UPDATE,
            events::ADVANCE_LEVEL,
            events::LEADERBOARD_UPDATE,
        ] {
            assert!(table.contains(event), "missing {event}");
        }
    }

    #[test]
    fn snapshot_is_filtered_by_assigned_identity() {
        let (state, _rx) = SessionState::new();
        let table = HandlerTable::with_defaults();

        table.dispatch(&state, &Envelope::new(events::YOUR_ID, json!("me")));
        table.dispatch(
            &state,
            &Envelope::new(
                events::PLAYER_UPDATE,
                json!({"me": {"x": 1, "y": 1}, "other": {"x": 100, "y": 200, "username": "bob", "score": 4}}),
            ),
        );

        let entities = state.store.snapshot_for_render();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id, "other");
        assert_eq!(entities[0].username.as_deref(), Some("bob"));
    }

    #[test]
    fn bad_payloads_are_skipped_not_fatal() {
        let (state, _rx) = SessionState::new();
        let table = HandlerTable::with_defaults();

        table.dispatch(&state, &Envelope::new(events::PLAYER_UPDATE, json!({"a": {"x": 1, "y": 2}})));
        assert!(table.dispatch(&state, &Envelope::new(events::PLAYER_UPDATE, json!("nope"))));
        assert!(table.dispatch(&state, &Envelope::new(events::YOUR_ID, json!({"id": 1}))));
        assert!(table.dispatch(&state, &Envelope::new(events::LEADERBOARD_UPDATE, json!(3))));

        assert_eq!(state.store.len(), 1);
        assert_eq!(state.local_id(), None);
        assert!(state.leaderboard().is_empty());
        assert_eq!(state.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn advance_goes_to_render_queue() {
        let (state, mut rx) = SessionState::new();
        let table = HandlerTable::with_defaults();
        table.dispatch(&state, &Envelope::bare(events::ADVANCE_LEVEL));
        table.dispatch(&state, &Envelope::new(events::ADVANCE_LEVEL, json!({"level": 2})));
        assert_eq!(rx.try_recv().unwrap().target, None);
        assert_eq!(rx.try_recv().unwrap().target, Some(2));
    }

    #[test]
    fn custom_handlers_can_be_registered() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let (state, _rx) = SessionState::new();
        let mut table = HandlerTable::new();
        table.on("chat", |_, _| {
            CALLS.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        assert!(table.dispatch(&state, &Envelope::new("chat", json!("hi"))));
        assert!(!table.dispatch(&state, &Envelope::bare("unknown")));
        assert_eq!(CALLS.load(Ordering::Relaxed), 1);
    }
}
