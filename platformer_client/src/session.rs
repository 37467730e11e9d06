//! State shared between the render loop and the network context.
//!
//! Each field has one writer (network handlers) and one reader (render loop).
//! Writers replace values wholesale; every accessor takes its own short lock
//! or atomic so neither side ever waits on the other for long.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use platformer_shared::leaderboard::LeaderboardSnapshot;
use tokio::sync::mpsc;
use tracing::info;

use crate::store::RemoteEntityStore;

/// Transport lifecycle as shown to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to any server.
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connected; sends go out.
    Connected,
}

impl ConnectionState {
    fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Lock-free connection status cell.
#[derive(Debug)]
pub struct ConnectionStatus(AtomicU8);

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected.to_u8()))
    }
}

impl ConnectionStatus {
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Stores `state`, returning the previous one.
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(state.to_u8(), Ordering::AcqRel))
    }
}

/// A remote "advance level" waiting for the render loop. `target` is the level
/// the sender moved to, when it said so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAdvance {
    pub target: Option<usize>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session state owned by the game controller and handed to the transport.
#[derive(Debug)]
pub struct SessionState {
    pub store: RemoteEntityStore,
    pub status: ConnectionStatus,
    local_id: Mutex<Option<String>>,
    leaderboard: Mutex<Arc<LeaderboardSnapshot>>,
    advances: mpsc::UnboundedSender<RemoteAdvance>,
}

impl SessionState {
    /// Creates the shared state and the receiving end of the remote-advance
    /// queue, which belongs to the render loop.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<RemoteAdvance>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Self {
            store: RemoteEntityStore::new(),
            status: ConnectionStatus::default(),
            local_id: Mutex::new(None),
            leaderboard: Mutex::new(Arc::new(LeaderboardSnapshot::default())),
            advances: tx,
        };
        (Arc::new(state), rx)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.status.get()
    }

    pub fn local_id(&self) -> Option<String> {
        lock(&self.local_id).clone()
    }

    pub fn set_local_id(&self, id: String) {
        let mut slot = lock(&self.local_id);
        if slot.as_deref() != Some(id.as_str()) {
            info!(player_id = %id, "Received local player id");
            *slot = Some(id);
        }
    }

    pub fn leaderboard(&self) -> Arc<LeaderboardSnapshot> {
        lock(&self.leaderboard).clone()
    }

    pub fn replace_leaderboard(&self, board: LeaderboardSnapshot) {
        *lock(&self.leaderboard) = Arc::new(board);
    }

    /// Hands a remote advance to the render loop. Dropped if the loop is gone.
    pub fn push_remote_advance(&self, advance: RemoteAdvance) {
        let _ = self.advances.send(advance);
    }

    /// Forgets everything learned from the current connection. Identities
    /// are per connection, so a reconnect waits for a fresh `your_id`.
    pub fn reset_connection_view(&self) {
        *lock(&self.local_id) = None;
        self.store.clear();
    }
}
