//! Networking primitives.
//!
//! Goals:
//! - Provide the event-based wire protocol spoken with the game server.
//! - Provide length-prefixed JSON framing over any async byte stream.
//! - Keep payload parsing tolerant: one bad entry never spoils a message.
//!
//! The server side of the protocol is an external system; only the client's
//! view of it lives here.

use std::collections::BTreeMap;

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

/// Largest accepted frame body. Anything bigger is treated as a corrupt stream.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Event names used on the wire.
pub mod events {
    /// server -> client: the identity assigned to this connection.
    pub const YOUR_ID: &str = "your_id";
    /// client -> server: local state; server -> client: full player snapshot.
    pub const PLAYER_UPDATE: &str = "player_update";
    /// Both directions: a level was completed.
    pub const ADVANCE_LEVEL: &str = "advance_level";
    /// server -> client: full leaderboard replacement.
    pub const LEADERBOARD_UPDATE: &str = "leaderboard_update";
    /// Heartbeat request, answered with [`PONG`].
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// An envelope with no payload.
    pub fn bare(event: impl Into<String>) -> Self {
        Self::new(event, Value::Null)
    }
}

/// Local player state published to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerUpdate {
    pub x: f32,
    pub y: f32,
    pub username: String,
    pub score: i64,
}

/// One player's entry inside a server snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerReport {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
}

/// Parsed snapshot: every identity the server listed, with `None` for entries
/// whose state could not be read. Membership still counts for those.
pub type SnapshotEntries = BTreeMap<String, Option<PlayerReport>>;

/// Parses a `player_update` snapshot payload.
///
/// Fails only when the payload is not a JSON object at all.
pub fn parse_snapshot(data: &Value) -> anyhow::Result<SnapshotEntries> {
    let map = data
        .as_object()
        .with_context(|| format!("snapshot payload is not an object: {data}"))?;

    let mut entries = SnapshotEntries::new();
    for (id, raw) in map {
        let report = match serde_json::from_value::<PlayerReport>(raw.clone()) {
            Ok(r) if r.x.is_finite() && r.y.is_finite() => Some(r),
            Ok(_) => {
                warn!(player_id = %id, "Snapshot entry has non-finite position, skipping");
                None
            }
            Err(e) => {
                warn!(player_id = %id, error = %e, "Malformed snapshot entry, skipping");
                None
            }
        };
        entries.insert(id.clone(), report);
    }
    Ok(entries)
}

/// Optional payload of `advance_level`.
///
/// Peers send an empty payload; this client names the level it advanced to so
/// an echo of its own transition can be recognised.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvanceLevel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
}

/// Reads the target level from an `advance_level` payload, if it names one.
pub fn parse_advance(data: &Value) -> Option<usize> {
    serde_json::from_value::<AdvanceLevel>(data.clone())
        .ok()
        .and_then(|a| a.level)
}

/// Leaderboard row as sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardRow {
    #[serde(alias = "name", alias = "id")]
    pub username: String,
    pub score: i64,
}

/// Writes length-prefixed frames.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send(&mut self, msg: &Envelope) -> anyhow::Result<()> {
        let payload = encode_to_bytes(msg)?;
        anyhow::ensure!(
            payload.len() <= MAX_FRAME_LEN,
            "{} frame of {} bytes exceeds limit",
            msg.event,
            payload.len()
        );
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(&payload);
        self.inner.write_all(&buf).await.context("tcp write")?;
        self.inner.flush().await.context("tcp flush")?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.inner.shutdown().await.context("tcp shutdown")
    }
}

/// Reads length-prefixed frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads one raw frame body. Returns `Ok(None)` when the peer closed the
    /// stream cleanly between frames.
    pub async fn recv_raw(&mut self) -> anyhow::Result<Option<Bytes>> {
        let mut len_buf = [0u8; 4];
        match self.inner.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e).context("tcp read len"),
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        anyhow::ensure!(len <= MAX_FRAME_LEN, "frame of {len} bytes exceeds limit");

        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .await
            .context("tcp read payload")?;
        Ok(Some(Bytes::from(payload)))
    }

    /// Reads and decodes one envelope.
    pub async fn recv(&mut self) -> anyhow::Result<Option<Envelope>> {
        match self.recv_raw().await? {
            Some(bytes) => decode_from_bytes(&bytes).map(Some),
            None => Ok(None),
        }
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &Envelope) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<Envelope> {
    serde_json::from_slice(b).context("deserialize")
}
