//! Scripted game server for integration tests.
//!
//! [`MockServer`] speaks the client's wire format on an ephemeral localhost
//! port. It runs on its own OS thread with its own Tokio runtime so tests can
//! drive the client from plain `#[test]` functions, the same way the render
//! loop does.
//!
//! Per connection it:
//! - assigns `peer-N` and sends it as `your_id`;
//! - records every envelope the client sends;
//! - answers `ping` with `pong` unless silenced.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use platformer_shared::net::{events, Envelope, FrameReader, FrameWriter};
use serde_json::{json, Value};
use tokio::{
    net::{tcp::OwnedReadHalf, TcpListener, TcpStream},
    sync::{mpsc, oneshot},
};
use tracing::{debug, info};

/// Something the client sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub peer: String,
    pub envelope: Envelope,
}

enum Control {
    Send(Envelope),
    Drop,
}

#[derive(Default)]
struct Shared {
    peers: Mutex<HashMap<String, mpsc::UnboundedSender<Control>>>,
    received: Mutex<Vec<Received>>,
    accepted: AtomicUsize,
    silent: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Localhost server driven by the test body.
pub struct MockServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MockServer {
    /// Binds to an ephemeral port and starts accepting.
    pub fn start() -> anyhow::Result<Self> {
        let shared = Arc::new(Shared::default());
        let (addr_tx, addr_rx) = std::sync::mpsc::channel::<anyhow::Result<SocketAddr>>();
        let (stop_tx, stop_rx) = oneshot::channel();

        let thread_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name("mock-server".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = addr_tx.send(Err(e.into()));
                        return;
                    }
                };
                runtime.block_on(async move {
                    let listener = match TcpListener::bind("127.0.0.1:0").await {
                        Ok(l) => l,
                        Err(e) => {
                            let _ = addr_tx.send(Err(e.into()));
                            return;
                        }
                    };
                    let _ = addr_tx.send(listener.local_addr().map_err(Into::into));
                    tokio::select! {
                        _ = accept_loop(listener, thread_shared) => {}
                        _ = stop_rx => {}
                    }
                });
            })
            .context("spawn mock server thread")?;

        let addr = addr_rx
            .recv_timeout(Duration::from_secs(5))
            .context("mock server did not report its address")??;
        info!(%addr, "Mock server listening");

        Ok(Self {
            addr,
            shared,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// `host:port` for [`platformer_shared::config::ClientConfig::server_addr`].
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    /// Stops answering pings.
    pub fn set_silent(&self, silent: bool) {
        self.shared.silent.store(silent, Ordering::Relaxed);
    }

    /// Connections accepted so far, including closed ones.
    pub fn connection_count(&self) -> usize {
        self.shared.accepted.load(Ordering::Relaxed)
    }

    /// Identities of the currently open connections.
    pub fn live_peers(&self) -> Vec<String> {
        let mut peers: Vec<_> = lock(&self.shared.peers).keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Sends `event` to every open connection. Returns how many got it.
    pub fn broadcast(&self, event: &str, data: Value) -> usize {
        let env = Envelope::new(event, data);
        lock(&self.shared.peers)
            .values()
            .filter(|tx| tx.send(Control::Send(env.clone())).is_ok())
            .count()
    }

    /// Sends `event` to one connection.
    pub fn send_to(&self, peer: &str, event: &str, data: Value) -> bool {
        lock(&self.shared.peers)
            .get(peer)
            .is_some_and(|tx| tx.send(Control::Send(Envelope::new(event, data))).is_ok())
    }

    /// Closes every open connection from the server side.
    pub fn drop_all(&self) {
        for tx in lock(&self.shared.peers).values() {
            let _ = tx.send(Control::Drop);
        }
    }

    /// Everything received so far, in arrival order.
    pub fn received(&self) -> Vec<Received> {
        lock(&self.shared.received).clone()
    }

    /// Received envelopes with the given event name.
    pub fn received_events(&self, event: &str) -> Vec<Received> {
        lock(&self.shared.received)
            .iter()
            .filter(|r| r.envelope.event == event)
            .cloned()
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                debug!(error = %e, "Accept failed");
                continue;
            }
        };
        let n = shared.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        let peer = format!("peer-{n}");
        info!(%peer, %remote, "Mock server accepted");

        let (tx, rx) = mpsc::unbounded_channel();
        lock(&shared.peers).insert(peer.clone(), tx);
        tokio::spawn(serve_peer(stream, peer, shared.clone(), rx));
    }
}

async fn serve_peer(
    stream: TcpStream,
    peer: String,
    shared: Arc<Shared>,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    if let Err(e) = pump_peer(stream, &peer, &shared, &mut control).await {
        debug!(%peer, error = %e, "Mock connection ended with error");
    }
    lock(&shared.peers).remove(&peer);
    debug!(%peer, "Mock connection closed");
}

async fn pump_peer(
    stream: TcpStream,
    peer: &str,
    shared: &Shared,
    control: &mut mpsc::UnboundedReceiver<Control>,
) -> anyhow::Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut writer = FrameWriter::new(write_half);

    let (inbound_tx, mut inbound_rx) = mpsc::channel(64);
    let reader = tokio::spawn(read_frames(FrameReader::new(read_half), inbound_tx));

    writer.send(&Envelope::new(events::YOUR_ID, json!(peer))).await?;

    let result = loop {
        tokio::select! {
            ctl = control.recv() => match ctl {
                Some(Control::Send(env)) => {
                    if let Err(e) = writer.send(&env).await {
                        break Err(e);
                    }
                }
                Some(Control::Drop) | None => {
                    let _ = writer.shutdown().await;
                    break Ok(());
                }
            },
            inbound = inbound_rx.recv() => match inbound {
                Some(env) => {
                    let is_ping = env.event == events::PING;
                    lock(&shared.received).push(Received {
                        peer: peer.to_string(),
                        envelope: env,
                    });
                    if is_ping && !shared.silent.load(Ordering::Relaxed) {
                        if let Err(e) = writer.send(&Envelope::bare(events::PONG)).await {
                            break Err(e);
                        }
                    }
                }
                None => break Ok(()),
            },
        }
    };
    reader.abort();
    result
}

async fn read_frames(mut reader: FrameReader<OwnedReadHalf>, tx: mpsc::Sender<Envelope>) {
    while let Ok(Some(env)) = reader.recv().await {
        if tx.send(env).await.is_err() {
            break;
        }
    }
}

/// Polls `cond` every 10 ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}
