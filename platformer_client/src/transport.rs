//! Transport session.
//!
//! Two implementations of one contract:
//! - [`NetworkTransport`]: a TCP connection with length-prefixed JSON frames,
//!   run on its own Tokio runtime. Reconnects forever with a fixed delay and
//!   watches liveness with a ping/pong heartbeat.
//! - [`NullTransport`]: singleplayer. Accepts everything, sends nothing.
//!
//! The render loop only ever calls non-blocking methods, except
//! [`Transport::disconnect`] which waits briefly for the network context to
//! wind down. Call these from a plain thread, never from inside an async
//! runtime.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use platformer_shared::{
    config::ClientConfig,
    net::{decode_from_bytes, events, Envelope, FrameReader, FrameWriter},
};
use serde_json::Value;
use tokio::{
    net::{tcp::OwnedReadHalf, TcpStream},
    runtime::Runtime,
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    handlers::HandlerTable,
    session::{ConnectionState, SessionState},
};

/// Outbound messages buffered between the render loop and the socket.
/// Overflow is dropped rather than queued.
const OUTBOUND_CAPACITY: usize = 16;

/// How long `disconnect` waits for the session task to close the socket.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Connection capability used by the game controller.
pub trait Transport: Send {
    /// Starts connecting to `endpoint` in the background. Returns at once.
    fn connect(&mut self, endpoint: &str) -> anyhow::Result<()>;

    /// Best-effort publish. Silently dropped unless connected.
    fn send(&self, event: &str, payload: Value);

    /// Stops the session and its retry loop.
    fn disconnect(&mut self);

    /// Whether peers exist at all.
    fn is_multiplayer(&self) -> bool;
}

/// Singleplayer transport.
#[derive(Debug, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn connect(&mut self, _endpoint: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn send(&self, _event: &str, _payload: Value) {}

    fn disconnect(&mut self) {}

    fn is_multiplayer(&self) -> bool {
        false
    }
}

/// Timing knobs of a network session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

impl SessionTimings {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            reconnect_delay: cfg.reconnect_delay(),
            connect_timeout: cfg.connect_timeout(),
            heartbeat_interval: cfg.heartbeat_interval(),
            heartbeat_timeout: cfg.heartbeat_timeout(),
        }
    }
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Live parts of a started session.
struct Running {
    runtime: Runtime,
    task: JoinHandle<()>,
    outbound: mpsc::Sender<Envelope>,
    shutdown: watch::Sender<bool>,
}

/// Auto-reconnecting network transport.
pub struct NetworkTransport {
    timings: SessionTimings,
    state: Arc<SessionState>,
    handlers: HandlerTable,
    running: Option<Running>,
}

impl NetworkTransport {
    /// Creates a transport with the default handler table.
    pub fn new(timings: SessionTimings, state: Arc<SessionState>) -> Self {
        Self {
            timings,
            state,
            handlers: HandlerTable::with_defaults(),
            running: None,
        }
    }

    /// Registers a handler for `event`. Takes effect on the next `connect`.
    pub fn on<F>(&mut self, event: &str, handler: F)
    where
        F: Fn(&SessionState, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if self.running.is_some() {
            warn!(event, "Handler registered after connect; applies from next connect");
        }
        self.handlers.on(event, handler);
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Transport for NetworkTransport {
    fn connect(&mut self, endpoint: &str) -> anyhow::Result<()> {
        anyhow::ensure!(self.running.is_none(), "transport already connected");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("net")
            .enable_all()
            .build()
            .context("build network runtime")?;

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ctx = SessionCtx {
            endpoint: endpoint.to_string(),
            timings: self.timings,
            state: self.state.clone(),
            handlers: self.handlers.clone(),
        };
        let task = runtime.spawn(run_session(ctx, outbound_rx, shutdown_rx));

        info!(server = %endpoint, "Connecting to game server");
        self.running = Some(Running {
            runtime,
            task,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
        });
        Ok(())
    }

    fn send(&self, event: &str, payload: Value) {
        let Some(running) = &self.running else {
            return;
        };
        if self.state.connection_state() != ConnectionState::Connected {
            debug!(event, "Not connected, dropping send");
            return;
        }
        match running.outbound.try_send(Envelope::new(event, payload)) {
            Ok(()) => {}
            Err(TrySendError::Full(msg)) => {
                debug!(event = %msg.event, "Outbound buffer full, dropping send");
            }
            Err(TrySendError::Closed(msg)) => {
                debug!(event = %msg.event, "Session task gone, dropping send");
            }
        }
    }

    fn disconnect(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let Running {
            runtime,
            task,
            outbound,
            shutdown,
        } = running;
        let _ = shutdown.send(true);
        drop(outbound);

        let finished = runtime.block_on(async { tokio::time::timeout(SHUTDOWN_GRACE, task).await });
        if finished.is_err() {
            warn!("Session task did not stop in time, aborting");
        }
        runtime.shutdown_timeout(Duration::from_millis(100));

        self.state.status.set(ConnectionState::Disconnected);
        self.state.reset_connection_view();
        info!("Disconnected from game server");
    }

    fn is_multiplayer(&self) -> bool {
        true
    }
}

impl Drop for NetworkTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Everything the session task needs besides its channels.
struct SessionCtx {
    endpoint: String,
    timings: SessionTimings,
    state: Arc<SessionState>,
    handlers: HandlerTable,
}

/// Why a live connection ended.
#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    /// Deliberate disconnect; do not retry.
    Shutdown,
    /// The server closed the stream.
    Closed,
}

/// What the socket reader hands to the session loop.
enum Inbound {
    Message(Envelope),
    Malformed(anyhow::Error),
    Closed,
    Failed(anyhow::Error),
}

/// Resolves once a deliberate disconnect was requested or the transport is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Connect/retry loop. Only a deliberate disconnect ends it.
async fn run_session(
    ctx: SessionCtx,
    mut outbound: mpsc::Receiver<Envelope>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u64 = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }
        attempt += 1;
        ctx.state.status.set(ConnectionState::Connecting);

        let connected = tokio::select! {
            r = tokio::time::timeout(ctx.timings.connect_timeout, TcpStream::connect(ctx.endpoint.as_str())) => r,
            _ = shutdown_requested(&mut shutdown) => break,
        };

        match connected {
            Ok(Ok(stream)) => {
                info!(server = %ctx.endpoint, attempt, "Connected to game server");
                attempt = 0;
                ctx.state.status.set(ConnectionState::Connected);

                let end = run_connection(stream, &ctx, &mut outbound, &mut shutdown).await;

                ctx.state.status.set(ConnectionState::Disconnected);
                ctx.state.reset_connection_view();
                match end {
                    Ok(ConnectionEnd::Shutdown) => break,
                    Ok(ConnectionEnd::Closed) => info!("Server closed the connection"),
                    Err(e) => warn!(error = %e, "Connection lost"),
                }
            }
            Ok(Err(e)) => {
                ctx.state.status.set(ConnectionState::Disconnected);
                warn!(server = %ctx.endpoint, attempt, error = %e, "Connect failed");
            }
            Err(_) => {
                ctx.state.status.set(ConnectionState::Disconnected);
                warn!(server = %ctx.endpoint, attempt, "Connect timed out");
            }
        }

        debug!(delay_ms = ctx.timings.reconnect_delay.as_millis() as u64, "Retrying");
        tokio::select! {
            _ = tokio::time::sleep(ctx.timings.reconnect_delay) => {}
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
    ctx.state.status.set(ConnectionState::Disconnected);
    debug!("Session task stopped");
}

/// Pumps one live connection until it closes, fails, times out or is shut down.
async fn run_connection(
    stream: TcpStream,
    ctx: &SessionCtx,
    outbound: &mut mpsc::Receiver<Envelope>,
    shutdown: &mut watch::Receiver<bool>,
) -> anyhow::Result<ConnectionEnd> {
    stream.set_nodelay(true).context("set nodelay")?;
    let (read_half, write_half) = stream.into_split();
    let mut writer = FrameWriter::new(write_half);

    // Anything queued while offline is stale.
    while outbound.try_recv().is_ok() {}

    let (inbound_tx, mut inbound_rx) = mpsc::channel(64);
    let reader = tokio::spawn(read_loop(FrameReader::new(read_half), inbound_tx));

    let interval = ctx.timings.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    let end = loop {
        tokio::select! {
            _ = shutdown_requested(shutdown) => {
                let _ = writer.shutdown().await;
                break Ok(ConnectionEnd::Shutdown);
            }
            Some(msg) = outbound.recv() => {
                if let Err(e) = writer.send(&msg).await {
                    break Err(e.context(format!("send {}", msg.event)));
                }
            }
            inbound = inbound_rx.recv() => match inbound {
                Some(Inbound::Message(msg)) => {
                    last_seen = Instant::now();
                    match msg.event.as_str() {
                        events::PING => {
                            if let Err(e) = writer.send(&Envelope::bare(events::PONG)).await {
                                break Err(e.context("send pong"));
                            }
                        }
                        events::PONG => {}
                        _ => {
                            ctx.handlers.dispatch(&ctx.state, &msg);
                        }
                    }
                }
                Some(Inbound::Malformed(e)) => {
                    last_seen = Instant::now();
                    warn!(error = %e, "Malformed message from server, skipping");
                }
                Some(Inbound::Closed) | None => break Ok(ConnectionEnd::Closed),
                Some(Inbound::Failed(e)) => break Err(e),
            },
            _ = heartbeat.tick() => {
                let silent = last_seen.elapsed();
                if silent > ctx.timings.heartbeat_timeout {
                    break Err(anyhow::anyhow!(
                        "heartbeat timeout: no traffic for {} ms",
                        silent.as_millis()
                    ));
                }
                if let Err(e) = writer.send(&Envelope::bare(events::PING)).await {
                    break Err(e.context("send ping"));
                }
            }
        }
    };

    reader.abort();
    end
}

/// Reads frames and forwards them to the session loop until the stream ends.
async fn read_loop(mut reader: FrameReader<OwnedReadHalf>, tx: mpsc::Sender<Inbound>) {
    loop {
        let item = match reader.recv_raw().await {
            Ok(Some(bytes)) => match decode_from_bytes(&bytes) {
                Ok(msg) => Inbound::Message(msg),
                Err(e) => Inbound::Malformed(e),
            },
            Ok(None) => Inbound::Closed,
            Err(e) => Inbound::Failed(e),
        };
        let last = matches!(item, Inbound::Closed | Inbound::Failed(_));
        if tx.send(item).await.is_err() || last {
            break;
        }
    }
}
