//! Event channel client
//!
//! Owns the one persistent WebSocket connection to the board backend and
//! fans inbound board events out to subscribers. The connection is not
//! started automatically: callers spawn the channel, then issue
//! `connect()`.
//!
//! Reconnection: a failed handshake or an unexpected drop is retried up
//! to a fixed number of attempts with a fixed delay between them. When
//! the budget is exhausted a terminal `ReconnectFailed` signal fires once
//! and the channel stays disconnected until a manual `reconnect()`.
//!
//! All inbound events are dispatched in arrival order on the channel
//! task. Handlers run inline on that task and must not block; long work
//! belongs on the subscriber's side of an mpsc.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::models::{Connection, Note};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound board events pushed by the backend
///
/// Wire form is a JSON envelope tagged by event name:
/// `{"event": "note-added", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum BoardEvent {
    NoteAdded(Note),
    NoteUpdated(Note),
    NoteDeleted(String),
    ConnectionAdded(Connection),
    ConnectionDeleted(String),
}

impl BoardEvent {
    /// The event kind used for subscription routing
    pub fn kind(&self) -> EventKind {
        match self {
            BoardEvent::NoteAdded(_) => EventKind::NoteAdded,
            BoardEvent::NoteUpdated(_) => EventKind::NoteUpdated,
            BoardEvent::NoteDeleted(_) => EventKind::NoteDeleted,
            BoardEvent::ConnectionAdded(_) => EventKind::ConnectionAdded,
            BoardEvent::ConnectionDeleted(_) => EventKind::ConnectionDeleted,
        }
    }

    /// Id of the entity the event refers to
    pub fn entity_id(&self) -> &str {
        match self {
            BoardEvent::NoteAdded(note) | BoardEvent::NoteUpdated(note) => &note.id,
            BoardEvent::NoteDeleted(id) => id,
            BoardEvent::ConnectionAdded(conn) => &conn.id,
            BoardEvent::ConnectionDeleted(id) => id,
        }
    }

    /// Decode an inbound text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode to a text frame
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("JSON encoding failed")
    }
}

/// Frames sent by this client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Handshake frame carrying this client's id
    #[serde(rename_all = "camelCase")]
    Join { client_id: String },
}

impl ClientFrame {
    pub fn join(client_id: &str) -> Self {
        ClientFrame::Join {
            client_id: client_id.to_string(),
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("JSON encoding failed")
    }
}

/// The five inbound event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NoteAdded,
    NoteUpdated,
    NoteDeleted,
    ConnectionAdded,
    ConnectionDeleted,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::NoteAdded,
        EventKind::NoteUpdated,
        EventKind::NoteDeleted,
        EventKind::ConnectionAdded,
        EventKind::ConnectionDeleted,
    ];

    /// The wire event name
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::NoteAdded => "note-added",
            EventKind::NoteUpdated => "note-updated",
            EventKind::NoteDeleted => "note-deleted",
            EventKind::ConnectionAdded => "connection-added",
            EventKind::ConnectionDeleted => "connection-deleted",
        }
    }
}

/// Transport state of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Not connected, not trying
    Disconnected,
    /// Attempting the handshake
    Connecting,
    /// Connected and receiving events
    Connected,
}

/// Lifecycle signals emitted by the channel task
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// Transport is up
    Connected,
    /// Transport dropped, with a diagnostic reason
    Disconnected(String),
    /// Transport came back after one or more failed attempts
    Reconnected { attempt: u32 },
    /// Retry budget exhausted; waits for a manual reconnect
    ReconnectFailed,
    /// A connection attempt failed
    Error(String),
}

/// Commands sent to the channel task
#[derive(Debug, Clone)]
enum ChannelCommand {
    Connect,
    Shutdown,
}

/// Configuration for the event channel
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket URL, e.g. `ws://localhost:5000/events`
    pub url: String,
    /// Bound on the TCP + WebSocket upgrade + join exchange
    pub handshake_timeout: Duration,
    /// Connection attempts before giving up
    pub reconnect_attempts: u32,
    /// Delay between attempts
    pub reconnect_delay: Duration,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            handshake_timeout: Duration::from_secs(15),
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Subscription handle returned by `subscribe`
pub type SubscriptionId = u64;

type Handler = Box<dyn Fn(&BoardEvent) + Send + Sync>;

/// Handler registry keyed by event kind
///
/// Dispatch happens on the channel task, so handlers for one channel are
/// never invoked concurrently.
#[derive(Default)]
struct Registry {
    handlers: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn subscribe(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self.handlers.lock().expect("registry lock poisoned");
        handlers.entry(kind).or_default().push((id, handler));
        id
    }

    fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) {
        let mut handlers = self.handlers.lock().expect("registry lock poisoned");
        if let Some(list) = handlers.get_mut(&kind) {
            list.retain(|(sub_id, _)| *sub_id != id);
        }
    }

    fn unsubscribe_all(&self, kind: EventKind) {
        let mut handlers = self.handlers.lock().expect("registry lock poisoned");
        handlers.remove(&kind);
    }

    fn dispatch(&self, event: &BoardEvent) {
        let handlers = self.handlers.lock().expect("registry lock poisoned");
        if let Some(list) = handlers.get(&event.kind()) {
            for (_, handler) in list {
                handler(event);
            }
        }
    }
}

/// Handle to the process-wide event channel
///
/// Constructed once at process start and passed by reference to every
/// consumer; the one-connection-per-process invariant is the caller's
/// composition, not hidden module state. Consumer teardown removes only
/// that consumer's subscriptions; `shutdown()` is reserved for process
/// exit.
pub struct EventChannel {
    command_tx: mpsc::Sender<ChannelCommand>,
    status_rx: watch::Receiver<ChannelStatus>,
    signal_rx: Mutex<Option<mpsc::Receiver<ChannelSignal>>>,
    registry: Arc<Registry>,
    client_id: String,
}

impl EventChannel {
    /// Spawn the channel task
    ///
    /// The task starts idle; call `connect()` to begin the first attempt.
    pub fn spawn(config: ChannelConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (signal_tx, signal_rx) = mpsc::channel(64);
        let (status_tx, status_rx) = watch::channel(ChannelStatus::Disconnected);
        let registry = Arc::new(Registry::default());
        let client_id = format!("board-{}", &uuid::Uuid::new_v4().to_string()[..8]);

        tokio::spawn(channel_task(
            config,
            client_id.clone(),
            Arc::clone(&registry),
            command_rx,
            signal_tx,
            status_tx,
        ));

        Self {
            command_tx,
            status_rx,
            signal_rx: Mutex::new(Some(signal_rx)),
            registry,
            client_id,
        }
    }

    /// Start the first connection attempt
    pub async fn connect(&self) {
        let _ = self.command_tx.send(ChannelCommand::Connect).await;
    }

    /// Manually reconnect; no-op when already connected
    pub async fn reconnect(&self) {
        if !self.is_connected() {
            let _ = self.command_tx.send(ChannelCommand::Connect).await;
        }
    }

    /// Tear down the channel task (process exit path)
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(ChannelCommand::Shutdown).await;
    }

    /// Current transport state
    pub fn status(&self) -> ChannelStatus {
        *self.status_rx.borrow()
    }

    /// Pure query of the transport state
    pub fn is_connected(&self) -> bool {
        self.status() == ChannelStatus::Connected
    }

    /// Watch status transitions
    pub fn subscribe_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status_rx.clone()
    }

    /// Take the lifecycle signal receiver (can only be taken once)
    pub fn take_signals(&self) -> Option<mpsc::Receiver<ChannelSignal>> {
        self.signal_rx.lock().expect("signal lock poisoned").take()
    }

    /// This client's id, carried in the join frame
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Register a handler for one event kind
    ///
    /// Multiple handlers per kind are permitted. The handler runs on the
    /// channel task and must not block.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&BoardEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.registry.subscribe(kind, Box::new(handler))
    }

    /// Remove one handler
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) {
        self.registry.unsubscribe(kind, id);
    }

    /// Remove every handler for an event kind
    pub fn unsubscribe_all(&self, kind: EventKind) {
        self.registry.unsubscribe_all(kind);
    }
}

/// How a connected session ended
enum SessionEnd {
    Shutdown,
    Dropped(String),
}

/// Main channel task: idle until connected, then session + retry loop
async fn channel_task(
    config: ChannelConfig,
    client_id: String,
    registry: Arc<Registry>,
    mut command_rx: mpsc::Receiver<ChannelCommand>,
    signal_tx: mpsc::Sender<ChannelSignal>,
    status_tx: watch::Sender<ChannelStatus>,
) {
    'idle: loop {
        // Wait for connect (first call or manual reconnect)
        match command_rx.recv().await {
            Some(ChannelCommand::Connect) => {}
            Some(ChannelCommand::Shutdown) | None => return,
        }

        let mut reconnecting = false;
        'online: loop {
            let mut session = None;
            for attempt in 1..=config.reconnect_attempts {
                let _ = status_tx.send(ChannelStatus::Connecting);
                debug!(attempt, url = %config.url, "connecting to event channel");

                match open_session(&config, &client_id).await {
                    Ok(ws) => {
                        if reconnecting || attempt > 1 {
                            let _ = signal_tx.send(ChannelSignal::Reconnected { attempt }).await;
                        }
                        session = Some(ws);
                        break;
                    }
                    Err(e) => {
                        warn!(attempt, "event channel connection failed: {}", e);
                        let _ = status_tx.send(ChannelStatus::Disconnected);
                        let _ = signal_tx.send(ChannelSignal::Error(e.to_string())).await;
                    }
                }

                // Wait out the retry delay, still honoring shutdown
                if attempt < config.reconnect_attempts {
                    tokio::select! {
                        _ = tokio::time::sleep(config.reconnect_delay) => {}
                        cmd = command_rx.recv() => {
                            match cmd {
                                Some(ChannelCommand::Shutdown) | None => return,
                                Some(ChannelCommand::Connect) => {}
                            }
                        }
                    }
                }
            }

            let Some(ws) = session else {
                // Budget exhausted: terminal signal, back to waiting for
                // a manual reconnect
                info!(
                    attempts = config.reconnect_attempts,
                    "event channel reconnect failed"
                );
                let _ = signal_tx.send(ChannelSignal::ReconnectFailed).await;
                let _ = status_tx.send(ChannelStatus::Disconnected);
                continue 'idle;
            };

            info!(url = %config.url, "event channel connected");
            let _ = status_tx.send(ChannelStatus::Connected);
            let _ = signal_tx.send(ChannelSignal::Connected).await;

            let end = run_session(ws, &registry, &mut command_rx).await;
            let _ = status_tx.send(ChannelStatus::Disconnected);

            match end {
                SessionEnd::Shutdown => {
                    let _ = signal_tx
                        .send(ChannelSignal::Disconnected("shutdown".to_string()))
                        .await;
                    return;
                }
                SessionEnd::Dropped(reason) => {
                    warn!("event channel dropped: {}", reason);
                    let _ = signal_tx.send(ChannelSignal::Disconnected(reason)).await;
                    // Unexpected drop: automatic retry with a fresh budget
                    reconnecting = true;
                    continue 'online;
                }
            }
        }
    }
}

/// Connect, upgrade, and send the join frame, all under one deadline
async fn open_session(config: &ChannelConfig, client_id: &str) -> anyhow::Result<WsStream> {
    let handshake = async {
        let (mut ws, _response) = connect_async(&config.url).await?;
        let join = ClientFrame::join(client_id);
        ws.send(Message::Text(join.encode())).await?;
        Ok::<_, anyhow::Error>(ws)
    };

    match tokio::time::timeout(config.handshake_timeout, handshake).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!(
            "handshake timed out after {:?} ({})",
            config.handshake_timeout,
            config.url
        ),
    }
}

/// Read frames and dispatch until the transport drops or we shut down
async fn run_session(
    ws: WsStream,
    registry: &Registry,
    command_rx: &mut mpsc::Receiver<ChannelCommand>,
) -> SessionEnd {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Shutdown) | None => {
                        write.close().await.ok();
                        return SessionEnd::Shutdown;
                    }
                    // Already connected; reconnect is a no-op
                    Some(ChannelCommand::Connect) => {}
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match BoardEvent::decode(&text) {
                            Ok(event) => {
                                debug!(event = event.kind().name(), "inbound board event");
                                registry.dispatch(&event);
                            }
                            Err(e) => warn!("undecodable event frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return SessionEnd::Dropped(reason);
                    }
                    Some(Err(e)) => return SessionEnd::Dropped(e.to_string()),
                    None => return SessionEnd::Dropped("stream ended".to_string()),
                    // Ping/pong handled by the transport
                    _ => {}
                }
            }
        }
    }
}
