// ── Controller abstraction ──
//
// Full lifecycle management for one dashboard session: owns the push feed,
// runs the engine task that applies feed messages and operator commands to
// the session, and publishes snapshots for front ends to render.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ndtviz_api::websocket::FeedStatus;
use ndtviz_api::{BackendClient, ControlIntent, FeedHandle, FeedMessage};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::export::PendingExport;
use crate::layout::TopologyLayout;
use crate::session::{SessionSnapshot, TelemetrySession};
use crate::stream::SnapshotStream;
use crate::timetravel::TimeTravelController;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── FeedTransport ────────────────────────────────────────────────────

/// The push channel as seen by the controller.
///
/// Implemented by [`FeedHandle`]; tests substitute an in-memory feed.
pub trait FeedTransport: Send + Sync + 'static {
    fn subscribe(&self) -> broadcast::Receiver<Arc<FeedMessage>>;
    fn send(&self, intent: ControlIntent) -> Result<(), ndtviz_api::Error>;
    fn status(&self) -> watch::Receiver<FeedStatus>;
    fn shutdown(&self);
}

impl FeedTransport for FeedHandle {
    fn subscribe(&self) -> broadcast::Receiver<Arc<FeedMessage>> {
        FeedHandle::subscribe(self)
    }

    fn send(&self, intent: ControlIntent) -> Result<(), ndtviz_api::Error> {
        FeedHandle::send(self, intent)
    }

    fn status(&self) -> watch::Receiver<FeedStatus> {
        FeedHandle::status(self)
    }

    fn shutdown(&self) {
        FeedHandle::shutdown(self);
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// The feed gave up (retry limit reached).
    Failed,
}

// ── Controller ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. A controller runs one
/// session: after [`disconnect()`](Self::disconnect) build a new one.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: DashboardConfig,
    snapshot: watch::Sender<Arc<SessionSnapshot>>,
    connection_state: watch::Sender<ConnectionState>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    transport: Mutex<Option<Arc<dyn FeedTransport>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a new Controller from configuration. Does NOT connect --
    /// call [`connect()`](Self::connect) to open the feed and start the engine.
    pub fn new(config: DashboardConfig) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(SessionSnapshot::default()));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ControllerInner {
                config,
                snapshot,
                connection_state,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                transport: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Open the WebSocket feed and start the engine.
    ///
    /// Returns once the background tasks are running; the first connection
    /// attempt happens in the background and is reported through
    /// [`connection_state()`](Self::connection_state).
    pub async fn connect(&self) -> Result<(), CoreError> {
        let config = &self.inner.config;
        config.validate()?;

        let handle = FeedHandle::connect(
            config.feed_url.clone(),
            config.reconnect(),
            self.inner.cancel.child_token(),
        );
        info!(url = %config.feed_url, "opening telemetry feed");
        self.connect_with(Arc::new(handle)).await
    }

    /// Start the engine over an already-built transport.
    pub async fn connect_with(&self, transport: Arc<dyn FeedTransport>) -> Result<(), CoreError> {
        let Some(command_rx) = self.inner.command_rx.lock().await.take() else {
            return Err(CoreError::Internal("controller already started".into()));
        };
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        let feed_rx = transport.subscribe();
        let status_rx = transport.status();

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(engine_task(
            self.clone(),
            Arc::clone(&transport),
            feed_rx,
            command_rx,
        )));
        handles.push(tokio::spawn(status_task(self.clone(), status_rx)));
        drop(handles);

        *self.inner.transport.lock().await = Some(transport);
        debug!("engine started");
        Ok(())
    }

    /// Stop the engine and close the feed.
    ///
    /// Cancels background tasks, joins them, and resets the connection
    /// state to [`Disconnected`](ConnectionState::Disconnected).
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        if let Some(transport) = self.inner.transport.lock().await.take() {
            transport.shutdown();
        }
        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    // ── Command execution ────────────────────────────────────────────

    /// Apply an operator command to the running session.
    ///
    /// Sends the command through the internal channel to the engine task
    /// and awaits the result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if self.inner.cancel.is_cancelled() || self.inner.command_rx.lock().await.is_some() {
            return Err(CoreError::Disconnected);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    // ── HTTP fetches ─────────────────────────────────────────────────

    /// Topology with parallel-link offsets resolved. Reads the configured
    /// containerlab file when set, otherwise `GET /topology`.
    pub async fn fetch_topology(&self) -> Result<TopologyLayout, CoreError> {
        let config = &self.inner.config;
        if let Some(path) = &config.topology_file {
            return TopologyLayout::from_lab_file(path, &config.layout);
        }
        let graph = self.backend()?.topology().await?;
        debug!(
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            "topology fetched"
        );
        Ok(TopologyLayout::resolve(graph, &config.layout))
    }

    /// Raw lab description from `GET /clab-info`.
    pub async fn lab_info(&self) -> Result<serde_json::Value, CoreError> {
        Ok(self.backend()?.lab_info().await?)
    }

    fn backend(&self) -> Result<BackendClient, CoreError> {
        let config = &self.inner.config;
        Ok(BackendClient::new(
            config.backend_url.clone(),
            &config.transport(),
        )?)
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// The most recently published session snapshot.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot.subscribe())
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Single owner of the session: applies feed messages and commands in
/// arrival order, publishing a snapshot after each.
async fn engine_task(
    controller: Controller,
    transport: Arc<dyn FeedTransport>,
    mut feed_rx: broadcast::Receiver<Arc<FeedMessage>>,
    mut commands: mpsc::Receiver<CommandEnvelope>,
) {
    let inner = &controller.inner;
    let mut session =
        TelemetrySession::new(inner.config.history_window, inner.config.snapshot_time_basis);
    let mut feed_open = true;

    loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            envelope = commands.recv() => {
                let Some(envelope) = envelope else { break };
                let CommandEnvelope { command, response_tx } = envelope;
                match route_command(&inner.config, &mut session, transport.as_ref(), command) {
                    Routed::Done(result) => {
                        publish(inner, &session);
                        let _ = response_tx.send(result);
                    }
                    Routed::Export(pending) => {
                        // Disk I/O runs beside the engine; feed handling continues.
                        tokio::spawn(async move {
                            let result = pending.write().await.map(CommandResult::Exported);
                            let _ = response_tx.send(result);
                        });
                    }
                }
            }
            msg = feed_rx.recv(), if feed_open => match msg {
                Ok(msg) => {
                    session.apply(&msg, Utc::now());
                    publish(inner, &session);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "engine fell behind the feed, messages dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("feed closed, engine keeps serving commands");
                    feed_open = false;
                }
            }
        }
    }
}

fn publish(inner: &ControllerInner, session: &TelemetrySession) {
    inner.snapshot.send_replace(Arc::new(session.snapshot()));
}

/// Mirror the feed's link status into the controller's connection state.
async fn status_task(controller: Controller, mut status: watch::Receiver<FeedStatus>) {
    let inner = &controller.inner;
    loop {
        let state = match *status.borrow_and_update() {
            FeedStatus::Connecting => ConnectionState::Connecting,
            FeedStatus::Connected => ConnectionState::Connected,
            FeedStatus::Reconnecting { attempt } => ConnectionState::Reconnecting { attempt },
            FeedStatus::Closed if inner.cancel.is_cancelled() => ConnectionState::Disconnected,
            FeedStatus::Closed => ConnectionState::Failed,
        };
        inner.connection_state.send_replace(state);

        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────────

/// Outcome of routing one command on the engine task.
enum Routed {
    Done(Result<CommandResult, CoreError>),
    /// Encoded export awaiting its file write.
    Export(PendingExport),
}

fn route_command(
    config: &DashboardConfig,
    session: &mut TelemetrySession,
    transport: &dyn FeedTransport,
    cmd: Command,
) -> Routed {
    let transition: fn(&mut TimeTravelController) -> Option<ControlIntent> = match cmd {
        Command::Select(selection) => {
            return Routed::Done(Ok(if session.select(selection) {
                CommandResult::Ok
            } else {
                CommandResult::Ignored
            }));
        }
        Command::ExportSkewLog { dir } => {
            return match PendingExport::new(session.skew().log(), &config.export, &dir, Utc::now()) {
                Ok(pending) => Routed::Export(pending),
                Err(e) => Routed::Done(Err(e)),
            };
        }
        Command::Seek { timestamp } => {
            return Routed::Done(travel(session, transport, |tt| tt.seek(timestamp)));
        }
        Command::ToggleLive => |tt| Some(tt.toggle()),
        Command::StepBackward => TimeTravelController::step_backward,
        Command::StepForward => TimeTravelController::step_forward,
    };
    Routed::Done(travel(session, transport, transition))
}

/// Apply a time-travel transition; the session only moves once the
/// backend has accepted the intent.
fn travel(
    session: &mut TelemetrySession,
    transport: &dyn FeedTransport,
    transition: impl FnOnce(&mut TimeTravelController) -> Option<ControlIntent>,
) -> Result<CommandResult, CoreError> {
    let moved = session.travel(transition, |intent| {
        debug!(?intent, "sending control intent");
        transport.send(intent)
    })?;
    Ok(if moved {
        CommandResult::Ok
    } else {
        CommandResult::Ignored
    })
}
