//! Synchronization client.
//!
//! A single task owns the entity store, the marker set and the connection
//! manager, and reacts to connection events, commands and marker deadlines
//! one at a time. Nothing else can touch the store, so it needs no lock.
//! Callers observe state through a [`watch`] channel of [`AttendanceView`]
//! and a [`broadcast`] stream of [`SyncEvent`]s.

use crate::config::SyncConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, StreamTransport, WebSocketTransport};
use crate::error::SyncError;
use crate::markers::MarkerSet;
use crate::merge::{EventMerger, MergeOutcome};
use crate::protocol::StreamEvent;
use crate::snapshot::SnapshotLoader;
use crate::store::{EntityRecord, EntityStore};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Read-only picture of the synchronized state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttendanceView {
    /// Records in roster order
    pub records: Vec<EntityRecord>,
    pub connected: bool,
    /// Ids with a live marker, oldest touch first
    pub recently_touched: Vec<String>,
}

impl AttendanceView {
    pub fn record(&self, id: &str) -> Option<&EntityRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn is_touched(&self, id: &str) -> bool {
        self.recently_touched.iter().any(|t| t == id)
    }

    /// Most recently touched id, for presentations that highlight one row
    pub fn latest_touched(&self) -> Option<&str> {
        self.recently_touched.last().map(String::as_str)
    }

    pub fn present_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_present()).count()
    }
}

/// Typed notifications for downstream consumers
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected,
    Disconnected {
        reason: String,
    },
    SnapshotLoaded {
        count: usize,
    },
    RecordUpdated {
        id: String,
        time: String,
        confidence: Option<i64>,
    },
    MarkerCleared {
        id: String,
    },
}

enum Command {
    ReplaceSnapshot {
        records: Vec<EntityRecord>,
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the running sync task.
///
/// Dropping the handle also stops the task.
pub struct SyncClient {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<AttendanceView>,
    events: broadcast::Sender<SyncEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SyncClient {
    /// Start syncing against the WebSocket stream named in `config`.
    pub fn spawn(config: &SyncConfig) -> Self {
        Self::with_transport(Arc::new(WebSocketTransport::from_config(config)), config)
    }

    pub fn with_transport(transport: Arc<dyn StreamTransport>, config: &SyncConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (view_tx, view_rx) = watch::channel(AttendanceView::default());
        // Capacity for 100 events, as the gateway does for its own broadcast
        let (event_tx, _) = broadcast::channel(100);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = SyncWorker {
            store: EntityStore::new(),
            markers: MarkerSet::new(config.marker_window()),
            connection: ConnectionManager::new(transport, config.reconnect_delay()),
            commands: command_rx,
            view: view_tx,
            events: event_tx.clone(),
        };
        let task = tokio::spawn(worker.run(shutdown_rx));

        Self {
            commands: command_tx,
            view: view_rx,
            events: event_tx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Current state
    pub fn view(&self) -> AttendanceView {
        self.view.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.view.borrow().connected
    }

    /// Watch every state change
    pub fn subscribe(&self) -> watch::Receiver<AttendanceView> {
        self.view.clone()
    }

    /// Typed notifications from now on
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Fully replace the roster. Resolves once the task has applied it.
    pub async fn replace_snapshot(&self, records: Vec<EntityRecord>) -> Result<usize, SyncError> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::ReplaceSnapshot { records, reply })
            .await
            .map_err(|_| SyncError::Stopped)?;
        reply_rx.await.map_err(|_| SyncError::Stopped)
    }

    /// Fetch the roster once and apply it. A fetch failure is returned to the
    /// caller and leaves the current roster in place; nothing is retried.
    pub async fn load_snapshot(&self, loader: &SnapshotLoader) -> Result<usize, SyncError> {
        let records = loader.load().await?;
        self.replace_snapshot(records).await
    }

    /// Close the stream, cancel every pending timer and wait for the task
    /// to exit. Later calls are no-ops.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Sync task ended abnormally: {}", e);
            }
        }
    }
}

struct SyncWorker {
    store: EntityStore,
    markers: MarkerSet,
    connection: ConnectionManager,
    commands: mpsc::Receiver<Command>,
    view: watch::Sender<AttendanceView>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncWorker {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        info!("Sync client started");
        self.connection.start();
        self.publish();

        loop {
            let marker_deadline = self.markers.next_deadline();

            tokio::select! {
                _ = &mut shutdown => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = self.connection.next_event() => self.handle_connection_event(event),
                _ = sleep_until_deadline(marker_deadline) => self.expire_markers(),
            }
        }

        self.connection.shutdown();
        self.markers.clear();
        self.publish();
        info!("Sync client stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ReplaceSnapshot { records, reply } => {
                let count = self.store.replace_all(records);
                let store = &self.store;
                self.markers.retain(|id| store.contains(id));
                info!("Roster replaced: {} records", count);

                self.publish();
                self.emit(SyncEvent::SnapshotLoaded { count });
                let _ = reply.send(count);
            }
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                self.publish();
                self.emit(SyncEvent::Connected);
            }
            ConnectionEvent::Disconnected { reason, .. } => {
                self.publish();
                self.emit(SyncEvent::Disconnected { reason });
            }
            ConnectionEvent::Event(event) => self.merge(event),
        }
    }

    fn merge(&mut self, event: StreamEvent) {
        let outcome =
            EventMerger::new(&mut self.store, &mut self.markers).apply(&event, Instant::now());

        match outcome {
            MergeOutcome::Updated { id, time } => {
                let confidence = match &event {
                    StreamEvent::Biometric(ev) => ev.confidence,
                    StreamEvent::Other { .. } => None,
                };
                info!("{} marked present at {}", id, time);
                self.publish();
                self.emit(SyncEvent::RecordUpdated {
                    id,
                    time,
                    confidence,
                });
            }
            MergeOutcome::UnknownEntity { id } => {
                debug!("{}", SyncError::UnknownEntity(id));
            }
            MergeOutcome::Ignored { .. } => {}
        }
    }

    fn expire_markers(&mut self) {
        let cleared = self.markers.expire(Instant::now());
        if cleared.is_empty() {
            return;
        }
        self.publish();
        for id in cleared {
            self.emit(SyncEvent::MarkerCleared { id });
        }
    }

    fn publish(&self) {
        let next = AttendanceView {
            records: self.store.records().to_vec(),
            connected: self.connection.is_connected(),
            recently_touched: self.markers.ids(),
        };
        self.view.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
