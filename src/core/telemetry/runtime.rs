//! Tokio runtime that runs the consumer side of a telemetry session.
//!
//! The reader thread pushes notifications into an unbounded channel. A single
//! aggregator task drains it in FIFO order, folds every sample into a
//! [`MetricsAggregator`] and publishes a fresh [`MonitorView`] on a watch
//! channel. Errors are forwarded one by one on their own channel so none is
//! lost to view coalescing.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

use super::aggregator::{MemoryView, MetricsAggregator, SortMode, TaskView};
use super::reader::{Notification, NotificationSink, StreamReader};
use super::source::ByteSource;
use crate::core::config::ConnectionConfig;
use crate::error::{MonitorError, Result};

/// Everything the presentation layer needs for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorView {
    pub status: ConnectionStatus,
    pub memory: Option<MemoryView>,
    pub tasks: TaskView,
    /// Unix timestamp of the last update
    pub updated_at: i64,
}

impl MonitorView {
    /// Snapshot the aggregator's current state, stamped with the current time.
    pub fn from_aggregator(aggregator: &MetricsAggregator, status: ConnectionStatus) -> Self {
        Self {
            status,
            memory: aggregator.memory().copied(),
            tasks: aggregator.task_view().clone(),
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Session started, nothing decoded yet
    #[default]
    Connecting,
    /// At least one telemetry frame received
    Streaming,
    /// Transport failed; waits for an explicit reconnect
    Disconnected(String),
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => f.write_str("Connecting"),
            ConnectionStatus::Streaming => f.write_str("Streaming"),
            ConnectionStatus::Disconnected(reason) => write!(f, "Disconnected ({})", reason),
        }
    }
}

/// User-visible error, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum MonitorAlert {
    Protocol(String),
    Transport(String),
}

impl MonitorAlert {
    pub fn message(&self) -> &str {
        match self {
            MonitorAlert::Protocol(text) | MonitorAlert::Transport(text) => text,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorAlert::Transport(_))
    }
}

/// UI state the aggregator task reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiState {
    pub sort_mode: SortMode,
}

/// What travels from the reader side to the aggregator task.
///
/// Session boundaries share the notification queue so they stay ordered
/// with the data around them.
#[derive(Debug)]
enum RuntimeEvent {
    SessionStarted,
    Notification(Notification),
}

/// Sink handed to each reader; wraps notifications for the runtime queue.
struct RuntimeSink(mpsc::UnboundedSender<RuntimeEvent>);

impl NotificationSink for RuntimeSink {
    fn notify(&self, notification: Notification) -> bool {
        self.0.send(RuntimeEvent::Notification(notification)).is_ok()
    }
}

type ReaderFactory = Box<dyn FnMut(RuntimeSink) -> Result<StreamReader> + Send>;

pub struct MonitorRuntime {
    /// Latest consistent view
    pub view_rx: watch::Receiver<Arc<MonitorView>>,

    /// Protocol and transport errors in arrival order
    pub alerts_rx: mpsc::UnboundedReceiver<MonitorAlert>,

    ui_events_tx: watch::Sender<UiState>,
    events_tx: mpsc::UnboundedSender<RuntimeEvent>,
    reader: Option<StreamReader>,
    factory: ReaderFactory,
    shutdown_tx: broadcast::Sender<()>,

    /// Handle to the runtime (for shutdown)
    _runtime_handle: tokio::runtime::Runtime,
}

impl MonitorRuntime {
    /// Open the serial port in `config` and start monitoring it.
    pub fn connect(config: ConnectionConfig, sort_mode: SortMode) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Connecting to {} at {} baud",
            config.port,
            config.baud_rate
        );

        Self::with_factory(
            Box::new(move |sink| StreamReader::start_serial(config.clone(), sink)),
            sort_mode,
        )
    }

    /// Monitor an already-open source. It cannot be reopened by `reconnect`.
    pub fn with_source<S>(source: S, sort_mode: SortMode) -> Result<Self>
    where
        S: ByteSource + 'static,
    {
        let mut source = Some(source);
        Self::with_factory(
            Box::new(move |sink| match source.take() {
                Some(source) => StreamReader::start(source, sink),
                None => Err(MonitorError::transport("Source cannot be reopened")),
            }),
            sort_mode,
        )
    }

    fn with_factory(mut factory: ReaderFactory, sort_mode: SortMode) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .thread_name("monitor-worker")
            .build()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (alerts_tx, alerts_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(Arc::new(MonitorView {
            tasks: MetricsAggregator::new(sort_mode).task_view().clone(),
            ..Default::default()
        }));
        let (ui_events_tx, ui_events_rx) = watch::channel(UiState { sort_mode });
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        runtime.spawn(aggregator_task(
            events_rx,
            view_tx,
            alerts_tx,
            ui_events_rx,
            shutdown_tx.subscribe(),
        ));

        let reader = factory(RuntimeSink(events_tx.clone()))?;

        Ok(Self {
            view_rx,
            alerts_rx,
            ui_events_tx,
            events_tx,
            reader: Some(reader),
            factory,
            shutdown_tx,
            _runtime_handle: runtime,
        })
    }

    pub fn latest_view(&self) -> Arc<MonitorView> {
        Arc::clone(&self.view_rx.borrow())
    }

    /// Next queued alert, if any. Never blocks.
    pub fn try_next_alert(&mut self) -> Option<MonitorAlert> {
        self.alerts_rx.try_recv().ok()
    }

    pub fn sort_mode(&self) -> SortMode {
        self.ui_events_tx.borrow().sort_mode
    }

    pub fn set_sort_mode(&self, sort_mode: SortMode) {
        self.ui_events_tx.send_if_modified(|ui| {
            let changed = ui.sort_mode != sort_mode;
            ui.sort_mode = sort_mode;
            changed
        });
    }

    pub fn is_reading(&self) -> bool {
        self.reader.as_ref().is_some_and(StreamReader::is_active)
    }

    /// Stop the current session (if any) and start a new one.
    pub fn reconnect(&mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            let end = reader.shutdown()?;
            log::info!("Previous session ended: {:?}", end);
        }

        // Queued behind everything the old reader sent
        let _ = self.events_tx.send(RuntimeEvent::SessionStarted);
        self.reader = Some((self.factory)(RuntimeSink(self.events_tx.clone()))?);
        Ok(())
    }

    /// Stop the reader and the aggregator task.
    pub fn shutdown(mut self) -> Result<()> {
        log::info!("Shutting down MonitorRuntime");
        if let Some(reader) = self.reader.take() {
            reader.shutdown()?;
        }
        let _ = self.shutdown_tx.send(());
        // Runtime will shutdown when dropped
        Ok(())
    }
}

/// Drains notifications and keeps the published view current.
async fn aggregator_task(
    mut events_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    view_tx: watch::Sender<Arc<MonitorView>>,
    alerts_tx: mpsc::UnboundedSender<MonitorAlert>,
    mut ui_events_rx: watch::Receiver<UiState>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let initial = *ui_events_rx.borrow_and_update();
    let mut aggregator = MetricsAggregator::new(initial.sort_mode);
    let mut status = ConnectionStatus::Connecting;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                log::debug!("Aggregator task shutting down");
                break;
            }
            Some(event) = events_rx.recv() => {
                let notification = match event {
                    RuntimeEvent::SessionStarted => {
                        status = ConnectionStatus::Connecting;
                        publish(&view_tx, &aggregator, &status);
                        continue;
                    }
                    RuntimeEvent::Notification(notification) => notification,
                };
                match notification {
                    Notification::Data(sample) => {
                        aggregator.apply(sample);
                        status = ConnectionStatus::Streaming;
                    }
                    Notification::ProtocolError(text) => {
                        log::warn!("Device reported: {}", text);
                        let _ = alerts_tx.send(MonitorAlert::Protocol(text));
                        continue;
                    }
                    Notification::TransportError(text) => {
                        status = ConnectionStatus::Disconnected(text.clone());
                        let _ = alerts_tx.send(MonitorAlert::Transport(text));
                    }
                }
                publish(&view_tx, &aggregator, &status);
            }
            Ok(()) = ui_events_rx.changed() => {
                let ui = *ui_events_rx.borrow_and_update();
                if ui.sort_mode != aggregator.sort_mode() {
                    aggregator.set_sort_mode(ui.sort_mode);
                }
                publish(&view_tx, &aggregator, &status);
            }
            else => break,
        }
    }
}

fn publish(
    view_tx: &watch::Sender<Arc<MonitorView>>,
    aggregator: &MetricsAggregator,
    status: &ConnectionStatus,
) {
    let view = MonitorView::from_aggregator(aggregator, status.clone());

    // watch::send() only fails if there are no receivers (which is fine)
    let _ = view_tx.send(Arc::new(view));
}
