//! Serial telemetry core.
//!
//! Turns the raw byte stream from the device into framed, classified messages
//! and aggregates them into per-core CPU and memory views.

pub mod aggregator;
pub mod fake;
mod frame;
mod message;
pub mod reader;
mod runtime;
pub mod source;

pub use aggregator::{
    core_totals, sort_tasks, CoreUsage, MemoryUsage, MemoryView, MetricsAggregator, SortMode,
    TaskView, KNOWN_CORES,
};
pub use frame::FrameDecoder;
pub use message::{
    classify, ErrorCode, ErrorMessage, MemorySample, Message, TaskRecord, TaskSnapshot,
    TaskStatus, TelemetrySample, IDLE_TASK_PREFIX,
};
pub use reader::{Notification, NotificationSink, SessionEnd, StopHandle, StreamReader};
pub use runtime::{ConnectionStatus, MonitorAlert, MonitorRuntime, MonitorView, UiState};
pub use source::{available_ports, ByteSource, PortEntry, SerialSource};
