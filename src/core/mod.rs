// Core business logic module

pub mod config;
pub mod telemetry;

// Re-export commonly used items
pub use config::{ConnectionConfig, DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES};
pub use telemetry::{MetricsAggregator, MonitorRuntime, SortMode, StreamReader};
