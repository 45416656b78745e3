use chrono::{Local, TimeZone};

use crate::core::telemetry::{MemoryUsage, TaskRecord, TaskStatus};

/// Format byte counts in human-readable format (B, KB, MB)
pub fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{}B", size)
    } else if size < 1024 * 1024 {
        format!("{:.1}KB", size as f64 / 1024.0)
    } else {
        format!("{:.1}MB", size as f64 / (1024.0 * 1024.0))
    }
}

/// "Core 0: 5.0%"
pub fn format_core_usage(core: i64, percentage: f64) -> String {
    format!("Core {}: {:.1}%", core, percentage)
}

/// "Heap: 600 / 1000  (60.0%)"
pub fn format_memory_usage(label: &str, usage: &MemoryUsage) -> String {
    format!(
        "{}: {} / {}  ({:.1}%)",
        label, usage.used, usage.total, usage.percent_used
    )
}

/// Percentages are shown as sent: whole numbers without a fraction.
pub fn format_percentage(percentage: f64) -> String {
    if percentage.fract() == 0.0 {
        format!("{:.0}%", percentage)
    } else {
        format!("{}%", percentage)
    }
}

pub fn format_core(core: Option<i64>) -> String {
    core.map(|core| core.to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_status(status: Option<TaskStatus>) -> &'static str {
    match status {
        Some(TaskStatus::Created) => "created",
        Some(TaskStatus::Deleted) => "deleted",
        None => "",
    }
}

/// Table cells for one task: name, run time, percentage, core, status.
pub fn task_row(task: &TaskRecord) -> [String; 5] {
    [
        task.task_name.clone(),
        task.run_time.to_string(),
        format_percentage(task.percentage),
        format_core(task.core),
        format_status(task.status).to_string(),
    ]
}

/// Local wall-clock time of a unix timestamp (HH:MM:SS)
pub fn format_timestamp(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(datetime) => datetime.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}
