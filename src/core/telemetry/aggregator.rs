//! Consumer-side aggregation of telemetry samples.
//!
//! The aggregator keeps the last task snapshot exactly as received and derives
//! an ordered view from it: tasks sorted by the active [`SortMode`] plus CPU
//! totals for each known core. Memory samples are turned into used/percent
//! figures. Nothing is kept beyond the latest sample of each kind.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::message::{MemorySample, TaskRecord, TaskSnapshot, TelemetrySample};

/// Cores that get an aggregate bucket (dual-core ESP32).
pub const KNOWN_CORES: [i64; 2] = [0, 1];

/// Sort key for unpinned tasks when ordering by core.
const UNPINNED_CORE_KEY: i64 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Case-insensitive task name, ascending
    Name,
    /// CPU percentage, descending
    #[default]
    Percentage,
    /// Core id, ascending, unpinned first
    Core,
}

impl SortMode {
    pub fn next(self) -> Self {
        match self {
            SortMode::Name => SortMode::Percentage,
            SortMode::Percentage => SortMode::Core,
            SortMode::Core => SortMode::Name,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::Name => "Task Name",
            SortMode::Percentage => "Percentage",
            SortMode::Core => "Core",
        }
    }

    fn compare(self, a: &TaskRecord, b: &TaskRecord) -> Ordering {
        match self {
            SortMode::Name => a
                .task_name
                .to_lowercase()
                .cmp(&b.task_name.to_lowercase()),
            SortMode::Percentage => b
                .percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(Ordering::Equal),
            SortMode::Core => core_key(a).cmp(&core_key(b)),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortMode::Name => "name",
            SortMode::Percentage => "percentage",
            SortMode::Core => "core",
        })
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" | "n" => Ok(SortMode::Name),
            "percentage" | "percent" | "cpu" | "p" => Ok(SortMode::Percentage),
            "core" | "c" => Ok(SortMode::Core),
            other => Err(format!(
                "unknown sort mode '{}' (expected name, percentage or core)",
                other
            )),
        }
    }
}

fn core_key(task: &TaskRecord) -> i64 {
    task.core.unwrap_or(UNPINNED_CORE_KEY)
}

/// Stable sort; equal keys keep their snapshot order.
pub fn sort_tasks(tasks: &mut [TaskRecord], mode: SortMode) {
    tasks.sort_by(|a, b| mode.compare(a, b));
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CoreUsage {
    pub core: i64,
    pub percentage: f64,
}

/// Sum non-idle task percentages per known core.
pub fn core_totals(tasks: &[TaskRecord]) -> Vec<CoreUsage> {
    let mut totals: Vec<CoreUsage> = KNOWN_CORES
        .iter()
        .map(|&core| CoreUsage {
            core,
            percentage: 0.0,
        })
        .collect();

    for task in tasks.iter().filter(|task| !task.is_idle()) {
        let Some(core) = task.core else {
            continue;
        };
        if let Some(bucket) = totals.iter_mut().find(|bucket| bucket.core == core) {
            bucket.percentage += task.percentage;
        }
    }

    totals
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub used: u64,
    pub total: u64,
    pub percent_used: f64,
}

impl MemoryUsage {
    pub fn from_total_free(total: u64, free: u64) -> Self {
        let used = total.saturating_sub(free);
        let percent_used = if total > 0 {
            used as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            used,
            total,
            percent_used,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryView {
    pub heap: MemoryUsage,
    pub internal: MemoryUsage,
}

impl From<&MemorySample> for MemoryView {
    fn from(sample: &MemorySample) -> Self {
        Self {
            heap: MemoryUsage::from_total_free(sample.heap_total, sample.heap_free),
            internal: MemoryUsage::from_total_free(sample.internal_total, sample.internal_free),
        }
    }
}

/// Ordered task list and per-core totals derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub sort_mode: SortMode,
    pub tasks: Vec<TaskRecord>,
    pub cores: Vec<CoreUsage>,
}

impl TaskView {
    fn derive(tasks: &[TaskRecord], sort_mode: SortMode) -> Self {
        let mut sorted = tasks.to_vec();
        sort_tasks(&mut sorted, sort_mode);
        Self {
            sort_mode,
            cores: core_totals(&sorted),
            tasks: sorted,
        }
    }

    pub fn core_percentage(&self, core: i64) -> Option<f64> {
        self.cores
            .iter()
            .find(|usage| usage.core == core)
            .map(|usage| usage.percentage)
    }
}

impl Default for TaskView {
    fn default() -> Self {
        Self::derive(&[], SortMode::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    /// Latest snapshot in device order; every view is derived from it.
    tasks: Vec<TaskRecord>,
    sort_mode: SortMode,
    memory: Option<MemoryView>,
    view: TaskView,
}

impl MetricsAggregator {
    pub fn new(sort_mode: SortMode) -> Self {
        Self {
            tasks: Vec::new(),
            sort_mode,
            memory: None,
            view: TaskView::derive(&[], sort_mode),
        }
    }

    pub fn on_memory_sample(&mut self, sample: &MemorySample) -> &MemoryView {
        self.memory.insert(MemoryView::from(sample))
    }

    pub fn on_task_snapshot(&mut self, snapshot: TaskSnapshot) -> &TaskView {
        self.tasks = snapshot.tasks;
        self.rederive()
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) -> &TaskView {
        self.sort_mode = mode;
        self.rederive()
    }

    /// Fold one telemetry sample into the state.
    pub fn apply(&mut self, sample: TelemetrySample) {
        match sample {
            TelemetrySample::Memory(sample) => {
                self.on_memory_sample(&sample);
            }
            TelemetrySample::Tasks(snapshot) => {
                self.on_task_snapshot(snapshot);
            }
        }
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn memory(&self) -> Option<&MemoryView> {
        self.memory.as_ref()
    }

    pub fn task_view(&self) -> &TaskView {
        &self.view
    }

    fn rederive(&mut self) -> &TaskView {
        self.view = TaskView::derive(&self.tasks, self.sort_mode);
        &self.view
    }
}
